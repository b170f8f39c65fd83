use crate::error::CoreError;
use crate::product::{Product, ProductType};
use crate::rule::{ProductRule, RulePair};
use crate::spatial::Location;
use crate::urn::Urn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub usize);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// `input -> output -> instances`. Empty buckets are pruned at both levels, so
/// `contains_key(input)` answers "can this cell consume `input`".
type RuleBook = BTreeMap<ProductType, BTreeMap<ProductType, Vec<ProductRule>>>;

/// An agent owning rules and a LIFO store of received products.
#[derive(Debug)]
pub struct Cell {
    id: CellId,
    location: Location,
    neighbors: BTreeSet<CellId>,
    rules: RuleBook,
    rule_count: usize,
    storage: BTreeMap<ProductType, Vec<Product>>,
    active_rule: Option<ProductRule>,
    alive: bool,
}

impl Cell {
    pub fn new(id: CellId) -> Self {
        Self {
            id,
            location: Location::default(),
            neighbors: BTreeSet::new(),
            rules: RuleBook::new(),
            rule_count: 0,
            storage: BTreeMap::new(),
            active_rule: None,
            alive: true,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub(crate) fn assign_id(&mut self, id: CellId) {
        self.id = id;
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub(crate) fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub fn neighbors(&self) -> &BTreeSet<CellId> {
        &self.neighbors
    }

    pub(crate) fn add_neighbor(&mut self, other: CellId) -> bool {
        other != self.id && self.neighbors.insert(other)
    }

    pub(crate) fn remove_neighbor(&mut self, other: CellId) -> bool {
        self.neighbors.remove(&other)
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn active_rule(&self) -> Option<ProductRule> {
        self.active_rule
    }

    pub fn add_rule(&mut self, rule: ProductRule) -> Result<(), CoreError> {
        if !self.alive {
            return Err(CoreError::invalid(format!(
                "{} is dead and cannot take rule {}",
                self.id,
                rule.name()
            )));
        }
        if rule.input() == 0 || rule.output() == 0 {
            return Err(CoreError::invalid(format!(
                "rule {} uses product type 0",
                rule.name()
            )));
        }
        self.rules
            .entry(rule.input())
            .or_default()
            .entry(rule.output())
            .or_default()
            .push(rule);
        self.rule_count += 1;
        Ok(())
    }

    /// Remove one specific rule instance. When the last rule goes, every stored
    /// product is returned to `urn` and the cell dies for good.
    pub fn remove_rule(&mut self, rule: &ProductRule, urn: &mut Urn) -> Result<(), CoreError> {
        let missing = || CoreError::not_found(format!("{} holds no rule {:?}", self.id, rule.id()));
        let outputs = self.rules.get_mut(&rule.input()).ok_or_else(missing)?;
        let bucket = outputs.get_mut(&rule.output()).ok_or_else(missing)?;
        let pos = bucket
            .iter()
            .position(|r| r.id() == rule.id())
            .ok_or_else(missing)?;
        bucket.swap_remove(pos);
        if bucket.is_empty() {
            outputs.remove(&rule.output());
            if outputs.is_empty() {
                self.rules.remove(&rule.input());
            }
        }
        self.rule_count = self
            .rule_count
            .checked_sub(1)
            .expect("rule_count underflow");
        if self.active_rule.is_some_and(|a| a.id() == rule.id()) {
            self.active_rule = None;
        }
        if self.rule_count == 0 {
            self.retire(urn);
        }
        Ok(())
    }

    /// Drain storage into `urn` and mark the cell dead.
    pub(crate) fn retire(&mut self, urn: &mut Urn) {
        for product in std::mem::take(&mut self.storage).into_values().flatten() {
            urn.return_product(product);
        }
        self.active_rule = None;
        self.alive = false;
    }

    pub fn holds(&self, rule: &ProductRule) -> bool {
        self.rules
            .get(&rule.input())
            .and_then(|outputs| outputs.get(&rule.output()))
            .is_some_and(|bucket| bucket.iter().any(|r| r.id() == rule.id()))
    }

    pub fn has_rule_for(&self, kind: ProductType) -> bool {
        self.rules.contains_key(&kind)
    }

    /// Input types this cell can consume.
    pub fn input_types(&self) -> Vec<ProductType> {
        self.rules.keys().copied().collect()
    }

    /// Multiplicity of each rule pair this cell holds.
    pub fn rule_breakdown(&self) -> Vec<(RulePair, usize)> {
        self.rules
            .iter()
            .flat_map(|(&input, outputs)| {
                outputs
                    .iter()
                    .map(move |(&output, bucket)| (RulePair::new(input, output), bucket.len()))
            })
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &ProductRule> {
        self.rules.values().flat_map(|outputs| outputs.values().flatten())
    }

    pub fn set_active_rule(&mut self, rule: ProductRule) -> Result<(), CoreError> {
        if !self.holds(&rule) {
            return Err(CoreError::not_found(format!(
                "{} does not own rule {}",
                self.id,
                rule.name()
            )));
        }
        self.active_rule = Some(rule);
        Ok(())
    }

    pub fn add_product(&mut self, product: Product) {
        self.storage.entry(product.kind()).or_default().push(product);
    }

    /// Pop the most recently stored product of `kind`.
    pub fn take_product(&mut self, kind: ProductType) -> Option<Product> {
        self.storage.get_mut(&kind)?.pop()
    }

    pub fn stored_count(&self) -> usize {
        self.storage.values().map(Vec::len).sum()
    }

    pub fn storage_breakdown(&self) -> BTreeMap<ProductType, usize> {
        self.storage
            .iter()
            .filter(|(_, units)| !units.is_empty())
            .map(|(&kind, units)| (kind, units.len()))
            .collect()
    }

    pub fn stored_products(&self) -> impl Iterator<Item = &Product> {
        self.storage.values().flatten()
    }

    /// Return stored products no rule of this cell can consume to `urn`.
    /// Returns how many were released.
    pub fn release_unusable(&mut self, urn: &mut Urn) -> usize {
        let unusable: Vec<ProductType> = self
            .storage
            .keys()
            .copied()
            .filter(|kind| !self.rules.contains_key(kind))
            .collect();
        let mut released = 0;
        for kind in unusable {
            if let Some(units) = self.storage.remove(&kind) {
                released += units.len();
                for product in units {
                    urn.return_product(product);
                }
            }
        }
        released
    }

    /// Type of a stored product some rule can consume, drawn uniformly over
    /// units (a type with more units is proportionally likelier). Spent units
    /// are not counted. Nothing is removed.
    pub fn has_compatible_product<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ProductType> {
        let usable: Vec<(ProductType, usize)> = self
            .storage
            .iter()
            .filter(|(kind, _)| self.rules.contains_key(kind))
            .map(|(&kind, units)| (kind, units.iter().filter(|p| !p.is_inert()).count()))
            .filter(|&(_, live)| live > 0)
            .collect();
        let total: usize = usable.iter().map(|&(_, live)| live).sum();
        if total == 0 {
            return None;
        }
        let mut draw = rng.random_range(0..total);
        for (kind, live) in usable {
            if draw < live {
                return Some(kind);
            }
            draw -= live;
        }
        None
    }

    /// One rule instance, uniform over all owned instances.
    pub fn select_random_rule<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ProductRule> {
        if self.rule_count == 0 {
            return None;
        }
        let draw = rng.random_range(0..self.rule_count);
        self.rules().nth(draw).copied()
    }

    /// One rule instance consuming `kind`, uniform over those instances.
    pub fn select_random_rule_for_type<R: Rng + ?Sized>(
        &self,
        kind: ProductType,
        rng: &mut R,
    ) -> Result<ProductRule, CoreError> {
        let outputs = self
            .rules
            .get(&kind)
            .ok_or_else(|| CoreError::not_found(format!("{} has no rule for type {kind}", self.id)))?;
        let total: usize = outputs.values().map(Vec::len).sum();
        let draw = rng.random_range(0..total);
        outputs
            .values()
            .flatten()
            .nth(draw)
            .copied()
            .ok_or_else(|| CoreError::not_found(format!("{} has no rule for type {kind}", self.id)))
    }

    pub fn select_random_neighbor<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<CellId> {
        if self.neighbors.is_empty() {
            return None;
        }
        let draw = rng.random_range(0..self.neighbors.len());
        self.neighbors.iter().nth(draw).copied()
    }

    /// Recount rule instances from the book, ignoring the cache.
    pub(crate) fn counted_rules(&self) -> usize {
        self.rules.values().flat_map(BTreeMap::values).map(Vec::len).sum()
    }

    pub(crate) fn has_empty_buckets(&self) -> bool {
        self.rules
            .values()
            .any(|outputs| outputs.is_empty() || outputs.values().any(Vec::is_empty))
    }
}
