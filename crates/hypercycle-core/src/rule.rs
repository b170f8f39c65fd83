use crate::cell::CellId;
use crate::config::Chemistry;
use crate::product::ProductType;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u64);

/// The `(input, output)` transformation a rule performs; the identity shared by
/// all instances of the same rule type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RulePair {
    pub input: ProductType,
    pub output: ProductType,
}

impl RulePair {
    pub const fn new(input: ProductType, output: ProductType) -> Self {
        Self { input, output }
    }
}

impl fmt::Display for RulePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.input, self.output)
    }
}

impl From<(ProductType, ProductType)> for RulePair {
    fn from((input, output): (ProductType, ProductType)) -> Self {
        Self { input, output }
    }
}

/// One physical rule instance. Owned by exactly one cell at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProductRule {
    id: RuleId,
    pair: RulePair,
}

impl ProductRule {
    pub const fn new(id: RuleId, input: ProductType, output: ProductType) -> Self {
        Self {
            id,
            pair: RulePair::new(input, output),
        }
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn input(&self) -> ProductType {
        self.pair.input
    }

    pub fn output(&self) -> ProductType {
        self.pair.output
    }

    pub fn pair(&self) -> RulePair {
        self.pair
    }

    /// Rule-type name, e.g. `"1->2"`.
    pub fn name(&self) -> String {
        self.pair.to_string()
    }
}

/// Tally of rule instances sharing one pair. Never owns the instances.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetRule {
    pub pair: RulePair,
    pub count: usize,
    /// First cell observed holding this pair; attribution only.
    pub owner: CellId,
}

impl NetRule {
    pub fn new(pair: RulePair, owner: CellId, count: usize) -> Self {
        Self { pair, count, owner }
    }

    /// Whether this rule's output can be consumed by `other`.
    pub fn feeds(&self, other: &NetRule) -> bool {
        self.pair.output == other.pair.input
    }
}

/// Population-wide NetRule registry, updated as rules are added and removed.
///
/// Entries are created lazily the first time a pair is registered and keep
/// their first owner even after their count drops to zero.
#[derive(Clone, Debug, Default)]
pub struct RuleCensus {
    entries: BTreeMap<RulePair, NetRule>,
}

impl RuleCensus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pair: RulePair, owner: CellId) {
        self.entries
            .entry(pair)
            .and_modify(|net| net.count += 1)
            .or_insert_with(|| NetRule::new(pair, owner, 1));
    }

    pub fn unregister(&mut self, pair: RulePair) {
        let net = self
            .entries
            .get_mut(&pair)
            .unwrap_or_else(|| panic!("census has no entry for {pair}"));
        assert!(net.count > 0, "census count for {pair} would underflow");
        net.count -= 1;
    }

    pub fn get(&self, pair: RulePair) -> Option<&NetRule> {
        self.entries.get(&pair)
    }

    pub fn count(&self, pair: RulePair) -> usize {
        self.entries.get(&pair).map_or(0, |net| net.count)
    }

    /// NetRules with at least one live instance, in pair order.
    pub fn live(&self) -> impl Iterator<Item = &NetRule> {
        self.entries.values().filter(|net| net.count > 0)
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(|net| net.count).sum()
    }
}

/// Draw `count` rule pairs uniformly from the chemistry's pair list.
pub fn create_rule_set<R: Rng + ?Sized>(
    chemistry: &Chemistry,
    product_types: ProductType,
    count: usize,
    rng: &mut R,
) -> Vec<RulePair> {
    let pairs = chemistry.pairs(product_types);
    if pairs.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|_| RulePair::from(pairs[rng.random_range(0..pairs.len())]))
        .collect()
}
