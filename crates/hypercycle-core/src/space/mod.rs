use crate::cell::{Cell, CellId};
use crate::config::{RequestPolicyKind, SimConfig, SimConfigError};
use crate::error::CoreError;
use crate::metrics::{CellSnapshot, EventCounters, RunSummary, StepMetrics};
use crate::product::{ProductId, ProductType};
use crate::rng::{create_rng, derive_stream};
use crate::rule::{create_rule_set, ProductRule, RuleCensus, RuleId, RulePair};
use crate::spatial::{GridBounds, OccupancyGrid, OverlapLists};
use crate::urn::{RequestPolicy, SelectivePolicy, UniformPolicy, Urn};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::{error::Error, fmt};
use tracing::{debug, info};

const RULE_STREAM_SALT: u64 = 1;
const URN_STREAM_SALT: u64 = 2;

/// Which stage of a product's journey ran out of energy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnergyStage {
    Transform,
    Pass,
    Reproduce,
}

/// What happened to a product handed to a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Stored by the receiver; `reproduced_in` names the cell whose active
    /// rule was copied, if reproduction went ahead.
    Stored { reproduced_in: Option<CellId> },
    /// No matching rule, dead receiver or inert product; sent to the urn.
    Rejected,
    /// Could not pay the reproduction cost; sent to the urn.
    Exhausted,
    /// Accepted, but the receiver died in the deletion that followed; sent to
    /// the urn.
    Orphaned { reproduced_in: Option<CellId> },
}

/// Soft result of one cell's step protocol. None of these are errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    NoActiveRule,
    /// Neither storage nor urn could supply the input type.
    NoProduct,
    /// The obtained product had no energy left; it went back where it came from.
    Inert,
    EnergyExhausted(EnergyStage),
    /// No one to pass to; the transformed product stays in the cell's storage.
    Retained,
    Delivered { to: CellId, delivery: Delivery },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No living cell holds any rule.
    Idle,
    Stepped { cell: CellId, outcome: ChainOutcome },
}

/// A rule copied into `parent` and the compensating deletion it caused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reproduction {
    pub parent: CellId,
    pub rule: RuleId,
    pub pair: RulePair,
    pub removed: Option<(CellId, RulePair)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpaceInitError {
    Config(SimConfigError),
    Placement(CoreError),
}

impl fmt::Display for SpaceInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceInitError::Config(e) => write!(f, "{e}"),
            SpaceInitError::Placement(e) => write!(f, "cell placement failed: {e}"),
        }
    }
}

impl From<SimConfigError> for SpaceInitError {
    fn from(err: SimConfigError) -> Self {
        SpaceInitError::Config(err)
    }
}

impl From<CoreError> for SpaceInitError {
    fn from(err: CoreError) -> Self {
        SpaceInitError::Placement(err)
    }
}

impl Error for SpaceInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SpaceInitError::Config(e) => Some(e),
            SpaceInitError::Placement(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManySteps { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
        }
    }
}

impl Error for ExperimentError {}

/// The simulation state owner: cells on a periodic grid, the urn, the rule
/// census and the tick counter. Cells are addressed by [`CellId`], their index
/// in placement order.
#[derive(Debug)]
pub struct Space {
    config: SimConfig,
    bounds: GridBounds,
    grid: OccupancyGrid,
    overlap: OverlapLists,
    cells: Vec<Cell>,
    urn: Urn,
    census: RuleCensus,
    rng: ChaCha12Rng,
    step_count: u64,
    last_reproduction_step: u64,
    total_rules: usize,
    total_products: usize,
    next_rule_id: u64,
    events: EventCounters,
}

fn policy_for(kind: RequestPolicyKind) -> Box<dyn RequestPolicy> {
    match kind {
        RequestPolicyKind::Uniform => Box::new(UniformPolicy),
        RequestPolicyKind::Selective => Box::new(SelectivePolicy),
    }
}

impl Space {
    pub const MAX_EXPERIMENT_STEPS: usize = 100_000_000;

    /// Build a populated space: seed the urn, place `cell_count` cells and
    /// deal `rule_count` chemistry rules to uniformly random cells. Cells dealt
    /// no rule are dead from the start.
    pub fn new(config: SimConfig) -> Result<Self, SpaceInitError> {
        let mut space = Self::empty(config)?;

        let mut urn_rng = derive_stream(space.config.seed, URN_STREAM_SALT);
        let mut urn = Urn::seeded(
            space.config.product_types,
            space.config.product_count,
            space.config.initial_energy,
            &mut urn_rng,
        );
        urn.set_policy(policy_for(space.config.request_policy));
        space.total_products = urn.len();
        space.urn = urn;

        let cells = (0..space.config.cell_count)
            .map(|i| Cell::new(CellId(i)))
            .collect();
        let ids = space.place_cells(cells)?;

        let mut rule_rng = derive_stream(space.config.seed, RULE_STREAM_SALT);
        let pairs = create_rule_set(
            &space.config.chemistry,
            space.config.product_types,
            space.config.rule_count,
            &mut rule_rng,
        );
        for pair in pairs {
            let owner = ids[rule_rng.random_range(0..ids.len())];
            space.add_rule(owner, pair)?;
        }

        let barren: Vec<CellId> = ids
            .iter()
            .copied()
            .filter(|&id| space.cells[id.0].rule_count() == 0)
            .collect();
        for id in barren {
            space.kill_cell(id);
        }
        space.events = EventCounters::default();

        info!(
            cells = space.cells.len(),
            alive = space.alive_count(),
            rules = space.total_rules,
            products = space.total_products,
            "space initialized"
        );
        Ok(space)
    }

    /// A validated space with no cells, rules or products. Populate it with
    /// [`Space::place_cell_at`], [`Space::add_rule`] and
    /// [`Space::deposit_product`].
    pub fn empty(config: SimConfig) -> Result<Self, SpaceInitError> {
        config.validate()?;
        let bounds = GridBounds::new(config.space_width, config.space_height);
        Ok(Self {
            bounds,
            grid: OccupancyGrid::new(bounds),
            overlap: OverlapLists::new(config.vision_radius),
            cells: Vec::new(),
            urn: Urn::with_policy(policy_for(config.request_policy)),
            census: RuleCensus::new(),
            rng: create_rng(config.seed),
            step_count: 0,
            last_reproduction_step: 0,
            total_rules: 0,
            total_products: 0,
            next_rule_id: 0,
            events: EventCounters::default(),
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_reproduction_step(&self) -> u64 {
        self.last_reproduction_step
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.0)
    }

    pub fn cell_snapshots(&self) -> Vec<CellSnapshot> {
        self.cells.iter().map(CellSnapshot::of).collect()
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_alive()).count()
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    pub fn census(&self) -> &RuleCensus {
        &self.census
    }

    pub fn total_rules(&self) -> usize {
        self.total_rules
    }

    /// Products in circulation; constant apart from [`Space::deposit_product`].
    pub fn total_products(&self) -> usize {
        self.total_products
    }

    pub fn events(&self) -> EventCounters {
        self.events
    }

    /// Rule pairs held by `id` and their multiplicities.
    pub fn rule_breakdown(&self, id: CellId) -> Result<Vec<(RulePair, usize)>, CoreError> {
        Ok(self.checked_cell(id)?.rule_breakdown())
    }

    /// Stored units per product type held by `id`.
    pub fn storage_breakdown(&self, id: CellId) -> Result<BTreeMap<ProductType, usize>, CoreError> {
        Ok(self.checked_cell(id)?.storage_breakdown())
    }

    fn checked_cell(&self, id: CellId) -> Result<&Cell, CoreError> {
        self.cells
            .get(id.0)
            .ok_or_else(|| CoreError::not_found(format!("no {id} in this space")))
    }

    fn checked_cell_mut(&mut self, id: CellId) -> Result<&mut Cell, CoreError> {
        self.cells
            .get_mut(id.0)
            .ok_or_else(|| CoreError::not_found(format!("no {id} in this space")))
    }

    /// Mint a product into the urn.
    pub fn deposit_product(
        &mut self,
        kind: ProductType,
        energy: f64,
    ) -> Result<ProductId, CoreError> {
        if !self.config.is_product_type(kind) {
            return Err(CoreError::invalid(format!(
                "product type {kind} is outside 1..={}",
                self.config.product_types
            )));
        }
        if !(energy.is_finite() && energy >= 0.0) {
            return Err(CoreError::invalid(format!("product energy {energy} is not a valid amount")));
        }
        self.total_products += 1;
        Ok(self.urn.deposit(kind, energy))
    }

    /// Give `id` a fresh rule instance for `pair`.
    pub fn add_rule(&mut self, id: CellId, pair: RulePair) -> Result<RuleId, CoreError> {
        if !(self.config.is_product_type(pair.input) && self.config.is_product_type(pair.output)) {
            return Err(CoreError::invalid(format!(
                "rule {pair} uses a type outside 1..={}",
                self.config.product_types
            )));
        }
        let rule = ProductRule::new(RuleId(self.next_rule_id), pair.input, pair.output);
        self.checked_cell_mut(id)?.add_rule(rule)?;
        self.next_rule_id += 1;
        self.census.register(pair, id);
        self.total_rules += 1;
        Ok(rule.id())
    }

    /// Remove one specific rule instance from `id`. Losing the last rule kills
    /// the cell; losing the last rule for a type releases stored units of that
    /// type to the urn.
    pub fn remove_rule(&mut self, id: CellId, rule: &ProductRule) -> Result<(), CoreError> {
        let cell = self
            .cells
            .get_mut(id.0)
            .ok_or_else(|| CoreError::not_found(format!("no {id} in this space")))?;
        cell.remove_rule(rule, &mut self.urn)?;
        self.census.unregister(rule.pair());
        self.total_rules -= 1;
        if cell.is_alive() {
            if !cell.has_rule_for(rule.input()) {
                cell.release_unusable(&mut self.urn);
            }
        } else {
            self.kill_cell(id);
        }
        Ok(())
    }

    /// Make `rule` the active rule of `id`.
    pub fn set_active_rule(&mut self, id: CellId, rule: ProductRule) -> Result<(), CoreError> {
        self.checked_cell_mut(id)?.set_active_rule(rule)
    }

    /// Take a dead (or rule-less) cell off the grid and out of every neighbor
    /// set. Idempotent.
    fn kill_cell(&mut self, id: CellId) {
        let cell = &mut self.cells[id.0];
        if cell.is_alive() {
            cell.retire(&mut self.urn);
        }
        let location = cell.location();
        let neighbors: Vec<CellId> = cell.neighbors().iter().copied().collect();
        for other in &neighbors {
            self.unlink(id, *other);
        }
        if self.grid.remove(location, id) {
            self.events.deaths += 1;
            debug!(cell = %id, step = self.step_count, "cell died");
        }
    }

    fn link(&mut self, a: CellId, b: CellId) {
        if a != b {
            self.cells[a.0].add_neighbor(b);
            self.cells[b.0].add_neighbor(a);
        }
    }

    fn unlink(&mut self, a: CellId, b: CellId) {
        self.cells[a.0].remove_neighbor(b);
        self.cells[b.0].remove_neighbor(a);
    }

    pub fn collect_step_metrics(&self) -> StepMetrics {
        crate::metrics::collect_step_metrics(
            self.step_count,
            &self.cells,
            &self.urn,
            &self.census,
            self.events,
        )
    }

    /// Advance `steps` ticks, sampling metrics every `sample_every` ticks and
    /// at the end, then report the compatibility graph.
    pub fn run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }

        let mut samples = Vec::with_capacity(steps / sample_every + 1);
        for step in 1..=steps {
            self.step();
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics());
            }
        }
        let report = self.report(steps as u64);
        info!(
            steps,
            alive = report.alive_cells,
            cycles = report.cycles.cycle_count,
            hypercycles = report.cycles.hypercycle_count,
            "experiment finished"
        );
        Ok(RunSummary {
            schema_version: 1,
            seed: self.config.seed,
            steps,
            sample_every,
            final_alive_cells: self.alive_count(),
            samples,
            events: self.events,
            report,
        })
    }

    /// Check the conservation and ownership invariants. Panics on violation.
    pub fn assert_invariants(&self) {
        let stored: usize = self.cells.iter().map(Cell::stored_count).sum();
        assert_eq!(
            self.urn.len() + stored,
            self.total_products,
            "product conservation violated at step {}",
            self.step_count
        );
        let mut seen = BTreeSet::new();
        let all_products = self
            .urn
            .products()
            .chain(self.cells.iter().flat_map(Cell::stored_products));
        for product in all_products {
            assert!(
                seen.insert(product.id()),
                "product {:?} owned twice at step {}",
                product.id(),
                self.step_count
            );
        }

        let mut rules = 0;
        for cell in &self.cells {
            assert_eq!(
                cell.rule_count(),
                cell.counted_rules(),
                "{} rule_count cache diverged",
                cell.id()
            );
            assert!(!cell.has_empty_buckets(), "{} kept an empty rule bucket", cell.id());
            if !cell.is_alive() {
                assert_eq!(cell.stored_count(), 0, "dead {} still stores products", cell.id());
                assert!(cell.neighbors().is_empty(), "dead {} still has neighbors", cell.id());
            }
            for other in cell.neighbors() {
                assert!(
                    self.cells[other.0].neighbors().contains(&cell.id()),
                    "neighbor asymmetry between {} and {other}",
                    cell.id()
                );
            }
            rules += cell.rule_count();
        }
        assert_eq!(rules, self.total_rules, "total rule count drifted");
        assert_eq!(self.census.total(), self.total_rules, "census out of sync");
    }
}

mod phases;
#[cfg(test)]
mod tests;
