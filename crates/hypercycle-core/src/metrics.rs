use crate::cell::{Cell, CellId};
use crate::product::ProductType;
use crate::rule::RuleCensus;
use crate::rule_net::CycleMetrics;
use crate::spatial::Location;
use crate::urn::Urn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running totals of population events since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounters {
    pub reproductions: usize,
    pub deletions: usize,
    pub deaths: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StepMetrics {
    pub step: u64,
    pub alive_cells: usize,
    pub total_rules: usize,
    /// Rule pairs with at least one live instance.
    pub distinct_rule_pairs: usize,
    pub urn_size: usize,
    pub stored_products: usize,
    /// Urn units per product type.
    pub urn_counts: BTreeMap<ProductType, usize>,
    pub urn_energy: f64,
    pub reproductions: usize,
    pub deletions: usize,
    pub deaths: usize,
}

/// Render-facing view of one cell.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CellSnapshot {
    pub id: CellId,
    pub location: Location,
    pub rule_count: usize,
    pub stored: usize,
    pub neighbors: usize,
    pub alive: bool,
}

impl CellSnapshot {
    pub fn of(cell: &Cell) -> Self {
        Self {
            id: cell.id(),
            location: cell.location(),
            rule_count: cell.rule_count(),
            stored: cell.stored_count(),
            neighbors: cell.neighbors().len(),
            alive: cell.is_alive(),
        }
    }
}

/// Compatibility-graph metrics plus the reproduction bookkeeping needed to
/// tell a live run from a frozen one.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HypercycleReport {
    pub cycles: CycleMetrics,
    pub last_reproduction_step: u64,
    /// Whether a reproduction happened within the trailing report window of
    /// the run budget. Inactive runs are reported with zeroed metrics.
    pub active: bool,
    pub alive_cells: usize,
    pub total_rules: usize,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub seed: u64,
    pub steps: usize,
    pub sample_every: usize,
    pub final_alive_cells: usize,
    pub samples: Vec<StepMetrics>,
    #[serde(default)]
    pub events: EventCounters,
    pub report: HypercycleReport,
}

pub fn collect_step_metrics(
    step: u64,
    cells: &[Cell],
    urn: &Urn,
    census: &RuleCensus,
    events: EventCounters,
) -> StepMetrics {
    let alive = cells.iter().filter(|c| c.is_alive());
    let (alive_cells, total_rules, stored_products) =
        alive.fold((0, 0, 0), |(n, rules, stored), c| {
            (n + 1, rules + c.rule_count(), stored + c.stored_count())
        });
    StepMetrics {
        step,
        alive_cells,
        total_rules,
        distinct_rule_pairs: census.live().count(),
        urn_size: urn.len(),
        stored_products,
        urn_counts: urn.counts(),
        urn_energy: urn.total_energy(),
        reproductions: events.reproductions,
        deletions: events.deletions,
        deaths: events.deaths,
    }
}
