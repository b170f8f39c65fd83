use super::super::Space;
use crate::cell::CellId;
use crate::config::Topology;
use crate::constants::ACTIVE_REPORT_WINDOW;
use crate::metrics::HypercycleReport;
use crate::rule::NetRule;
use crate::rule_net::{CycleMetrics, RuleCompatibilityGraph};
use tracing::info;

impl Space {
    /// Build the compatibility graph from current state: one node per
    /// (living cell, rule pair), linked across every pair of neighboring cells
    /// (every pair of living cells when well mixed).
    pub fn build_rule_net(&self) -> RuleCompatibilityGraph {
        let mut net = RuleCompatibilityGraph::new();
        let per_cell: Vec<(CellId, Vec<NetRule>)> = self
            .cells
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| {
                let rules = c
                    .rule_breakdown()
                    .into_iter()
                    .map(|(pair, count)| NetRule::new(pair, c.id(), count))
                    .collect();
                (c.id(), rules)
            })
            .collect();
        for (_, rules) in &per_cell {
            for rule in rules {
                net.register(rule);
            }
        }

        for (i, (a, rules_a)) in per_cell.iter().enumerate() {
            for (b, rules_b) in &per_cell[i + 1..] {
                let linked = match self.config.topology {
                    Topology::Spatial => self.cells[a.0].neighbors().contains(b),
                    Topology::WellMixed => true,
                };
                if !linked {
                    continue;
                }
                for ra in rules_a {
                    for rb in rules_b {
                        net.add_edge(ra, rb);
                    }
                }
            }
        }
        net
    }

    /// Snapshot the compatibility-graph metrics. `run_budget` is the total
    /// number of ticks the run was given; a run whose last reproduction is
    /// older than the trailing window of that budget is reported inactive,
    /// with zeroed cycle metrics.
    pub fn report(&self, run_budget: u64) -> HypercycleReport {
        let window = (run_budget as f64 * ACTIVE_REPORT_WINDOW) as u64;
        let active = self.last_reproduction_step + window > self.step_count;
        let cycles = if active {
            let mut net = self.build_rule_net();
            net.recompute_cycles(self.step_count, self.config.cycle_budget)
                .clone()
        } else {
            CycleMetrics {
                step: self.step_count,
                ..CycleMetrics::default()
            }
        };
        info!(
            step = self.step_count,
            active,
            cycles = cycles.cycle_count,
            cell_complexity = cycles.plus3_cell_complexity,
            rule_complexity = cycles.plus3_rule_complexity,
            truncated = cycles.truncated,
            "rule network analyzed"
        );
        HypercycleReport {
            cycles,
            last_reproduction_step: self.last_reproduction_step,
            active,
            alive_cells: self.alive_count(),
            total_rules: self.total_rules,
        }
    }
}
