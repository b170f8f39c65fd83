use super::super::{Space, TickOutcome};
use crate::cell::{Cell, CellId};
use crate::config::{TickPolicy, Topology};
use crate::rule::{ProductRule, RulePair};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use tracing::trace;

impl Space {
    /// A living cell drawn with probability proportional to its rule count,
    /// optionally never `excluding`. `None` when no candidate holds a rule.
    pub fn select_random_cell(&mut self, excluding: Option<CellId>) -> Option<CellId> {
        let weight = |cell: &Cell| {
            if cell.is_alive() && Some(cell.id()) != excluding {
                cell.rule_count()
            } else {
                0
            }
        };
        let total: usize = self.cells.iter().map(weight).sum();
        if total == 0 {
            return None;
        }
        let mut draw = self.rng.random_range(0..total);
        for cell in &self.cells {
            let w = weight(cell);
            if draw < w {
                return Some(cell.id());
            }
            draw -= w;
        }
        None
    }

    /// Delete one rule instance: a cell weighted by rule count, then one of its
    /// rules uniformly. Returns where it came from and what it was.
    pub fn remove_random_rule(&mut self) -> Option<(CellId, RulePair)> {
        let id = self.select_random_cell(None)?;
        let rule = self.cells[id.0].select_random_rule(&mut self.rng)?;
        if let Err(e) = self.remove_rule(id, &rule) {
            panic!("rule drawn from {id} could not be removed: {e}");
        }
        self.events.deletions += 1;
        Some((id, rule.pair()))
    }

    /// One tick under the configured [`TickPolicy`].
    pub fn step(&mut self) -> TickOutcome {
        match self.config.tick_policy {
            TickPolicy::RandomRule => self.activate_random_rule(),
            TickPolicy::RandomCell => self.activate_random_cell(),
        }
    }

    /// Tick: pick a cell, move it, activate one of its rules uniformly by
    /// instance and run its step protocol.
    pub fn activate_random_rule(&mut self) -> TickOutcome {
        self.tick_with(|cell, rng| cell.select_random_rule(rng))
    }

    /// Tick like [`Space::activate_random_rule`], except that when the cell
    /// already stores a product it can consume, the rule is drawn among the
    /// rules for that product's type.
    pub fn activate_random_cell(&mut self) -> TickOutcome {
        self.tick_with(|cell, rng| match cell.has_compatible_product(rng) {
            Some(kind) => cell.select_random_rule_for_type(kind, rng).ok(),
            None => cell.select_random_rule(rng),
        })
    }

    fn tick_with(
        &mut self,
        pick_rule: impl FnOnce(&Cell, &mut ChaCha12Rng) -> Option<ProductRule>,
    ) -> TickOutcome {
        self.step_count += 1;
        let Some(id) = self.select_random_cell(None) else {
            trace!(step = self.step_count, "no selectable cell");
            return TickOutcome::Idle;
        };
        if self.config.topology == Topology::Spatial {
            let dx = self.rng.random_range(-1..=1);
            let dy = self.rng.random_range(-1..=1);
            self.shift_cell(id, dx, dy);
        }
        let Some(rule) = pick_rule(&self.cells[id.0], &mut self.rng) else {
            return TickOutcome::Idle;
        };
        if let Err(e) = self.cells[id.0].set_active_rule(rule) {
            panic!("rule drawn from {id} is not owned by it: {e}");
        }
        let outcome = self.chain_step(id);
        if self.config.invariant_checks {
            self.assert_invariants();
        }
        TickOutcome::Stepped { cell: id, outcome }
    }
}
