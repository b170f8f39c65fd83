use super::super::{ChainOutcome, Delivery, EnergyStage, Reproduction, Space};
use crate::cell::CellId;
use crate::config::{ReproductionMode, RequestPolicyKind, Topology};
use crate::product::Product;
use tracing::{debug, trace};

/// Where a product was obtained from, so it can be put back there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    Storage,
    Urn,
}

impl Space {
    /// Run the step protocol for `id`'s active rule: obtain an input product
    /// (own storage first, then the urn), transform it, and hand it to a
    /// neighbor or keep it when there is none.
    pub fn chain_step(&mut self, id: CellId) -> ChainOutcome {
        let Some(cell) = self.cells.get(id.0).filter(|c| c.is_alive()) else {
            return ChainOutcome::NoActiveRule;
        };
        let Some(mut rule) = cell.active_rule() else {
            return ChainOutcome::NoActiveRule;
        };

        let (mut product, origin) = match self.cells[id.0].take_product(rule.input()) {
            Some(product) => (product, Origin::Storage),
            None => {
                let usable = self.cells[id.0].input_types();
                let selective = self.config.request_policy == RequestPolicyKind::Selective;
                match self
                    .urn
                    .request_product(rule.input(), &usable, selective, &mut self.rng)
                {
                    Some(product) => (product, Origin::Urn),
                    None => {
                        trace!(cell = %id, kind = rule.input(), "no product available");
                        return ChainOutcome::NoProduct;
                    }
                }
            }
        };

        if product.is_inert() {
            trace!(cell = %id, product = ?product.id(), from = ?origin, "obtained product is inert");
            self.urn.return_product(product);
            return ChainOutcome::Inert;
        }

        if product.kind() != rule.input() {
            // A selective urn substituted another usable type.
            let cell = &mut self.cells[id.0];
            match cell.select_random_rule_for_type(product.kind(), &mut self.rng) {
                Ok(substitute) => {
                    rule = substitute;
                    if let Err(e) = cell.set_active_rule(rule) {
                        panic!("rule drawn from {id} is not owned by it: {e}");
                    }
                }
                Err(_) => {
                    self.urn.return_product(product);
                    return ChainOutcome::NoProduct;
                }
            }
        }

        let costs = self.config.energy_costs;
        if !product.apply_rule(&rule, costs.transform) {
            trace!(cell = %id, "not enough energy to transform");
            self.urn.return_product(product);
            return ChainOutcome::EnergyExhausted(EnergyStage::Transform);
        }

        let target = match self.config.topology {
            Topology::Spatial => self.cells[id.0].select_random_neighbor(&mut self.rng),
            Topology::WellMixed => self.select_random_cell(Some(id)),
        };
        let Some(to) = target else {
            self.store_or_release(id, product);
            return ChainOutcome::Retained;
        };
        if !product.use_energy(costs.pass) {
            trace!(cell = %id, "not enough energy to pass");
            self.urn.return_product(product);
            return ChainOutcome::EnergyExhausted(EnergyStage::Pass);
        }
        let delivery = self.receive_product(to, id, product);
        ChainOutcome::Delivered { to, delivery }
    }

    /// Hand `product`, sent by `from`, to `to`. A receiver with a rule for the
    /// product's type pays the reproduction cost, activates that rule,
    /// triggers reproduction (in itself or in the sender, per
    /// [`ReproductionMode`]) and stores the product. Anything else goes to the
    /// urn.
    pub fn receive_product(&mut self, to: CellId, from: CellId, mut product: Product) -> Delivery {
        let accepts = self
            .cells
            .get(to.0)
            .is_some_and(|c| c.is_alive() && c.has_rule_for(product.kind()));
        if !accepts || product.is_inert() {
            trace!(cell = %to, kind = product.kind(), "delivery rejected");
            self.urn.return_product(product);
            return Delivery::Rejected;
        }
        if !product.use_energy(self.config.energy_costs.reproduce) {
            trace!(cell = %to, "not enough energy to reproduce");
            self.urn.return_product(product);
            return Delivery::Exhausted;
        }

        let receiver = &mut self.cells[to.0];
        let rule = match receiver.select_random_rule_for_type(product.kind(), &mut self.rng) {
            Ok(rule) => rule,
            Err(_) => {
                self.urn.return_product(product);
                return Delivery::Rejected;
            }
        };
        if let Err(e) = receiver.set_active_rule(rule) {
            panic!("rule drawn from {to} is not owned by it: {e}");
        }

        let parent = match self.config.reproduction_mode {
            ReproductionMode::Target => to,
            ReproductionMode::Source => from,
        };
        let reproduced_in = self.reproduce_active_rule(parent).map(|r| r.parent);

        if self.cells[to.0].is_alive() {
            self.store_or_release(to, product);
            Delivery::Stored { reproduced_in }
        } else {
            self.urn.return_product(product);
            Delivery::Orphaned { reproduced_in }
        }
    }

    /// Keep `product` in `id`'s storage unless it is spent. Spent products
    /// go to the urn so they never sit on top of a storage stack.
    fn store_or_release(&mut self, id: CellId, product: Product) {
        if product.is_inert() {
            trace!(cell = %id, product = ?product.id(), "spent product released");
            self.urn.return_product(product);
        } else {
            self.cells[id.0].add_product(product);
        }
    }

    /// Copy `parent`'s active rule as a new instance in `parent`, then delete
    /// one rule anywhere in the population to compensate.
    pub fn reproduce_active_rule(&mut self, parent: CellId) -> Option<Reproduction> {
        let cell = self.cells.get(parent.0)?;
        if !cell.is_alive() {
            debug!(cell = %parent, "dead cell cannot reproduce");
            return None;
        }
        let Some(active) = cell.active_rule() else {
            debug!(cell = %parent, "no active rule to reproduce");
            return None;
        };
        let rule = match self.add_rule(parent, active.pair()) {
            Ok(rule) => rule,
            Err(e) => {
                debug!(cell = %parent, error = %e, "reproduction refused");
                return None;
            }
        };
        self.last_reproduction_step = self.step_count;
        self.events.reproductions += 1;
        let removed = self.remove_random_rule();
        debug!(
            cell = %parent,
            pair = %active.pair(),
            removed = ?removed,
            step = self.step_count,
            "rule reproduced"
        );
        Some(Reproduction {
            parent,
            rule,
            pair: active.pair(),
            removed,
        })
    }
}
