use crate::rule::ProductRule;
use serde::{Deserialize, Serialize};

/// Product type tag; valid types are `1..=SimConfig::product_types`.
pub type ProductType = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u32);

/// A typed, energy-bearing token.
///
/// Not `Clone`: a product lives in exactly one place (urn pool, one cell's
/// storage, or in flight inside a single tick) and moves by value.
#[derive(Debug, PartialEq)]
pub struct Product {
    id: ProductId,
    kind: ProductType,
    energy: f64,
}

impl Product {
    pub(crate) fn new(id: ProductId, kind: ProductType, energy: f64) -> Self {
        Self { id, kind, energy }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn kind(&self) -> ProductType {
        self.kind
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Zero-energy products are permanently inert.
    pub fn is_inert(&self) -> bool {
        self.energy <= 0.0
    }

    /// Deduct `cost` if affordable. Returns `false` (and leaves the product
    /// untouched) when the remaining energy is below the cost.
    pub fn use_energy(&mut self, cost: f64) -> bool {
        if self.energy < cost {
            return false;
        }
        self.energy -= cost;
        true
    }

    /// Pay `cost` and retype the product to the rule's output.
    pub fn apply_rule(&mut self, rule: &ProductRule, cost: f64) -> bool {
        debug_assert_eq!(self.kind, rule.input(), "rule applied to foreign product type");
        if !self.use_energy(cost) {
            return false;
        }
        self.kind = rule.output();
        true
    }
}
