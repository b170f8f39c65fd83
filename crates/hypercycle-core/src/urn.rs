use crate::product::{Product, ProductId, ProductType};
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::fmt;

/// Decides which product type answers a request when the requesting cell is
/// allowed to be selective.
pub trait RequestPolicy: fmt::Debug {
    /// Pick the type to hand out for a request of `requested` by a cell whose
    /// rules accept `usable`. `None` means the request fails.
    fn choose_type(
        &self,
        requested: ProductType,
        usable: &[ProductType],
        urn: &Urn,
        rng: &mut dyn RngCore,
    ) -> Option<ProductType>;
}

/// Hands out only the requested type.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformPolicy;

impl RequestPolicy for UniformPolicy {
    fn choose_type(
        &self,
        requested: ProductType,
        _usable: &[ProductType],
        urn: &Urn,
        _rng: &mut dyn RngCore,
    ) -> Option<ProductType> {
        (urn.count(requested) > 0).then_some(requested)
    }
}

/// Serves the requested type when stocked; otherwise substitutes one of the
/// cell's usable types, weighted by how many active units of it the pool holds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectivePolicy;

impl RequestPolicy for SelectivePolicy {
    fn choose_type(
        &self,
        requested: ProductType,
        usable: &[ProductType],
        urn: &Urn,
        rng: &mut dyn RngCore,
    ) -> Option<ProductType> {
        if urn.active_count(requested) > 0 {
            return Some(requested);
        }
        let mut candidates: Vec<(ProductType, usize)> = usable
            .iter()
            .copied()
            .filter(|&t| t != requested)
            .map(|t| (t, urn.active_count(t)))
            .filter(|&(_, n)| n > 0)
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        let total: usize = candidates.iter().map(|&(_, n)| n).sum();
        if total == 0 {
            return (urn.count(requested) > 0).then_some(requested);
        }
        let mut draw = rng.random_range(0..total);
        for (kind, n) in candidates {
            if draw < n {
                return Some(kind);
            }
            draw -= n;
        }
        None
    }
}

/// The shared pool of products not held by any cell.
#[derive(Debug)]
pub struct Urn {
    pool: BTreeMap<ProductType, Vec<Product>>,
    len: usize,
    next_product_id: u32,
    policy: Box<dyn RequestPolicy>,
}

impl Default for Urn {
    fn default() -> Self {
        Self::new()
    }
}

impl Urn {
    /// An empty urn whose selective requests use [`SelectivePolicy`].
    pub fn new() -> Self {
        Self::with_policy(Box::new(SelectivePolicy))
    }

    pub fn with_policy(policy: Box<dyn RequestPolicy>) -> Self {
        Self {
            pool: BTreeMap::new(),
            len: 0,
            next_product_id: 0,
            policy,
        }
    }

    /// An urn holding `count` products of uniformly random type, each
    /// carrying `energy`.
    pub fn seeded<R: Rng + ?Sized>(
        product_types: ProductType,
        count: usize,
        energy: f64,
        rng: &mut R,
    ) -> Self {
        let mut urn = Self::new();
        for _ in 0..count {
            let kind = rng.random_range(1..=product_types);
            urn.deposit(kind, energy);
        }
        urn
    }

    /// Replace the policy used for selective requests.
    pub fn set_policy(&mut self, policy: Box<dyn RequestPolicy>) {
        self.policy = policy;
    }

    /// Mint a new product directly into the pool.
    pub fn deposit(&mut self, kind: ProductType, energy: f64) -> ProductId {
        let id = ProductId(self.next_product_id);
        self.next_product_id = self
            .next_product_id
            .checked_add(1)
            .expect("product id space exhausted");
        self.return_product(Product::new(id, kind, energy));
        id
    }

    /// Take a product for a cell that wants `kind`.
    ///
    /// Without intelligence only `kind` is served, uniformly at random among
    /// its units. With intelligence the configured [`RequestPolicy`] may
    /// substitute another type from `usable`.
    pub fn request_product<R: Rng>(
        &mut self,
        kind: ProductType,
        usable: &[ProductType],
        use_intelligence: bool,
        rng: &mut R,
    ) -> Option<Product> {
        let chosen = if use_intelligence {
            self.policy.choose_type(kind, usable, self, &mut *rng)?
        } else {
            kind
        };
        self.take_random(chosen, rng)
    }

    fn take_random<R: Rng>(&mut self, kind: ProductType, rng: &mut R) -> Option<Product> {
        let bucket = self.pool.get_mut(&kind)?;
        if bucket.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..bucket.len());
        let product = bucket.swap_remove(idx);
        self.len -= 1;
        Some(product)
    }

    /// Put a product back under its current type. Always succeeds.
    pub fn return_product(&mut self, product: Product) {
        self.pool.entry(product.kind()).or_default().push(product);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn count(&self, kind: ProductType) -> usize {
        self.pool.get(&kind).map_or(0, Vec::len)
    }

    /// Units of `kind` that still carry energy.
    pub fn active_count(&self, kind: ProductType) -> usize {
        self.pool
            .get(&kind)
            .map_or(0, |b| b.iter().filter(|p| !p.is_inert()).count())
    }

    /// Units per type, omitting empty types.
    pub fn counts(&self) -> BTreeMap<ProductType, usize> {
        self.pool
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(&k, b)| (k, b.len()))
            .collect()
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.pool.values().flatten()
    }

    pub fn total_energy(&self) -> f64 {
        self.products().map(Product::energy).sum()
    }
}
