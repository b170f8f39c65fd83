use crate::product::ProductType;
use serde::{Deserialize, Serialize};

/// Which cell's rule is copied when a passed product is accepted.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReproductionMode {
    /// The sending cell reproduces the rule it just applied.
    Source,
    /// The receiving cell reproduces the rule it selected for the product.
    #[default]
    Target,
}

/// How products find their next holder.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Cells move on the torus and pass to neighbors within `vision_radius`.
    #[default]
    Spatial,
    /// No motion; products go to any other living cell, weighted by rule count.
    WellMixed,
}

/// Per-tick activation protocol.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// Pick any of the activated cell's rules uniformly by instance.
    #[default]
    RandomRule,
    /// Prefer a rule that consumes a product already in the cell's storage.
    RandomCell,
}

/// Urn behavior when a cell requests a product.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestPolicyKind {
    /// Only the requested type is ever handed out.
    #[default]
    Uniform,
    /// An empty request may be satisfied with another type the cell can use.
    Selective,
}

/// The set of `(input, output)` transformations rules are drawn from.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Chemistry {
    /// Every ordered pair of distinct types.
    #[default]
    All,
    /// The ring `1 -> 2 -> ... -> N -> 1`.
    Hypercycle,
    /// A caller-supplied pair list.
    Explicit { pairs: Vec<(ProductType, ProductType)> },
}

impl Chemistry {
    /// Expand the descriptor into its pair list for `product_types` types.
    pub fn pairs(&self, product_types: ProductType) -> Vec<(ProductType, ProductType)> {
        match self {
            Chemistry::All => (1..=product_types)
                .flat_map(|i| {
                    (1..=product_types)
                        .filter(move |&j| j != i)
                        .map(move |j| (i, j))
                })
                .collect(),
            Chemistry::Hypercycle => (1..=product_types)
                .map(|i| (i, i % product_types + 1))
                .collect(),
            Chemistry::Explicit { pairs } => pairs.clone(),
        }
    }
}

/// Energy deducted from a product at each stage of its journey.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnergyCosts {
    pub pass: f64,
    pub transform: f64,
    pub reproduce: f64,
}

impl EnergyCosts {
    pub const fn uniform(cost: f64) -> Self {
        Self {
            pass: cost,
            transform: cost,
            reproduce: cost,
        }
    }

    fn is_valid(&self) -> bool {
        [self.pass, self.transform, self.reproduce]
            .iter()
            .all(|c| c.is_finite() && *c >= 0.0)
    }
}

impl Default for EnergyCosts {
    fn default() -> Self {
        Self::uniform(1.0 / 3.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible simulation runs.
    pub seed: u64,
    /// Number of product types; types are `1..=product_types`.
    pub product_types: ProductType,
    /// Transformation pairs initial rules are drawn from.
    pub chemistry: Chemistry,
    /// Number of cells created by `Space::new`.
    pub cell_count: usize,
    /// Number of rules handed out to cells at construction.
    pub rule_count: usize,
    /// Number of products seeded into the urn.
    pub product_count: usize,
    /// Energy carried by each seeded product.
    pub initial_energy: f64,
    /// Grid extent along x; coordinates run `1..=space_width`.
    pub space_width: i32,
    /// Grid extent along y; coordinates run `1..=space_height`.
    pub space_height: i32,
    /// Euclidean radius (periodic) within which cells are neighbors.
    pub vision_radius: f64,
    /// Minimum separation between cells, enforced only at initial placement.
    pub cell_exclusion_radius: f64,
    pub energy_costs: EnergyCosts,
    pub reproduction_mode: ReproductionMode,
    pub topology: Topology,
    pub tick_policy: TickPolicy,
    pub request_policy: RequestPolicyKind,
    /// Random draws allowed per cell before placement gives up.
    pub placement_attempts: usize,
    /// Upper bound on simple cycles enumerated per analysis.
    pub cycle_budget: usize,
    /// Assert the conservation and ownership invariants after every tick.
    pub invariant_checks: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            product_types: 3,
            chemistry: Chemistry::All,
            cell_count: 20,
            rule_count: 200,
            product_count: 200,
            initial_energy: 10.0,
            space_width: 10,
            space_height: 10,
            vision_radius: 1.5,
            cell_exclusion_radius: 0.005,
            energy_costs: EnergyCosts::default(),
            reproduction_mode: ReproductionMode::Target,
            topology: Topology::Spatial,
            tick_policy: TickPolicy::RandomRule,
            request_policy: RequestPolicyKind::Uniform,
            placement_attempts: 10_000,
            cycle_budget: 100_000,
            invariant_checks: true,
        }
    }
}

macro_rules! define_sim_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum SimConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for SimConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_sim_config_error! {
    InvalidProductTypes => "product_types must be greater than 0";
    TooManyProductTypes { max: u16, actual: u16 } => "Too many product types: {} > max {}", actual, max;
    InvalidCellCount => "cell_count must be greater than 0";
    TooManyCells { max: usize, actual: usize } => "Too many cells: {} > max {}", actual, max;
    InvalidSpaceDimensions => "space_width and space_height must be positive";
    SpaceTooLarge { max: i32, actual: i32 } => "grid edge ({actual}) exceeds supported maximum ({max})";
    CellsExceedGrid { cells: usize, capacity: usize } => "cell_count ({cells}) exceeds grid capacity ({capacity})";
    InvalidVisionRadius => "vision_radius must be finite and non-negative";
    InvalidExclusionRadius => "cell_exclusion_radius must be finite and non-negative";
    InvalidEnergyCosts => "energy costs must be finite and non-negative";
    InvalidInitialEnergy => "initial_energy must be finite and non-negative";
    EmptyChemistry => "chemistry must contain at least one pair";
    ChemistryTypeOutOfRange { input: u16, output: u16 } => "chemistry pair {input}->{output} is outside 1..=product_types";
    HypercycleNeedsTwoTypes => "hypercycle chemistry needs at least 2 product types";
    InvalidPlacementAttempts => "placement_attempts must be positive";
    InvalidCycleBudget => "cycle_budget must be positive";
    CycleBudgetTooLarge { max: usize, actual: usize } => "cycle_budget ({actual}) exceeds supported maximum ({max})";
}

impl std::error::Error for SimConfigError {}

impl SimConfig {
    pub const MAX_GRID_EDGE: i32 = crate::constants::MAX_GRID_EDGE;

    pub const MAX_PRODUCT_TYPES: u16 = crate::constants::MAX_PRODUCT_TYPES;

    pub const MAX_CELLS: usize = crate::constants::MAX_CELLS;

    pub const MAX_CYCLE_BUDGET: usize = crate::constants::MAX_CYCLE_BUDGET;

    /// Ticks a run gets when no explicit count is given. Larger chemistries
    /// take longer to settle, so the budget grows with `product_types`.
    pub fn default_run_steps(&self) -> usize {
        match self.product_types {
            3 => 410_000,
            4 => 580_000,
            5 => 770_000,
            6 => 980_000,
            7 => 1_210_000,
            8 => 1_460_000,
            9 => 1_720_000,
            _ => 270_000,
        }
    }

    pub fn validate(&self) -> Result<(), SimConfigError> {
        self.validate_products()?;
        self.validate_chemistry()?;
        self.validate_space()?;
        self.validate_energy()?;
        self.validate_budgets()?;
        Ok(())
    }

    fn validate_products(&self) -> Result<(), SimConfigError> {
        if self.product_types == 0 {
            return Err(SimConfigError::InvalidProductTypes);
        }
        if self.product_types > Self::MAX_PRODUCT_TYPES {
            return Err(SimConfigError::TooManyProductTypes {
                max: Self::MAX_PRODUCT_TYPES,
                actual: self.product_types,
            });
        }
        Ok(())
    }

    fn validate_chemistry(&self) -> Result<(), SimConfigError> {
        if self.chemistry == Chemistry::Hypercycle && self.product_types < 2 {
            return Err(SimConfigError::HypercycleNeedsTwoTypes);
        }
        let pairs = self.chemistry.pairs(self.product_types);
        if pairs.is_empty() {
            return Err(SimConfigError::EmptyChemistry);
        }
        let in_range = |t: ProductType| (1..=self.product_types).contains(&t);
        if let Some(&(input, output)) = pairs
            .iter()
            .find(|(input, output)| !(in_range(*input) && in_range(*output)))
        {
            return Err(SimConfigError::ChemistryTypeOutOfRange { input, output });
        }
        Ok(())
    }

    fn validate_space(&self) -> Result<(), SimConfigError> {
        if self.cell_count == 0 {
            return Err(SimConfigError::InvalidCellCount);
        }
        if self.cell_count > Self::MAX_CELLS {
            return Err(SimConfigError::TooManyCells {
                max: Self::MAX_CELLS,
                actual: self.cell_count,
            });
        }
        if self.space_width <= 0 || self.space_height <= 0 {
            return Err(SimConfigError::InvalidSpaceDimensions);
        }
        let widest = self.space_width.max(self.space_height);
        if widest > Self::MAX_GRID_EDGE {
            return Err(SimConfigError::SpaceTooLarge {
                max: Self::MAX_GRID_EDGE,
                actual: widest,
            });
        }
        let capacity = self.space_width as usize * self.space_height as usize;
        if self.cell_count > capacity {
            return Err(SimConfigError::CellsExceedGrid {
                cells: self.cell_count,
                capacity,
            });
        }
        if !(self.vision_radius.is_finite() && self.vision_radius >= 0.0) {
            return Err(SimConfigError::InvalidVisionRadius);
        }
        if !(self.cell_exclusion_radius.is_finite() && self.cell_exclusion_radius >= 0.0) {
            return Err(SimConfigError::InvalidExclusionRadius);
        }
        Ok(())
    }

    fn validate_energy(&self) -> Result<(), SimConfigError> {
        if !self.energy_costs.is_valid() {
            return Err(SimConfigError::InvalidEnergyCosts);
        }
        if !(self.initial_energy.is_finite() && self.initial_energy >= 0.0) {
            return Err(SimConfigError::InvalidInitialEnergy);
        }
        Ok(())
    }

    fn validate_budgets(&self) -> Result<(), SimConfigError> {
        if self.placement_attempts == 0 {
            return Err(SimConfigError::InvalidPlacementAttempts);
        }
        if self.cycle_budget == 0 {
            return Err(SimConfigError::InvalidCycleBudget);
        }
        if self.cycle_budget > Self::MAX_CYCLE_BUDGET {
            return Err(SimConfigError::CycleBudgetTooLarge {
                max: Self::MAX_CYCLE_BUDGET,
                actual: self.cycle_budget,
            });
        }
        Ok(())
    }

    /// Whether `kind` is a valid product type under this config.
    pub fn is_product_type(&self, kind: ProductType) -> bool {
        (1..=self.product_types).contains(&kind)
    }
}
