/// Largest valid grid edge (cells per axis). Keeps the occupancy grid small enough
/// to allocate eagerly.
pub const MAX_GRID_EDGE: i32 = 1024;

/// Largest number of distinct product types.
pub const MAX_PRODUCT_TYPES: u16 = 64;

/// Largest cell population accepted by `SimConfig::validate`.
pub const MAX_CELLS: usize = 50_000;

/// Largest simple-cycle enumeration budget per analysis.
pub const MAX_CYCLE_BUDGET: usize = 10_000_000;

/// Prime multiplier used to derive independent RNG streams from a base seed.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

/// Share of the run budget after the last reproduction during which a run
/// still counts as active for reporting.
pub const ACTIVE_REPORT_WINDOW: f64 = 0.1;
