pub mod cell;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod product;
pub mod rng;
pub mod rule;
pub mod rule_net;
pub mod space;
pub mod spatial;
pub mod urn;

pub use cell::{Cell, CellId};
pub use config::{SimConfig, SimConfigError};
pub use error::CoreError;
pub use metrics::{CellSnapshot, HypercycleReport, RunSummary, StepMetrics};
pub use rule_net::{CycleMetrics, RuleCompatibilityGraph};
pub use space::{ChainOutcome, Delivery, Space, SpaceInitError, TickOutcome};
