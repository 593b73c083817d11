//! Core types for equity-aware vaccine allocation.
//!
//! - [`types`]: the Country Data Table and the raw observations it is reconciled from
//! - [`need`]: per-country need scores blending coverage gap and data recency
//! - [`equity`]: Gini coefficient of vaccination coverage before and after an allocation
//! - [`config`]: the configuration surface shared by every pipeline stage
//! - [`error`]: the error taxonomy

pub mod config;
pub mod equity;
pub mod error;
pub mod need;
pub mod types;

pub use config::{
    AllocationConfig, BottleneckMethod, CapPolicy, CapacityModel, Config, DataConfig,
    InvalidPopulationPolicy, NetworkConfig, PathWeighting, SolverBackend, SolverSettings,
    SupplyNodeSpec,
};
pub use equity::{EquityConfig, EquityEvaluator, EquityMetrics, EquityWeighting};
pub use error::{
    ConfigurationError, ConstraintClass, DataValidationError, Error, InfeasibleProblemError,
    Result,
};
pub use need::{NeedScore, NeedScorer, NeedWeights};
pub use types::{CountryObservation, CountryRecord, CountryTable, IngestReport};
