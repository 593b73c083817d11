//! Error taxonomy shared by every stage of the allocation pipeline.
//!
//! Errors are raised where they are detected and carry the country code or
//! constraint class needed to diagnose them. Nothing here is converted into a
//! default value unless a configuration policy explicitly asks for it.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed or missing country data that survived fallback filling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataValidationError {
    #[error("country '{country}': population {population} is not a positive number")]
    NonPositivePopulation { country: String, population: f64 },

    #[error("country '{country}': population is missing")]
    MissingPopulation { country: String },

    #[error("country '{country}': vaccination rate {rate} is outside [0, 1]")]
    RateOutOfRange { country: String, rate: f64 },

    #[error("country '{0}' appears more than once in a reconciled table")]
    DuplicateCountry(String),

    #[error("country code must not be empty")]
    EmptyCountryCode,
}

impl DataValidationError {
    /// Country code the error refers to, when there is one.
    pub fn country(&self) -> Option<&str> {
        match self {
            Self::NonPositivePopulation { country, .. }
            | Self::MissingPopulation { country }
            | Self::RateOutOfRange { country, .. } => Some(country),
            Self::DuplicateCountry(country) => Some(country),
            Self::EmptyCountryCode => None,
        }
    }
}

/// Invalid supply, network, scoring or allocation configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("supply configuration yields zero total capacity")]
    ZeroTotalCapacity,

    #[error("no supply nodes configured")]
    NoSupplyNodes,

    #[error("duplicate supply node id '{0}'")]
    DuplicateSupplyNode(String),

    #[error("country table is empty")]
    EmptyCountryTable,

    #[error("failed to read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigurationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Constraint family that made an allocation problem infeasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintClass {
    /// Total budget row: sum of allocations <= B
    Budget,
    /// Per-country ceiling from the cap policy
    CountryCap,
    /// Per-country inbound network capacity
    Capacity,
    /// A generic constraint row of a linear program
    Row,
}

impl std::fmt::Display for ConstraintClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintClass::Budget => write!(f, "budget"),
            ConstraintClass::CountryCap => write!(f, "country cap"),
            ConstraintClass::Capacity => write!(f, "inbound capacity"),
            ConstraintClass::Row => write!(f, "constraint row"),
        }
    }
}

/// The constraint set admits no feasible allocation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("infeasible {constraint} constraint: {detail}")]
pub struct InfeasibleProblemError {
    pub constraint: ConstraintClass,
    pub detail: String,
}

impl InfeasibleProblemError {
    pub fn new(constraint: ConstraintClass, detail: impl Into<String>) -> Self {
        Self {
            constraint,
            detail: detail.into(),
        }
    }
}

/// Top-level error type for the allocation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("data validation error: {0}")]
    DataValidation(#[from] DataValidationError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Infeasible(#[from] InfeasibleProblemError),

    #[error("solver exceeded its time budget after {elapsed:?}")]
    SolverTimeout { elapsed: Duration },

    #[error("solver failure: {0}")]
    SolverFailure(String),
}

impl Error {
    /// Whether the caller may retry, e.g. with relaxed constraints or a larger
    /// time budget. The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SolverTimeout { .. } | Self::SolverFailure(_))
    }
}

/// Result type alias for the allocation pipeline.
pub type Result<T> = std::result::Result<T, Error>;
