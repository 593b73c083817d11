//! Configuration surface for a full analysis run.
//!
//! Every section has documented defaults so an empty TOML file is a valid
//! configuration. Load with [`Config::from_file`], then call
//! [`Config::validate`] before running any stage.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::equity::EquityConfig;
use crate::error::ConfigurationError;
use crate::need::NeedWeights;
use crate::types::CountryRecord;

/// Default total dose budget
pub const DEFAULT_BUDGET: f64 = 1e9;

/// Default equity/coverage trade-off weight
pub const DEFAULT_ALPHA: f64 = 0.8;

/// Default per-hub output when no supply nodes are configured
pub const DEFAULT_HUB_OUTPUT: f64 = 2e8;

/// Manufacturer hubs used when no supply nodes are configured
pub const DEFAULT_HUBS: [&str; 7] = ["US", "GB", "DE", "CN", "IN", "RU", "KR"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub need: NeedWeights,

    #[serde(default)]
    pub allocation: AllocationConfig,

    #[serde(default)]
    pub solver: SolverSettings,

    #[serde(default)]
    pub equity: EquityConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigurationError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.data.validate()?;
        self.network.validate()?;
        self.need.validate()?;
        self.allocation.validate()?;
        self.solver.validate()
    }
}

/// What to do with a country whose population is missing or non-positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum InvalidPopulationPolicy {
    /// Exclude the country and report it
    #[default]
    Drop,
    /// Substitute the given population
    Minimum { population: f64 },
    /// Fail the whole ingest
    Abort,
}

/// Country data reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub invalid_population: InvalidPopulationPolicy,

    /// Coverage assumed when no rate can be derived
    #[serde(default)]
    pub missing_rate_fallback: f64,

    /// Restrict the table to these country codes
    #[serde(default)]
    pub countries: Option<Vec<String>>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            invalid_population: InvalidPopulationPolicy::Drop,
            missing_rate_fallback: 0.0,
            countries: None,
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.missing_rate_fallback) {
            return Err(ConfigurationError::invalid(
                "data.missing_rate_fallback",
                format!("{} is outside [0, 1]", self.missing_rate_fallback),
            ));
        }
        if let InvalidPopulationPolicy::Minimum { population } = self.invalid_population {
            if !(population.is_finite() && population > 0.0) {
                return Err(ConfigurationError::invalid(
                    "data.invalid_population.population",
                    format!("{population} must be positive"),
                ));
            }
        }
        Ok(())
    }
}

/// A manufacturer or distribution hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyNodeSpec {
    pub id: String,
    /// Doses per time unit this hub can ship in total
    pub output_capacity: f64,
}

impl SupplyNodeSpec {
    pub fn new(id: impl Into<String>, output_capacity: f64) -> Self {
        Self {
            id: id.into(),
            output_capacity,
        }
    }
}

fn default_supply() -> Vec<SupplyNodeSpec> {
    DEFAULT_HUBS
        .iter()
        .map(|id| SupplyNodeSpec::new(*id, DEFAULT_HUB_OUTPUT))
        .collect()
}

/// How a hub's output is split into per-country edge capacities
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CapacityModel {
    /// capacity = output * population / total population (a hub's edges sum to its output)
    #[default]
    PopulationShare,
    /// capacity = output * population / reference_population
    PopulationScaled { reference_population: f64 },
}

/// Edge weights used for shortest paths in betweenness centrality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathWeighting {
    #[default]
    Unweighted,
    /// Weight 1 / capacity, biasing paths toward high-capacity links
    InverseCapacity,
}

/// Edge-level bottleneck identification
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BottleneckMethod {
    /// Edges on a minimum cut between aggregate supply and aggregate demand
    #[default]
    MinCut,
    /// Edges whose capacity is strictly below the given percentile (0-100)
    Percentile { percentile: f64 },
}

/// Distribution network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_supply")]
    pub supply: Vec<SupplyNodeSpec>,

    #[serde(default)]
    pub capacity_model: CapacityModel,

    #[serde(default)]
    pub path_weighting: PathWeighting,

    #[serde(default)]
    pub bottleneck: BottleneckMethod,

    /// Countries whose inbound capacity covers less than this fraction of
    /// their remaining need are reported as bottlenecks
    #[serde(default = "default_coverage_threshold")]
    pub country_coverage_threshold: f64,
}

fn default_coverage_threshold() -> f64 {
    0.5
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            supply: default_supply(),
            capacity_model: CapacityModel::default(),
            path_weighting: PathWeighting::default(),
            bottleneck: BottleneckMethod::default(),
            country_coverage_threshold: default_coverage_threshold(),
        }
    }
}

impl NetworkConfig {
    /// Network with the given supply nodes and default analysis settings
    pub fn with_supply(supply: Vec<SupplyNodeSpec>) -> Self {
        Self {
            supply,
            ..Self::default()
        }
    }

    pub fn total_supply(&self) -> f64 {
        self.supply.iter().map(|s| s.output_capacity).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.supply.is_empty() {
            return Err(ConfigurationError::NoSupplyNodes);
        }

        let mut seen = HashSet::new();
        for node in &self.supply {
            if node.id.trim().is_empty() {
                return Err(ConfigurationError::invalid(
                    "network.supply.id",
                    "supply node id must not be empty",
                ));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigurationError::DuplicateSupplyNode(node.id.clone()));
            }
            if !(node.output_capacity.is_finite() && node.output_capacity >= 0.0) {
                return Err(ConfigurationError::invalid(
                    format!("network.supply[{}].output_capacity", node.id),
                    format!("{} must be a non-negative number", node.output_capacity),
                ));
            }
        }

        if self.total_supply() <= 0.0 {
            return Err(ConfigurationError::ZeroTotalCapacity);
        }

        if let CapacityModel::PopulationScaled {
            reference_population,
        } = self.capacity_model
        {
            if !(reference_population.is_finite() && reference_population > 0.0) {
                return Err(ConfigurationError::invalid(
                    "network.capacity_model.reference_population",
                    format!("{reference_population} must be positive"),
                ));
            }
        }

        if let BottleneckMethod::Percentile { percentile } = self.bottleneck {
            if !(0.0..=100.0).contains(&percentile) {
                return Err(ConfigurationError::invalid(
                    "network.bottleneck.percentile",
                    format!("{percentile} is outside [0, 100]"),
                ));
            }
        }

        if !(self.country_coverage_threshold.is_finite() && self.country_coverage_threshold >= 0.0)
        {
            return Err(ConfigurationError::invalid(
                "network.country_coverage_threshold",
                format!("{} must be non-negative", self.country_coverage_threshold),
            ));
        }

        Ok(())
    }
}

/// Per-country ceiling on allocated doses
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CapPolicy {
    /// No ceiling beyond network capacity
    None,
    /// fraction * population * (1 - vaccination_rate)
    UnvaccinatedShare { fraction: f64 },
    /// fraction * population
    PopulationShare { fraction: f64 },
    /// fraction * total budget
    BudgetShare { fraction: f64 },
}

impl Default for CapPolicy {
    fn default() -> Self {
        CapPolicy::UnvaccinatedShare { fraction: 1.0 }
    }
}

impl CapPolicy {
    /// Ceiling for one country, `None` when uncapped
    pub fn cap_for(&self, record: &CountryRecord, budget: f64) -> Option<f64> {
        match *self {
            CapPolicy::None => None,
            CapPolicy::UnvaccinatedShare { fraction } => {
                Some(fraction * record.unvaccinated_population())
            }
            CapPolicy::PopulationShare { fraction } => Some(fraction * record.population),
            CapPolicy::BudgetShare { fraction } => Some(fraction * budget),
        }
    }

    fn fraction(&self) -> Option<f64> {
        match *self {
            CapPolicy::None => None,
            CapPolicy::UnvaccinatedShare { fraction }
            | CapPolicy::PopulationShare { fraction }
            | CapPolicy::BudgetShare { fraction } => Some(fraction),
        }
    }
}

/// Allocation objective and constraint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Total dose budget B
    #[serde(default = "default_budget")]
    pub budget: f64,

    /// Equity/coverage trade-off: 1 = pure need prioritization,
    /// 0 = pure population-proportional coverage
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Divide need scores by their sum before weighting the objective
    #[serde(default)]
    pub normalize_need: bool,

    #[serde(default)]
    pub cap: CapPolicy,
}

fn default_budget() -> f64 {
    DEFAULT_BUDGET
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            alpha: DEFAULT_ALPHA,
            normalize_need: false,
            cap: CapPolicy::default(),
        }
    }
}

impl AllocationConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.budget.is_finite() && self.budget >= 0.0) {
            return Err(ConfigurationError::invalid(
                "allocation.budget",
                format!("{} must be a non-negative number", self.budget),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigurationError::invalid(
                "allocation.alpha",
                format!("{} is outside [0, 1]", self.alpha),
            ));
        }
        if let Some(fraction) = self.cap.fraction() {
            if !(fraction.is_finite() && fraction >= 0.0) {
                return Err(ConfigurationError::invalid(
                    "allocation.cap.fraction",
                    format!("{fraction} must be a non-negative number"),
                ));
            }
        }
        Ok(())
    }
}

/// LP backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    #[default]
    Simplex,
    Greedy,
}

/// Solver settings as read from the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default)]
    pub backend: SolverBackend,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    /// Wall-clock budget for one solve
    #[serde(default)]
    pub timeout_secs: Option<f64>,

    #[serde(default)]
    pub verbose: bool,
}

fn default_max_iterations() -> u64 {
    10_000
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            backend: SolverBackend::default(),
            max_iterations: default_max_iterations(),
            timeout_secs: None,
            verbose: false,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_iterations == 0 {
            return Err(ConfigurationError::invalid(
                "solver.max_iterations",
                "must be at least 1",
            ));
        }
        if let Some(timeout) = self.timeout_secs {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(ConfigurationError::invalid(
                    "solver.timeout_secs",
                    format!("{timeout} must be positive"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.allocation.budget, DEFAULT_BUDGET);
        assert_eq!(config.allocation.alpha, DEFAULT_ALPHA);
        assert_eq!(config.network.supply.len(), DEFAULT_HUBS.len());
        assert_eq!(config.network.bottleneck, BottleneckMethod::MinCut);
        assert_eq!(config.solver.backend, SolverBackend::Simplex);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [data]
            invalid_population = { policy = "minimum", population = 1000.0 }
            missing_rate_fallback = 0.1
            countries = ["KE", "NG"]

            [network]
            supply = [{ id = "hub-a", output_capacity = 10.0 }, { id = "hub-b", output_capacity = 5.0 }]
            capacity_model = { model = "population_scaled", reference_population = 1e9 }
            path_weighting = "inverse_capacity"
            bottleneck = { method = "percentile", percentile = 25.0 }

            [need]
            coverage_weight = 0.5
            recency_weight = 0.5

            [allocation]
            budget = 20.0
            alpha = 1.0
            cap = { policy = "none" }

            [solver]
            backend = "greedy"
            timeout_secs = 2.5

            [equity]
            weighting = "uniform"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(
            config.data.invalid_population,
            InvalidPopulationPolicy::Minimum { population: 1000.0 }
        );
        assert_eq!(config.network.total_supply(), 15.0);
        assert_eq!(config.network.path_weighting, PathWeighting::InverseCapacity);
        assert_eq!(
            config.network.bottleneck,
            BottleneckMethod::Percentile { percentile: 25.0 }
        );
        assert_eq!(config.need.recency_horizon_days, 180.0);
        assert_eq!(config.allocation.cap, CapPolicy::None);
        assert_eq!(config.solver.backend, SolverBackend::Greedy);
        assert_eq!(
            config.equity.weighting,
            crate::equity::EquityWeighting::Uniform
        );
    }

    #[test]
    fn test_zero_total_capacity_is_rejected() {
        let network = NetworkConfig::with_supply(vec![
            SupplyNodeSpec::new("a", 0.0),
            SupplyNodeSpec::new("b", 0.0),
        ]);
        assert!(matches!(
            network.validate(),
            Err(ConfigurationError::ZeroTotalCapacity)
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let duplicate = NetworkConfig::with_supply(vec![
            SupplyNodeSpec::new("a", 1.0),
            SupplyNodeSpec::new("a", 2.0),
        ]);
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigurationError::DuplicateSupplyNode(_))
        ));

        let allocation = AllocationConfig {
            budget: -1.0,
            ..AllocationConfig::default()
        };
        assert!(allocation.validate().is_err());

        let allocation = AllocationConfig {
            alpha: 1.5,
            ..AllocationConfig::default()
        };
        assert!(allocation.validate().is_err());
    }

    #[test]
    fn test_cap_policies() {
        let record = CountryRecord::new("KE", 1000.0, 0.5);
        assert_eq!(CapPolicy::None.cap_for(&record, 50.0), None);
        assert_eq!(
            CapPolicy::UnvaccinatedShare { fraction: 0.5 }.cap_for(&record, 50.0),
            Some(250.0)
        );
        assert_eq!(
            CapPolicy::PopulationShare { fraction: 0.1 }.cap_for(&record, 50.0),
            Some(100.0)
        );
        assert_eq!(
            CapPolicy::BudgetShare { fraction: 0.2 }.cap_for(&record, 50.0),
            Some(10.0)
        );
    }

    #[test]
    fn test_from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[allocation]\nbudget = \"lots\"").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));

        let missing = Config::from_file(Path::new("/nonexistent/vaxequity.toml")).unwrap_err();
        assert!(matches!(missing, ConfigurationError::FileRead { .. }));
    }
}
