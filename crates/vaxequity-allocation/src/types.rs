//! Type definitions for allocation results

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vaxequity_core::{EquityMetrics, SolverBackend};

/// Doses per country with equity metrics.
///
/// Serialized as `{total_allocated, allocation: {code: doses}, equity_metrics: {before_gini, after_gini}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Sum of all allocations, never above the budget
    pub total_allocated: f64,

    /// Country code -> allocated doses (real-valued)
    pub allocation: BTreeMap<String, f64>,

    pub equity_metrics: EquityMetrics,
}

impl AllocationResult {
    pub fn doses_for(&self, country_code: &str) -> f64 {
        self.allocation.get(country_code).copied().unwrap_or(0.0)
    }
}

/// How the solve went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Termination reason
    pub status: String,

    /// Objective value of the returned allocation
    pub objective_value: f64,

    pub iterations: u64,

    pub backend: SolverBackend,

    pub budget: f64,

    /// Relative Gini reduction in percent; absent when the baseline Gini is 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement_pct: Option<f64>,
}

/// Everything the optimizer returns for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationOutcome {
    #[serde(flatten)]
    pub result: AllocationResult,

    pub report: OptimizationReport,
}
