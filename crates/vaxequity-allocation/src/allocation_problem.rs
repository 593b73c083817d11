//! Allocation problem definition
//!
//! One decision variable per country (in ascending country-code order):
//!
//! ```text
//! maximize    sum_c  alpha * need_c * x_c + (1 - alpha) * x_c / population_c
//! subject to  sum_c x_c <= B
//!             0 <= x_c <= min(inbound_capacity_c, cap_c)
//! ```

use std::collections::BTreeMap;

use tracing::debug;
use vaxequity_core::need::normalize_scores;
use vaxequity_core::{
    AllocationConfig, ConfigurationError, ConstraintClass, CountryTable, Error,
    InfeasibleProblemError, NeedScore,
};
use vaxequity_network::DistributionNetwork;

use crate::linear_program::LinearProgram;

/// Per-country inputs to the LP, validated on construction.
#[derive(Debug, Clone)]
pub struct AllocationProblem {
    countries: Vec<String>,
    coefficients: Vec<f64>,
    upper_bounds: Vec<f64>,
    budget: f64,
    alpha: f64,
}

impl AllocationProblem {
    /// Build the problem from per-country inbound capacities.
    ///
    /// # Errors
    ///
    /// - `Infeasible` (Budget) when `budget` is negative or not finite
    /// - `Infeasible` (Capacity / CountryCap) when a bound is negative
    /// - `Configuration` when alpha is outside [0, 1] or a country has no
    ///   capacity or need score
    pub fn new(
        table: &CountryTable,
        inbound_capacity: &BTreeMap<String, f64>,
        need_scores: &BTreeMap<String, NeedScore>,
        config: &AllocationConfig,
        budget: f64,
    ) -> Result<Self, Error> {
        if !(budget.is_finite() && budget >= 0.0) {
            return Err(InfeasibleProblemError::new(
                ConstraintClass::Budget,
                format!("budget {budget} must be a non-negative number"),
            )
            .into());
        }
        if !(0.0..=1.0).contains(&config.alpha) {
            return Err(ConfigurationError::invalid(
                "allocation.alpha",
                format!("{} is outside [0, 1]", config.alpha),
            )
            .into());
        }
        if table.is_empty() {
            return Err(ConfigurationError::EmptyCountryTable.into());
        }

        let normalized;
        let scores = if config.normalize_need {
            normalized = normalize_scores(need_scores);
            &normalized
        } else {
            need_scores
        };

        let alpha = config.alpha;
        let mut countries = Vec::with_capacity(table.len());
        let mut coefficients = Vec::with_capacity(table.len());
        let mut upper_bounds = Vec::with_capacity(table.len());

        for record in table.iter() {
            let code = &record.country_code;
            let capacity = *inbound_capacity.get(code).ok_or_else(|| {
                ConfigurationError::invalid(
                    "network",
                    format!("country '{code}' has no demand node"),
                )
            })?;
            let need = scores.get(code).ok_or_else(|| {
                ConfigurationError::invalid("need", format!("country '{code}' has no need score"))
            })?;

            if capacity.is_nan() || capacity < 0.0 {
                return Err(InfeasibleProblemError::new(
                    ConstraintClass::Capacity,
                    format!("country '{code}' has inbound capacity {capacity}"),
                )
                .into());
            }
            let cap = config.cap.cap_for(record, budget);
            if let Some(cap) = cap {
                if cap.is_nan() || cap < 0.0 {
                    return Err(InfeasibleProblemError::new(
                        ConstraintClass::CountryCap,
                        format!("country '{code}' has cap {cap}"),
                    )
                    .into());
                }
            }

            countries.push(code.clone());
            coefficients.push(alpha * need.value() + (1.0 - alpha) / record.population);
            upper_bounds.push(cap.map_or(capacity, |cap| cap.min(capacity)));
        }

        debug!(
            countries = countries.len(),
            budget,
            alpha,
            bound_total = upper_bounds.iter().sum::<f64>(),
            "allocation problem formulated"
        );

        Ok(Self {
            countries,
            coefficients,
            upper_bounds,
            budget,
            alpha,
        })
    }

    /// Build the problem using the network's inbound capacity per country.
    pub fn from_network(
        table: &CountryTable,
        network: &DistributionNetwork,
        need_scores: &BTreeMap<String, NeedScore>,
        config: &AllocationConfig,
        budget: f64,
    ) -> Result<Self, Error> {
        Self::new(
            table,
            &network.inbound_capacities(),
            need_scores,
            config,
            budget,
        )
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Objective weight per unit dose, in country order
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// min(inbound capacity, cap), in country order
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn to_linear_program(&self) -> LinearProgram {
        LinearProgram::new(self.coefficients.clone())
            .with_constraint(
                vec![1.0; self.countries.len()],
                self.budget,
                ConstraintClass::Budget,
            )
            .with_upper_bounds(self.upper_bounds.clone())
    }

    /// Snap a solver vector onto the feasible region: clear round-off
    /// negatives, clip to bounds and scale down any budget overshoot.
    pub fn clean_solution(&self, x: &[f64]) -> Vec<f64> {
        let mut cleaned: Vec<f64> = x
            .iter()
            .zip(&self.upper_bounds)
            .map(|(&v, &u)| v.max(0.0).min(u))
            .collect();

        let total: f64 = cleaned.iter().sum();
        if total > self.budget {
            let scale = self.budget / total;
            cleaned.iter_mut().for_each(|v| *v *= scale);
        }
        cleaned
    }

    /// Country code -> doses for a solution vector in country order
    pub fn allocation_map(&self, x: &[f64]) -> BTreeMap<String, f64> {
        self.countries.iter().cloned().zip(x.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaxequity_core::{CapPolicy, CountryRecord};

    fn table() -> CountryTable {
        CountryTable::from_records(vec![
            CountryRecord::new("AA", 100.0, 0.5),
            CountryRecord::new("BB", 1000.0, 0.0),
        ])
        .unwrap()
    }

    fn inputs() -> (BTreeMap<String, f64>, BTreeMap<String, NeedScore>) {
        let capacity = [("AA".to_string(), 30.0), ("BB".to_string(), 2000.0)]
            .into_iter()
            .collect();
        let scores = [
            ("AA".to_string(), NeedScore::new(0.5)),
            ("BB".to_string(), NeedScore::new(1.0)),
        ]
        .into_iter()
        .collect();
        (capacity, scores)
    }

    #[test]
    fn test_bounds_take_minimum_of_capacity_and_cap() {
        let (capacity, scores) = inputs();
        let problem = AllocationProblem::new(
            &table(),
            &capacity,
            &scores,
            &AllocationConfig::default(),
            500.0,
        )
        .unwrap();
        // AA: capacity 30 < unvaccinated 50; BB: unvaccinated 1000 < capacity 2000
        assert_eq!(problem.upper_bounds(), &[30.0, 1000.0]);
        assert_eq!(problem.countries(), &["AA".to_string(), "BB".to_string()]);
    }

    #[test]
    fn test_objective_coefficients() {
        let (capacity, scores) = inputs();
        let config = AllocationConfig {
            alpha: 0.5,
            cap: CapPolicy::None,
            ..AllocationConfig::default()
        };
        let problem = AllocationProblem::new(&table(), &capacity, &scores, &config, 1.0).unwrap();
        assert!((problem.coefficients()[0] - (0.25 + 0.5 / 100.0)).abs() < 1e-15);
        assert!((problem.coefficients()[1] - (0.5 + 0.5 / 1000.0)).abs() < 1e-15);
        assert_eq!(problem.upper_bounds(), &[30.0, 2000.0]);
    }

    #[test]
    fn test_negative_budget_is_infeasible() {
        let (capacity, scores) = inputs();
        let err = AllocationProblem::new(
            &table(),
            &capacity,
            &scores,
            &AllocationConfig::default(),
            -1.0,
        )
        .unwrap_err();
        match err {
            Error::Infeasible(e) => assert_eq!(e.constraint, ConstraintClass::Budget),
            other => panic!("expected infeasible budget, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_capacity_is_infeasible() {
        let (mut capacity, scores) = inputs();
        capacity.insert("AA".to_string(), -3.0);
        let err = AllocationProblem::new(
            &table(),
            &capacity,
            &scores,
            &AllocationConfig::default(),
            10.0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Infeasible(e) if e.constraint == ConstraintClass::Capacity));
    }

    #[test]
    fn test_missing_capacity_is_configuration_error() {
        let (mut capacity, scores) = inputs();
        capacity.remove("BB");
        let err = AllocationProblem::new(
            &table(),
            &capacity,
            &scores,
            &AllocationConfig::default(),
            10.0,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_clean_solution() {
        let (capacity, scores) = inputs();
        let problem = AllocationProblem::new(
            &table(),
            &capacity,
            &scores,
            &AllocationConfig::default(),
            100.0,
        )
        .unwrap();
        assert_eq!(problem.clean_solution(&[-1e-12, 30.000001]), vec![0.0, 30.000001]);
        assert_eq!(problem.clean_solution(&[31.0, 0.0]), vec![30.0, 0.0]);
    }

    #[test]
    fn test_clean_solution_keeps_fractional_doses_at_large_budgets() {
        let (capacity, scores) = inputs();
        let problem = AllocationProblem::new(
            &table(),
            &capacity,
            &scores,
            &AllocationConfig::default(),
            1e9,
        )
        .unwrap();
        assert_eq!(problem.clean_solution(&[0.5, 999.25]), vec![0.5, 999.25]);
    }
}
