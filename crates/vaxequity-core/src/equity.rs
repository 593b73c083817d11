//! Equity evaluation via the Gini coefficient of vaccination coverage
//!
//! Countries are sorted by coverage ascending (ties by country code) and the
//! weighted mean-absolute-difference form is evaluated in one pass:
//!
//! ```text
//! G = sum_i w_i r_i (W_below_i - W_above_i) / (W * sum_i w_i r_i)
//! ```
//!
//! Fewer than two countries, zero total weight or zero mean coverage give 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{CountryRecord, CountryTable};

/// How countries are weighted in the Gini coefficient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquityWeighting {
    /// Weight each country by its population
    #[default]
    Population,
    /// Every country counts once
    Uniform,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityConfig {
    #[serde(default)]
    pub weighting: EquityWeighting,
}

/// Gini coefficients before and after an allocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityMetrics {
    pub before_gini: f64,
    pub after_gini: f64,
}

impl EquityMetrics {
    /// Relative reduction of inequality in percent; `None` when `before_gini` is 0
    pub fn improvement_pct(&self) -> Option<f64> {
        if self.before_gini > 0.0 {
            Some((self.before_gini - self.after_gini) / self.before_gini * 100.0)
        } else {
            None
        }
    }
}

/// A (coverage, weight) pair labelled with its country
#[derive(Debug, Clone, PartialEq)]
pub struct CoveragePoint<'a> {
    pub country: &'a str,
    pub rate: f64,
    pub weight: f64,
}

/// Weighted Gini coefficient of the given coverage points, in [0, 1].
pub fn gini(points: &mut [CoveragePoint<'_>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points.sort_by(|a, b| {
        a.rate
            .total_cmp(&b.rate)
            .then_with(|| a.country.cmp(b.country))
    });

    let total_weight: f64 = points.iter().map(|p| p.weight).sum();
    let total_mass: f64 = points.iter().map(|p| p.weight * p.rate).sum();
    if total_weight <= 0.0 || total_mass <= 0.0 {
        return 0.0;
    }

    let mut below = 0.0;
    let mut acc = 0.0;
    for point in points.iter() {
        let above = total_weight - below - point.weight;
        acc += point.weight * point.rate * (below - above);
        below += point.weight;
    }

    (acc / (total_weight * total_mass)).clamp(0.0, 1.0)
}

/// Coverage after adding `doses` to a country, capped at full coverage
pub fn adjusted_rate(record: &CountryRecord, doses: f64) -> f64 {
    (record.vaccination_rate + doses.max(0.0) / record.population).min(1.0)
}

/// Computes before/after Gini coefficients for a country table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquityEvaluator {
    weighting: EquityWeighting,
}

impl EquityEvaluator {
    pub fn new(weighting: EquityWeighting) -> Self {
        Self { weighting }
    }

    fn weight(&self, record: &CountryRecord) -> f64 {
        match self.weighting {
            EquityWeighting::Population => record.population,
            EquityWeighting::Uniform => 1.0,
        }
    }

    /// Gini of current coverage
    pub fn gini_before(&self, table: &CountryTable) -> f64 {
        let mut points: Vec<_> = table
            .iter()
            .map(|record| CoveragePoint {
                country: &record.country_code,
                rate: record.vaccination_rate,
                weight: self.weight(record),
            })
            .collect();
        gini(&mut points)
    }

    /// Gini of coverage once `allocation` (country code -> doses) is delivered
    pub fn gini_after(&self, table: &CountryTable, allocation: &BTreeMap<String, f64>) -> f64 {
        for code in allocation.keys().filter(|code| !table.contains(code)) {
            warn!(country = %code, "allocation refers to a country missing from the table");
        }

        let mut points: Vec<_> = table
            .iter()
            .map(|record| {
                let doses = allocation
                    .get(&record.country_code)
                    .copied()
                    .unwrap_or(0.0);
                CoveragePoint {
                    country: &record.country_code,
                    rate: adjusted_rate(record, doses),
                    weight: self.weight(record),
                }
            })
            .collect();
        gini(&mut points)
    }

    /// Before/after metrics; without an allocation both values are equal.
    pub fn evaluate(
        &self,
        table: &CountryTable,
        allocation: Option<&BTreeMap<String, f64>>,
    ) -> EquityMetrics {
        let before_gini = self.gini_before(table);
        let after_gini = match allocation {
            Some(allocation) => self.gini_after(table, allocation),
            None => before_gini,
        };
        debug!(before_gini, after_gini, "equity evaluated");
        EquityMetrics {
            before_gini,
            after_gini,
        }
    }
}
