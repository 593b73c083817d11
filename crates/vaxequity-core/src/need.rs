//! Need scoring
//!
//! A country's need blends its coverage gap `1 - vaccination_rate` with a
//! recency penalty that grows linearly with the age of its data and saturates
//! at the configured horizon:
//!
//! ```text
//! need = (w_cov * gap + w_rec * min(age_days / horizon, 1)) / (w_cov + w_rec)
//! ```
//!
//! Countries without a `last_updated` date are scored on the coverage gap
//! alone. Scores are always in [0, 1].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::types::{CountryRecord, CountryTable};

/// Default weight of the coverage gap term
pub const DEFAULT_COVERAGE_WEIGHT: f64 = 0.3;

/// Default weight of the recency penalty term
pub const DEFAULT_RECENCY_WEIGHT: f64 = 0.7;

/// Default data age (days) at which the recency penalty saturates
pub const DEFAULT_RECENCY_HORIZON_DAYS: f64 = 180.0;

/// Weights of the need-score formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedWeights {
    #[serde(default = "default_coverage_weight")]
    pub coverage_weight: f64,

    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    #[serde(default = "default_recency_horizon_days")]
    pub recency_horizon_days: f64,
}

fn default_coverage_weight() -> f64 {
    DEFAULT_COVERAGE_WEIGHT
}

fn default_recency_weight() -> f64 {
    DEFAULT_RECENCY_WEIGHT
}

fn default_recency_horizon_days() -> f64 {
    DEFAULT_RECENCY_HORIZON_DAYS
}

impl Default for NeedWeights {
    fn default() -> Self {
        Self {
            coverage_weight: DEFAULT_COVERAGE_WEIGHT,
            recency_weight: DEFAULT_RECENCY_WEIGHT,
            recency_horizon_days: DEFAULT_RECENCY_HORIZON_DAYS,
        }
    }
}

impl NeedWeights {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, value) in [
            ("need.coverage_weight", self.coverage_weight),
            ("need.recency_weight", self.recency_weight),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigurationError::invalid(
                    field,
                    format!("{value} must be a non-negative number"),
                ));
            }
        }
        if self.coverage_weight + self.recency_weight <= 0.0 {
            return Err(ConfigurationError::invalid(
                "need",
                "coverage and recency weights must not both be zero",
            ));
        }
        if !(self.recency_horizon_days.is_finite() && self.recency_horizon_days > 0.0) {
            return Err(ConfigurationError::invalid(
                "need.recency_horizon_days",
                format!("{} must be positive", self.recency_horizon_days),
            ));
        }
        Ok(())
    }
}

/// Per-country need in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeedScore(f64);

impl NeedScore {
    /// Wrap a raw value, clamped to [0, 1]. NaN maps to 0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Scores countries relative to a fixed reference date.
#[derive(Debug, Clone)]
pub struct NeedScorer {
    weights: NeedWeights,
    as_of: NaiveDate,
}

impl NeedScorer {
    /// `as_of` is the date data age is measured against.
    pub fn new(weights: NeedWeights, as_of: NaiveDate) -> Result<Self, ConfigurationError> {
        weights.validate()?;
        Ok(Self { weights, as_of })
    }

    pub fn weights(&self) -> &NeedWeights {
        &self.weights
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn coverage_gap(vaccination_rate: f64) -> f64 {
        (1.0 - vaccination_rate).clamp(0.0, 1.0)
    }

    /// Linear in data age, 0 for data dated on or after `as_of`, capped at 1.
    pub fn recency_penalty(&self, last_updated: NaiveDate) -> f64 {
        let age_days = (self.as_of - last_updated).num_days().max(0) as f64;
        (age_days / self.weights.recency_horizon_days).min(1.0)
    }

    pub fn score(&self, record: &CountryRecord) -> NeedScore {
        let gap = Self::coverage_gap(record.vaccination_rate);
        let score = match record.last_updated {
            Some(date) => {
                let NeedWeights {
                    coverage_weight,
                    recency_weight,
                    ..
                } = self.weights;
                (coverage_weight * gap + recency_weight * self.recency_penalty(date))
                    / (coverage_weight + recency_weight)
            }
            None => gap,
        };
        NeedScore(score.clamp(0.0, 1.0))
    }

    pub fn score_table(&self, table: &CountryTable) -> BTreeMap<String, NeedScore> {
        table
            .iter()
            .map(|record| (record.country_code.clone(), self.score(record)))
            .collect()
    }
}

/// Divide every score by the sum of all scores. Left unchanged when the sum is zero.
pub fn normalize_scores(scores: &BTreeMap<String, NeedScore>) -> BTreeMap<String, NeedScore> {
    let total: f64 = scores.values().map(|s| s.0).sum();
    if total <= 0.0 {
        return scores.clone();
    }
    scores
        .iter()
        .map(|(code, score)| (code.clone(), NeedScore(score.0 / total)))
        .collect()
}
