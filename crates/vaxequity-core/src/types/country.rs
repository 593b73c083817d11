use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataValidationError;

/// One reconciled country entry of the Country Data Table.
///
/// `vaccination_rate` is a fraction in [0, 1]. `population` is strictly
/// positive for every record that makes it into a [`CountryTable`](super::CountryTable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// ISO country code (unique key)
    pub country_code: String,

    /// Human-readable country name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,

    /// Total population
    pub population: f64,

    /// Cumulative doses administered
    #[serde(default)]
    pub doses_administered: u64,

    /// Fraction of the population vaccinated, in [0, 1]
    pub vaccination_rate: f64,

    /// Date of the observation this record was reconciled from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<NaiveDate>,
}

impl CountryRecord {
    /// Create a record with no dose count and no recency information
    pub fn new(country_code: impl Into<String>, population: f64, vaccination_rate: f64) -> Self {
        Self {
            country_code: country_code.into(),
            country_name: None,
            population,
            doses_administered: 0,
            vaccination_rate,
            last_updated: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.country_name = Some(name.into());
        self
    }

    pub fn with_doses_administered(mut self, doses: u64) -> Self {
        self.doses_administered = doses;
        self
    }

    pub fn with_last_updated(mut self, date: NaiveDate) -> Self {
        self.last_updated = Some(date);
        self
    }

    /// People not yet covered: population * (1 - vaccination_rate)
    pub fn unvaccinated_population(&self) -> f64 {
        self.population * (1.0 - self.vaccination_rate).clamp(0.0, 1.0)
    }

    /// Check the invariants every table record must satisfy
    pub fn validate(&self) -> Result<(), DataValidationError> {
        if self.country_code.trim().is_empty() {
            return Err(DataValidationError::EmptyCountryCode);
        }
        if !(self.population.is_finite() && self.population > 0.0) {
            return Err(DataValidationError::NonPositivePopulation {
                country: self.country_code.clone(),
                population: self.population,
            });
        }
        if !(0.0..=1.0).contains(&self.vaccination_rate) {
            return Err(DataValidationError::RateOutOfRange {
                country: self.country_code.clone(),
                rate: self.vaccination_rate,
            });
        }
        Ok(())
    }
}

/// A raw, possibly duplicated and incomplete observation for one country,
/// as produced by the data-acquisition collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryObservation {
    pub country_code: String,

    #[serde(default)]
    pub country_name: Option<String>,

    #[serde(default)]
    pub population: Option<f64>,

    /// Cumulative doses administered
    #[serde(default)]
    pub doses_administered: Option<u64>,

    /// Cumulative persons with at least one dose
    #[serde(default)]
    pub persons_vaccinated: Option<u64>,

    /// Explicit coverage fraction, takes precedence over derived rates
    #[serde(default)]
    pub vaccination_rate: Option<f64>,

    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl CountryObservation {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            ..Self::default()
        }
    }

    pub fn with_population(mut self, population: f64) -> Self {
        self.population = Some(population);
        self
    }

    pub fn with_doses_administered(mut self, doses: u64) -> Self {
        self.doses_administered = Some(doses);
        self
    }

    pub fn with_persons_vaccinated(mut self, persons: u64) -> Self {
        self.persons_vaccinated = Some(persons);
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.vaccination_rate = Some(rate);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}
