use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::country::{CountryObservation, CountryRecord};
use crate::config::{DataConfig, InvalidPopulationPolicy};
use crate::error::DataValidationError;

/// The Country Data Table: exactly one validated record per country code,
/// iterated in ascending code order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CountryTable {
    records: BTreeMap<String, CountryRecord>,
}

/// Outcome of reconciling raw observations into a table.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub table: CountryTable,

    /// Countries excluded by the `drop` policy, with the reason
    pub excluded: Vec<DataValidationError>,

    /// Observations discarded by the pick-latest reduction
    pub superseded_observations: usize,
}

impl CountryTable {
    /// Build a table from already reconciled records.
    ///
    /// Fails on duplicate codes or on any record violating
    /// [`CountryRecord::validate`].
    pub fn from_records(
        records: impl IntoIterator<Item = CountryRecord>,
    ) -> Result<Self, DataValidationError> {
        let mut table = BTreeMap::new();
        for record in records {
            record.validate()?;
            match table.entry(record.country_code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(_) => {
                    return Err(DataValidationError::DuplicateCountry(record.country_code));
                }
            }
        }
        Ok(Self { records: table })
    }

    /// Reconcile raw observations into a table.
    ///
    /// Steps, in order: include-list filter, pick-latest reduction per code,
    /// vaccination-rate filling, population validation per policy.
    pub fn from_observations(
        observations: Vec<CountryObservation>,
        config: &DataConfig,
    ) -> Result<IngestReport, DataValidationError> {
        let include: Option<BTreeSet<String>> = config
            .countries
            .as_ref()
            .map(|codes| codes.iter().map(|c| normalize_code(c)).collect());

        let total = observations.len();
        let (latest, superseded) = latest_per_country(observations.into_iter().filter(|obs| {
            include
                .as_ref()
                .map_or(true, |codes| codes.contains(&normalize_code(&obs.country_code)))
        }));
        debug!(
            observations = total,
            countries = latest.len(),
            superseded,
            "reduced observations to latest per country"
        );

        let mut records = BTreeMap::new();
        let mut excluded = Vec::new();

        for (code, obs) in latest {
            match reconcile(code, obs, config) {
                Ok(record) => {
                    records.insert(record.country_code.clone(), record);
                }
                Err(err) => match config.invalid_population {
                    InvalidPopulationPolicy::Abort => return Err(err),
                    _ => {
                        warn!(error = %err, "excluding country from table");
                        excluded.push(err);
                    }
                },
            }
        }

        info!(
            countries = records.len(),
            excluded = excluded.len(),
            "country table reconciled"
        );

        Ok(IngestReport {
            table: Self { records },
            excluded,
            superseded_observations: superseded,
        })
    }

    pub fn get(&self, country_code: &str) -> Option<&CountryRecord> {
        self.records.get(country_code)
    }

    pub fn contains(&self, country_code: &str) -> bool {
        self.records.contains_key(country_code)
    }

    /// Records in ascending country-code order
    pub fn iter(&self) -> impl Iterator<Item = &CountryRecord> {
        self.records.values()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_population(&self) -> f64 {
        self.records.values().map(|r| r.population).sum()
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Keep the most recent observation for each country code.
///
/// Undated observations rank below dated ones; among equal dates the later
/// observation in input order wins. Returns the survivors and the number of
/// discarded observations.
fn latest_per_country(
    observations: impl Iterator<Item = CountryObservation>,
) -> (BTreeMap<String, CountryObservation>, usize) {
    let mut latest: BTreeMap<String, CountryObservation> = BTreeMap::new();
    let mut superseded = 0;

    for obs in observations {
        match latest.entry(normalize_code(&obs.country_code)) {
            Entry::Vacant(slot) => {
                slot.insert(obs);
            }
            Entry::Occupied(mut slot) => {
                superseded += 1;
                if obs.date >= slot.get().date {
                    slot.insert(obs);
                }
            }
        }
    }

    (latest, superseded)
}

fn reconcile(
    code: String,
    obs: CountryObservation,
    config: &DataConfig,
) -> Result<CountryRecord, DataValidationError> {
    if code.is_empty() {
        return Err(DataValidationError::EmptyCountryCode);
    }

    let population = match resolve_population(&code, obs.population) {
        Ok(population) => population,
        Err(err) => match config.invalid_population {
            InvalidPopulationPolicy::Minimum { population } => {
                warn!(country = %code, population, error = %err, "substituting minimum population");
                population
            }
            _ => return Err(err),
        },
    };

    let vaccination_rate = resolve_rate(&code, &obs, population, config.missing_rate_fallback)?;

    let record = CountryRecord {
        country_code: code,
        country_name: obs.country_name,
        population,
        doses_administered: obs.doses_administered.unwrap_or(0),
        vaccination_rate,
        last_updated: obs.date,
    };
    record.validate()?;
    Ok(record)
}

fn resolve_population(code: &str, population: Option<f64>) -> Result<f64, DataValidationError> {
    match population {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        Some(p) => Err(DataValidationError::NonPositivePopulation {
            country: code.to_string(),
            population: p,
        }),
        None => Err(DataValidationError::MissingPopulation {
            country: code.to_string(),
        }),
    }
}

/// Explicit rate, then persons vaccinated, then doses administered, then the
/// configured fallback. Derived rates are clamped to [0, 1].
fn resolve_rate(
    code: &str,
    obs: &CountryObservation,
    population: f64,
    fallback: f64,
) -> Result<f64, DataValidationError> {
    if let Some(rate) = obs.vaccination_rate {
        if rate.is_finite() && (0.0..=1.0).contains(&rate) {
            return Ok(rate);
        }
        return Err(DataValidationError::RateOutOfRange {
            country: code.to_string(),
            rate,
        });
    }

    let derived = obs
        .persons_vaccinated
        .or(obs.doses_administered)
        .map(|count| (count as f64 / population).clamp(0.0, 1.0));

    Ok(derived.unwrap_or(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_latest_observation_wins() {
        let observations = vec![
            CountryObservation::new("NG")
                .with_population(200.0)
                .with_rate(0.4)
                .with_date(date(2022, 5, 1)),
            CountryObservation::new("NG")
                .with_population(210.0)
                .with_rate(0.1)
                .with_date(date(2021, 1, 1)),
            CountryObservation::new("NG")
                .with_population(205.0)
                .with_rate(0.2),
        ];

        let report = CountryTable::from_observations(observations, &DataConfig::default()).unwrap();
        let ng = report.table.get("NG").unwrap();
        assert_eq!(ng.vaccination_rate, 0.4);
        assert_eq!(ng.population, 200.0);
        assert_eq!(report.superseded_observations, 2);
    }

    #[test]
    fn test_equal_dates_keep_later_observation() {
        let observations = vec![
            CountryObservation::new("KE")
                .with_population(50.0)
                .with_rate(0.3)
                .with_date(date(2022, 5, 1)),
            CountryObservation::new("ke")
                .with_population(50.0)
                .with_rate(0.35)
                .with_date(date(2022, 5, 1)),
        ];

        let report = CountryTable::from_observations(observations, &DataConfig::default()).unwrap();
        assert_eq!(report.table.len(), 1);
        assert_eq!(report.table.get("KE").unwrap().vaccination_rate, 0.35);
    }

    #[test]
    fn test_rate_filling_order() {
        let observations = vec![
            CountryObservation::new("AA")
                .with_population(100.0)
                .with_persons_vaccinated(30)
                .with_doses_administered(90),
            CountryObservation::new("BB")
                .with_population(100.0)
                .with_doses_administered(250),
            CountryObservation::new("CC").with_population(100.0),
        ];
        let config = DataConfig {
            missing_rate_fallback: 0.05,
            ..DataConfig::default()
        };

        let table = CountryTable::from_observations(observations, &config)
            .unwrap()
            .table;
        assert_eq!(table.get("AA").unwrap().vaccination_rate, 0.3);
        assert_eq!(table.get("AA").unwrap().doses_administered, 90);
        assert_eq!(table.get("BB").unwrap().vaccination_rate, 1.0);
        assert_eq!(table.get("CC").unwrap().vaccination_rate, 0.05);
    }

    #[test]
    fn test_out_of_range_fallback_excludes_country() {
        let observations = vec![
            CountryObservation::new("AA")
                .with_population(100.0)
                .with_rate(0.2),
            CountryObservation::new("BB").with_population(100.0),
        ];
        let config = DataConfig {
            missing_rate_fallback: 1.5,
            ..DataConfig::default()
        };

        let report = CountryTable::from_observations(observations, &config).unwrap();
        assert_eq!(report.table.len(), 1);
        assert!(report.table.iter().all(|r| r.vaccination_rate <= 1.0));
        assert!(matches!(
            report.excluded.as_slice(),
            [DataValidationError::RateOutOfRange { country, .. }] if country == "BB"
        ));
    }

    #[test]
    fn test_invalid_population_policies() {
        let observations = || {
            vec![
                CountryObservation::new("AA").with_population(100.0),
                CountryObservation::new("BB").with_population(0.0),
                CountryObservation::new("CC"),
            ]
        };

        let dropped = CountryTable::from_observations(observations(), &DataConfig::default()).unwrap();
        assert_eq!(dropped.table.len(), 1);
        assert_eq!(dropped.excluded.len(), 2);
        assert_eq!(dropped.excluded[0].country(), Some("BB"));

        let floored = CountryTable::from_observations(
            observations(),
            &DataConfig {
                invalid_population: InvalidPopulationPolicy::Minimum { population: 1000.0 },
                ..DataConfig::default()
            },
        )
        .unwrap();
        assert_eq!(floored.table.len(), 3);
        assert_eq!(floored.table.get("CC").unwrap().population, 1000.0);

        let aborted = CountryTable::from_observations(
            observations(),
            &DataConfig {
                invalid_population: InvalidPopulationPolicy::Abort,
                ..DataConfig::default()
            },
        );
        assert!(matches!(
            aborted,
            Err(DataValidationError::NonPositivePopulation { .. })
        ));
    }

    #[test]
    fn test_include_list_filters_countries() {
        let observations = vec![
            CountryObservation::new("US").with_population(330.0),
            CountryObservation::new("FR").with_population(67.0),
        ];
        let config = DataConfig {
            countries: Some(vec!["fr".to_string()]),
            ..DataConfig::default()
        };

        let table = CountryTable::from_observations(observations, &config)
            .unwrap()
            .table;
        assert_eq!(table.codes().collect::<Vec<_>>(), vec!["FR"]);
    }

    #[test]
    fn test_explicit_rate_out_of_range_is_reported() {
        let observations = vec![CountryObservation::new("AA")
            .with_population(100.0)
            .with_rate(1.7)];

        let report = CountryTable::from_observations(observations, &DataConfig::default()).unwrap();
        assert!(report.table.is_empty());
        assert!(matches!(
            report.excluded[0],
            DataValidationError::RateOutOfRange { .. }
        ));
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let result = CountryTable::from_records(vec![
            CountryRecord::new("AA", 10.0, 0.1),
            CountryRecord::new("AA", 12.0, 0.2),
        ]);
        assert_eq!(
            result,
            Err(DataValidationError::DuplicateCountry("AA".to_string()))
        );
    }
}
