//! Stage sequencing and output-directory bookkeeping

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use vaxequity_allocation::{optimize, AllocationOutcome, AllocationProblem, OptimizationConfig};
use vaxequity_core::{Config, CountryObservation, CountryRecord, CountryTable, NeedScore, NeedScorer};
use vaxequity_network::NetworkAnalysis;

pub const PROCESSED_COUNTRIES: &str = "processed_countries.json";
pub const NETWORK_ANALYSIS: &str = "network_analysis.json";
pub const OPTIMIZATION_RESULTS: &str = "optimization_results.json";

#[derive(Serialize)]
struct OptimizationDocument<'a> {
    #[serde(flatten)]
    outcome: &'a AllocationOutcome,
    as_of: NaiveDate,
    need_scores: &'a BTreeMap<String, NeedScore>,
    /// Country bottlenecks, most urgent first
    remediation_order: Vec<&'a str>,
}

pub struct Pipeline {
    config: Config,
    output_dir: PathBuf,
    as_of: NaiveDate,
}

impl Pipeline {
    pub fn new(config: Config, output_dir: PathBuf, as_of: NaiveDate) -> Self {
        Self {
            config,
            output_dir,
            as_of,
        }
    }

    fn output_path(&self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory {:?}", self.output_dir)
        })?;
        Ok(self.output_dir.join(name))
    }

    /// Reconcile raw observations and write `processed_countries.json`.
    pub fn data(&self, input: &Path) -> Result<CountryTable> {
        let content = fs::read_to_string(input)
            .with_context(|| format!("Failed to read observations from {input:?}"))?;
        let observations: Vec<CountryObservation> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse observations in {input:?}"))?;

        let report = CountryTable::from_observations(observations, &self.config.data)
            .context("Country data validation failed")?;

        write_json(&self.output_path(PROCESSED_COUNTRIES)?, &report.table)?;
        info!(
            countries = report.table.len(),
            dropped = report.excluded.len(),
            superseded = report.superseded_observations,
            "data stage complete"
        );
        Ok(report.table)
    }

    /// Build and analyze the network and write `network_analysis.json`.
    pub fn network(&self, table: &CountryTable) -> Result<NetworkAnalysis> {
        let analysis = NetworkAnalysis::run(&self.config.network, table)
            .context("Failed to build distribution network")?;
        write_json(&self.output_path(NETWORK_ANALYSIS)?, &analysis.report())?;
        info!(
            bottleneck_edges = analysis.bottlenecks.edges.len(),
            bottleneck_countries = analysis.bottlenecks.countries.len(),
            "network stage complete"
        );
        Ok(analysis)
    }

    /// Solve the allocation and write `optimization_results.json`.
    pub fn optimize(
        &self,
        table: &CountryTable,
        analysis: &NetworkAnalysis,
        budget: Option<f64>,
    ) -> Result<AllocationOutcome> {
        let budget = budget.unwrap_or(self.config.allocation.budget);
        let scores = NeedScorer::new(self.config.need, self.as_of)?.score_table(table);

        let problem = AllocationProblem::from_network(
            table,
            &analysis.network,
            &scores,
            &self.config.allocation,
            budget,
        )?;
        let outcome = optimize(
            &problem,
            table,
            &OptimizationConfig::from(&self.config.solver),
            self.config.equity.weighting,
        )?;

        let document = OptimizationDocument {
            outcome: &outcome,
            as_of: self.as_of,
            need_scores: &scores,
            remediation_order: analysis
                .bottlenecks
                .remediation_order(&scores)
                .into_iter()
                .map(|c| c.country.as_str())
                .collect(),
        };
        write_json(&self.output_path(OPTIMIZATION_RESULTS)?, &document)?;
        info!(
            total_allocated = outcome.result.total_allocated,
            budget,
            "optimize stage complete"
        );
        Ok(outcome)
    }

    /// data -> network -> optimize
    pub fn run(&self, input: &Path, budget: Option<f64>) -> Result<AllocationOutcome> {
        let table = self.data(input)?;
        let analysis = self.network(&table)?;
        self.optimize(&table, &analysis, budget)
    }
}

/// Load a table written by the data stage.
pub fn load_table(path: &Path) -> Result<CountryTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read country table from {path:?}"))?;
    let records: BTreeMap<String, CountryRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse country table in {path:?}"))?;
    CountryTable::from_records(records.into_values())
        .with_context(|| format!("Invalid country table in {path:?}"))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {path:?}"))?;
    info!(path = %path.display(), "wrote results");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaxequity_core::{NetworkConfig, SupplyNodeSpec};

    fn observations() -> &'static str {
        r#"[
            {"country_code": "KEN", "population": 1000, "doses_administered": 200, "date": "2023-01-01"},
            {"country_code": "KEN", "population": 1000, "doses_administered": 300, "date": "2023-02-01"},
            {"country_code": "FRA", "population": 600, "vaccination_rate": 0.8, "date": "2023-02-01"},
            {"country_code": "XXX", "population": 0}
        ]"#
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.network = NetworkConfig::with_supply(vec![SupplyNodeSpec::new("hub", 800.0)]);
        config.allocation.budget = 100.0;
        config
    }

    #[test]
    fn test_run_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("observations.json");
        fs::write(&input, observations()).unwrap();
        let output_dir = dir.path().join("results");

        let as_of = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let pipeline = Pipeline::new(config(), output_dir.clone(), as_of);
        let outcome = pipeline.run(&input, None).unwrap();

        assert!(outcome.result.total_allocated <= 100.0 + 1e-9);
        assert!(outcome.result.doses_for("KEN") > 0.0);

        let table = load_table(&output_dir.join(PROCESSED_COUNTRIES)).unwrap();
        assert_eq!(table.len(), 2);
        assert!((table.get("KEN").unwrap().vaccination_rate - 0.3).abs() < 1e-12);

        let network: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output_dir.join(NETWORK_ANALYSIS)).unwrap())
                .unwrap();
        assert_eq!(network["node_count"], 3);

        let results: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(output_dir.join(OPTIMIZATION_RESULTS)).unwrap(),
        )
        .unwrap();
        assert!(results["allocation"]["KEN"].is_number());
        assert_eq!(results["as_of"], "2023-03-01");
        assert_eq!(results["report"]["backend"], "simplex");
    }

    #[test]
    fn test_budget_override_and_negative_budget() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("observations.json");
        fs::write(&input, observations()).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let pipeline = Pipeline::new(config(), dir.path().join("out"), as_of);

        let outcome = pipeline.run(&input, Some(0.0)).unwrap();
        assert_eq!(outcome.result.total_allocated, 0.0);

        let err = pipeline.run(&input, Some(-1.0)).unwrap_err();
        let core = err.downcast_ref::<vaxequity_core::Error>().unwrap();
        assert!(matches!(core, vaxequity_core::Error::Infeasible(_)));
    }

    #[test]
    fn test_missing_input_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Config::default(),
            dir.path().to_path_buf(),
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        let err = pipeline.data(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
