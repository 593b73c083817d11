//! vaxequity CLI - network-aware, equity-weighted vaccine allocation.

mod example_config;
mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vaxequity_core::Config;

use crate::example_config::EXAMPLE_CONFIG;
use crate::pipeline::{load_table, Pipeline, PROCESSED_COUNTRIES};

#[derive(Parser)]
#[command(name = "vaxequity")]
#[command(version)]
#[command(about = "Equity-aware vaccine allocation over a supply distribution network")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output, including per-iteration solver logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct OutputArgs {
    /// Directory receiving the stage outputs
    #[arg(short, long, default_value = "results")]
    output_dir: PathBuf,
}

#[derive(Args)]
struct SolveArgs {
    /// Reference date for data recency (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Total dose budget, overriding `allocation.budget`
    #[arg(short, long, allow_negative_numbers = true)]
    budget: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run data, network and optimize in sequence
    Run {
        /// Raw country observations (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        solve: SolveArgs,
    },

    /// Reconcile raw observations into the country table
    Data {
        /// Raw country observations (JSON array)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Build the distribution network and report bottlenecks
    Network {
        /// Country table written by the data stage
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Solve the allocation for a country table
    Optimize {
        /// Country table written by the data stage
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        solve: SolveArgs,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    ExampleConfig,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {path:?}"))?,
        None => Config::default(),
    };
    config.validate().context("Invalid configuration")?;
    config.solver.verbose |= verbose;
    Ok(config)
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Stage input defaults to the data stage's output in the same directory.
fn table_path(input: Option<PathBuf>, output: &OutputArgs) -> PathBuf {
    input.unwrap_or_else(|| output.output_dir.join(PROCESSED_COUNTRIES))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::ExampleConfig => {
            println!("{EXAMPLE_CONFIG}");
        }

        Commands::Validate => {
            let config = load_config(config_path, cli.verbose)?;
            info!("Configuration is valid");
            info!(
                supply_nodes = config.network.supply.len(),
                total_supply = config.network.total_supply(),
                budget = config.allocation.budget,
                alpha = config.allocation.alpha,
                backend = ?config.solver.backend,
                "Loaded configuration"
            );
        }

        Commands::Run {
            input,
            output,
            solve,
        } => {
            let config = load_config(config_path, cli.verbose)?;
            let pipeline = Pipeline::new(config, output.output_dir, solve.as_of.unwrap_or_else(today));
            let outcome = pipeline.run(&input, solve.budget)?;
            info!(
                total_allocated = outcome.result.total_allocated,
                before_gini = outcome.result.equity_metrics.before_gini,
                after_gini = outcome.result.equity_metrics.after_gini,
                "Pipeline complete"
            );
        }

        Commands::Data { input, output } => {
            let config = load_config(config_path, cli.verbose)?;
            Pipeline::new(config, output.output_dir, today()).data(&input)?;
        }

        Commands::Network { input, output } => {
            let config = load_config(config_path, cli.verbose)?;
            let table = load_table(&table_path(input, &output))?;
            Pipeline::new(config, output.output_dir, today()).network(&table)?;
        }

        Commands::Optimize {
            input,
            output,
            solve,
        } => {
            let config = load_config(config_path, cli.verbose)?;
            let table = load_table(&table_path(input, &output))?;
            let pipeline =
                Pipeline::new(config, output.output_dir, solve.as_of.unwrap_or_else(today));
            let analysis = pipeline.network(&table)?;
            pipeline.optimize(&table, &analysis, solve.budget)?;
        }
    }

    Ok(())
}
