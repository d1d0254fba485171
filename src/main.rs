//! Real Estate Toolkit - CSV loading, validation, analysis & simulation
//!
//! # Usage
//!
//! ```bash
//! # Print every row as JSON
//! real_estate_toolkit load data/train.csv --clean
//!
//! # Check required columns (exit status 1 when any is missing)
//! real_estate_toolkit validate data/train.csv SalePrice LotArea
//!
//! # Descriptive statistics of the cleaned data
//! real_estate_toolkit describe data/train.csv --columns sale_price,lot_area --percentile 90
//!
//! # Price, neighborhood and correlation charts into ./reports
//! real_estate_toolkit analyze data/train.csv --output reports
//!
//! # Let 500 consumers save for 10 years and buy from a house list
//! real_estate_toolkit simulate houses.csv --consumers 500 --years 10 --mechanism random
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to change the level.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use real_estate_toolkit::agent_based_model::{
    AnnualIncomeStatistics, ChildrenRange, CleaningMarketMechanism, Simulation, SimulationConfig,
};
use real_estate_toolkit::analytics::MarketAnalyzer;
use real_estate_toolkit::data::{Cleaner, DataLoader, Record};
use real_estate_toolkit::stats::{Columns, Descriptor};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "real_estate_toolkit")]
#[command(version)]
#[command(about = "Load, validate and describe real estate CSV data")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every record as a JSON array
    Load {
        /// CSV file with a header row
        path: PathBuf,

        /// Snake-case column names and turn "NA" into null
        #[arg(long)]
        clean: bool,
    },

    /// Check that the header contains every listed column
    Validate {
        /// CSV file with a header row
        path: PathBuf,

        /// Required column names
        columns: Vec<String>,
    },

    /// Print descriptive statistics of the cleaned records as JSON
    Describe {
        /// CSV file with a header row
        path: PathBuf,

        /// Comma-separated columns (after cleaning); all columns when omitted
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Percentile to report, 0-100
        #[arg(long, default_value_t = 50.0, value_parser = parse_percentile)]
        percentile: f64,
    },

    /// Clean the Ames housing data, print market statistics and write charts
    Analyze {
        /// Ames housing CSV ("NA" marks a missing value)
        path: PathBuf,

        /// Directory for the PNG charts
        #[arg(short, long, default_value = "reports")]
        output: PathBuf,

        /// Comma-separated columns for the correlation heatmap
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "SalePrice,GrLivArea,YearBuilt,OverallQual,TotalBsmtSF,GarageArea"
        )]
        correlate: Vec<String>,
    },

    /// Run the housing market simulation on a CSV of houses
    Simulate {
        /// CSV with id, price, area, bedrooms, year_built and optionally quality_score, available
        path: PathBuf,

        #[arg(long, default_value_t = 100)]
        consumers: usize,

        /// Years of saving before the market opens
        #[arg(long, default_value_t = 10)]
        years: u32,

        #[arg(long, default_value_t = 20_000.0)]
        income_min: f64,

        #[arg(long, default_value_t = 60_000.0)]
        income_avg: f64,

        #[arg(long, default_value_t = 25_000.0)]
        income_std: f64,

        #[arg(long, default_value_t = 200_000.0)]
        income_max: f64,

        #[arg(long, default_value_t = 0)]
        children_min: u32,

        #[arg(long, default_value_t = 5)]
        children_max: u32,

        /// Order in which consumers get to buy
        #[arg(long, value_enum, default_value_t = Mechanism::Random)]
        mechanism: Mechanism,

        #[arg(long, default_value_t = 0.3)]
        saving_rate: f64,

        #[arg(long, default_value_t = 0.05)]
        interest_rate: f64,

        /// Seed for the income, children and ordering draws
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mechanism {
    /// Richest consumers buy first
    Descending,
    /// Poorest consumers buy first
    Ascending,
    /// Shuffled order
    Random,
}

impl From<Mechanism> for CleaningMarketMechanism {
    fn from(mechanism: Mechanism) -> Self {
        match mechanism {
            Mechanism::Descending => CleaningMarketMechanism::IncomeOrderDescendant,
            Mechanism::Ascending => CleaningMarketMechanism::IncomeOrderAscendant,
            Mechanism::Random => CleaningMarketMechanism::Random,
        }
    }
}

fn parse_percentile(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if !p.is_finite() || !(0.0..=100.0).contains(&p) {
        return Err(format!("percentile must be between 0 and 100, got {s}"));
    }
    Ok(p)
}

fn main() -> Result<ExitCode> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load { path, clean } => {
            let mut records = load(&path)?;
            if clean {
                records = clean_records(records);
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Validate { path, columns } => {
            let loader = DataLoader::new(&path);
            let valid = loader.validate_columns(&columns);
            println!("{valid}");
            if !valid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Describe {
            path,
            columns,
            percentile,
        } => {
            let records = clean_records(load(&path)?);
            let columns = if columns.is_empty() {
                Columns::All
            } else {
                Columns::Named(columns)
            };
            let summary = Descriptor::new(&records).summary(&columns, percentile)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Analyze {
            path,
            output,
            correlate,
        } => {
            let mut analyzer = MarketAnalyzer::new(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            analyzer.clean_data()?;

            let prices = analyzer.generate_price_distribution_analysis(&output)?;
            let neighborhoods = analyzer.generate_neighborhood_comparison(&output)?;
            let correlation = analyzer.feature_correlation_heatmap(correlate.as_slice(), &output)?;
            let scatter_plots = analyzer.create_scatter_plots(&output)?;
            info!(output = %output.display(), charts = scatter_plots.len() + 3, "Wrote charts");

            let report = json!({
                "price_statistics": prices,
                "neighborhoods": neighborhoods,
                "correlation": correlation,
                "scatter_plots": scatter_plots,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Simulate {
            path,
            consumers,
            years,
            income_min,
            income_avg,
            income_std,
            income_max,
            children_min,
            children_max,
            mechanism,
            saving_rate,
            interest_rate,
            seed,
        } => {
            let houses = load(&path)?;
            let annual_income = AnnualIncomeStatistics {
                minimum: income_min,
                average: income_avg,
                standard_deviation: income_std,
                maximum: income_max,
            };
            let config = SimulationConfig {
                children_range: ChildrenRange {
                    minimum: children_min,
                    maximum: children_max,
                },
                saving_rate,
                interest_rate,
                seed,
                ..SimulationConfig::new(consumers, years, annual_income, mechanism.into())
            };
            let outcome = Simulation::new(houses, config).run()?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load(path: &Path) -> Result<Vec<Record>> {
    let records = DataLoader::new(path)
        .try_load_all_records()
        .with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), rows = records.len(), "Loaded records");
    Ok(records)
}

fn clean_records(records: Vec<Record>) -> Vec<Record> {
    let mut cleaner = Cleaner::new(records);
    cleaner.rename_with_best_practices();
    cleaner.na_to_none();
    cleaner.into_records()
}
