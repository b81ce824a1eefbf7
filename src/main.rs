//! Chronicle Query Pipeline CLI
//!
//! Runs a pipeline query over samples loaded from CSV:
//! - `run`: load data, build the pipeline, scan, print the result set
//! - `config`: print or write the default configuration

use anyhow::{bail, Context};
use chrono::{TimeZone, Utc};
use chronicle_qp::config::{generate_default_config, Config};
use chronicle_qp::index::{IdLookup, IdTable};
use chronicle_qp::logging::{self, Logger};
use chronicle_qp::query::{parse_query, Collector, QueryDefinition};
use chronicle_qp::storage::{MemoryScan, Sample};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chronicle-qp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Streaming query pipeline over time-series samples")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/chronicle/qp.toml, then ./qp.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query over a CSV file
    Run {
        /// CSV with timestamp,series,value columns
        #[arg(short, long)]
        data: PathBuf,
        /// Query text, e.g. "SELECT cpu | RESAMPLE 60000 max"
        #[arg(short, long, conflicts_with = "json_query", required_unless_present = "json_query")]
        query: Option<String>,
        /// Query definition as a JSON file
        #[arg(long)]
        json_query: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Fixed reservoir seed, overrides the config
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the default configuration
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// One output row: the sample with its series name resolved
#[derive(Serialize)]
struct Row<'a> {
    timestamp: u64,
    series: &'a str,
    value: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging);

    match cli.command {
        Commands::Run {
            data,
            query,
            json_query,
            format,
            seed,
        } => {
            if seed.is_some() {
                config.pipeline.reservoir_seed = seed;
            }

            let definition = match (query, json_query) {
                (Some(text), _) => parse_query(&text)?,
                (None, Some(path)) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading query definition {:?}", path))?;
                    QueryDefinition::from_json(&json)?
                }
                (None, None) => bail!("either --query or --json-query is required"),
            };

            let mut ids = IdTable::new();
            let scan = MemoryScan::from_path(&data, &mut ids)
                .with_context(|| format!("loading samples from {:?}", data))?;
            tracing::info!("Loaded {} samples, {} series", scan.len(), ids.len());

            let sink = Collector::shared();
            let mut processor =
                definition.build(sink.clone(), &ids, &Logger::tracing(), &config.pipeline)?;
            let stats = scan.run(&mut processor);

            let samples = sink.borrow_mut().take();
            tracing::info!(
                "{} scanned, {} matched, {} returned",
                stats.scanned,
                stats.matched,
                samples.len()
            );

            let rows: Vec<Row> = samples.iter().map(|s| to_row(s, &ids)).collect();
            match format {
                OutputFormat::Table => print_table(&rows),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
                OutputFormat::Csv => print_csv(&rows)?,
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing config to {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn to_row<'a>(sample: &Sample, ids: &'a IdTable) -> Row<'a> {
    Row {
        timestamp: sample.timestamp,
        series: ids.name_of(sample.series_id).unwrap_or("?"),
        value: sample.value,
    }
}

/// Render a millisecond timestamp; falls back to the raw number
fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_table(rows: &[Row]) {
    if rows.is_empty() {
        println!("No data for the selected query");
        return;
    }

    println!("{:<24} | {:<20} | {}", "Time", "Series", "Value");
    println!("{}", "-".repeat(60));
    for row in rows {
        println!(
            "{:<24} | {:<20} | {:.4}",
            format_timestamp(row.timestamp),
            row.series,
            row.value
        );
    }
}

fn print_csv(rows: &[Row]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
