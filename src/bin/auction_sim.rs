//! Run one auction job on an in-memory round engine and write a JSON summary

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use bsp_auction::auction::types::{NodeRecord, Role};
use bsp_auction::bsp::{AuctionJob, ConvergenceStatus, LocalRoundEngine};
use bsp_auction::config::{JobConfig, load_document};
use bsp_auction::generate::{GenParams, generate_instance};
use bsp_auction::input::{load_records, save_records};
use bsp_auction::logger;
use bsp_auction::report::{RoundLog, build_report, write_report_json};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SourceMode {
    Random,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataConfig {
    mode: SourceMode,
    #[serde(default)]
    random: Option<GenParams>,
    #[serde(default)]
    path: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Random,
            random: Some(GenParams::new(8, 8)),
            path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OutputConfig {
    dir: PathBuf,
    use_timestamp: bool,
    timestamp_fmt: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            use_timestamp: true,
            timestamp_fmt: "%Y-%m-%d_%H-%M-%S".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimConfig {
    auction: JobConfig,
    #[serde(default)]
    data: DataConfig,
    #[serde(default)]
    output: OutputConfig,
    #[serde(default)]
    log_level: Option<String>,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a pkl or JSON configuration file
    #[arg(long)]
    config: PathBuf,

    /// JSON-lines graph to load instead of the configured source
    #[arg(long)]
    input: Option<PathBuf>,

    /// Generate a random instance with this many bidders
    #[arg(long, requires = "random_items")]
    random_bidders: Option<usize>,

    #[arg(long, requires = "random_bidders")]
    random_items: Option<usize>,

    /// Seed for random generation
    #[arg(long)]
    seed: Option<u64>,

    /// Override the result directory
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    epsilon: Option<Decimal>,

    #[arg(long)]
    max_rounds: Option<u64>,
}

fn load_instance(
    cli: &Cli,
    data: &DataConfig,
    result_dir: &Path,
) -> anyhow::Result<Vec<NodeRecord>> {
    let copy_to = result_dir.join("graph.jsonl");

    let file = cli
        .input
        .clone()
        .or_else(|| (data.mode == SourceMode::File).then(|| data.path.clone()).flatten());
    if cli.random_bidders.is_none() && let Some(path) = file {
        info!("Loading graph from {}", path.display());
        if let Err(e) = std::fs::copy(&path, &copy_to) {
            warn!("Failed to copy input graph: {}", e);
        }
        return load_records(&path);
    }
    if data.mode == SourceMode::File && cli.random_bidders.is_none() {
        anyhow::bail!("data mode is file but no path was given");
    }

    let mut params = data.random.clone().unwrap_or_else(|| GenParams::new(8, 8));
    if let (Some(bidders), Some(items)) = (cli.random_bidders, cli.random_items) {
        params.bidders = bidders;
        params.items = items;
    }
    if cli.seed.is_some() {
        params.seed = cli.seed;
    }
    info!(
        "Generating random graph: {} bidders, {} items",
        params.bidders, params.items
    );
    let records = generate_instance(&params)?;
    save_records(&records, &copy_to)?;
    Ok(records)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config: SimConfig = load_document(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(epsilon) = cli.epsilon {
        config.auction.epsilon = epsilon;
    }
    if let Some(max_rounds) = cli.max_rounds {
        config.auction.max_rounds = max_rounds;
    }
    config.auction.validate()?;

    let output_dir = cli.output.clone().unwrap_or_else(|| config.output.dir.clone());
    let result_dir = if config.output.use_timestamp {
        let date_str = Local::now().format(&config.output.timestamp_fmt).to_string();
        output_dir.join(date_str)
    } else {
        output_dir
    };
    std::fs::create_dir_all(&result_dir)
        .with_context(|| format!("Failed to create {}", result_dir.display()))?;

    let level = config.log_level.as_deref().unwrap_or("info");
    let _guard = logger::init(Some(&result_dir.join("simulation.log")), level)
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))?;

    info!("Loaded configuration from {}", cli.config.display());
    info!("Results will be saved to: {}", result_dir.display());

    let records = load_instance(&cli, &config.data, &result_dir)?;
    info!(
        "{} bidders, {} items, epsilon {}, max rounds {}",
        records.iter().filter(|r| r.role == Role::Bidder).count(),
        records.iter().filter(|r| r.role == Role::Item).count(),
        config.auction.epsilon,
        config.auction.max_rounds
    );

    let sim_start = Instant::now();
    let mut job = AuctionJob::new(records.clone(), config.auction.clone())?;
    let mut engine = LocalRoundEngine::new();
    let mut round_logs = Vec::new();
    let mut round_start = Instant::now();

    let result = job.run_observed(&mut engine, |job, status| {
        let mut matched_bidders = 0;
        let mut price_sum = Decimal::ZERO;
        for vertex in job.vertices() {
            match vertex.role() {
                Role::Bidder if vertex.state().is_matched() => matched_bidders += 1,
                Role::Bidder => {}
                Role::Item => price_sum += vertex.state().price(),
            }
        }
        round_logs.push(RoundLog {
            round: job.rounds(),
            round_ms: round_start.elapsed().as_secs_f64() * 1000.0,
            matched_bidders,
            price_sum,
            converged_after_this: status == ConvergenceStatus::Converged,
        });
        round_start = Instant::now();
    });

    if result.status == ConvergenceStatus::BudgetExceeded {
        warn!("Auction stopped by the round budget; reporting the matching so far");
    }

    let report = build_report(&result, &records, round_logs, sim_start);
    info!(
        "Total matched value {} over {} pairs",
        report.total_value,
        report.pairs.len()
    );
    let summary_path = write_report_json(&report, &result_dir)?;
    info!("JSON summary saved to {}", summary_path.display());

    Ok(())
}
