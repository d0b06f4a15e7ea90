use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use museum_events::config::AppConfig;
use museum_events::logging;
use museum_events::pipeline::{Pipeline, PipelineResult, VenueFilter};
use museum_events::reconcile::ReconcileReport;
use museum_events::summary::{self, RunSummary, StoreStats};
use museum_events::types::RawEvent;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "museum_events")]
#[command(about = "Museum and gallery exhibition event store")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML config file (default: $MUSEUM_EVENTS_CONFIG or museum_events.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Region whose store to use (default: from config)
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IngestArgs {
    /// JSON array of scraped events
    #[arg(long)]
    input: PathBuf,

    /// Only process these venues (comma-separated)
    #[arg(long, value_delimiter = ',')]
    venues: Vec<String>,

    /// Skip these venues (comma-separated)
    #[arg(long, value_delimiter = ',')]
    skip: Vec<String>,

    /// Build and diff events without writing the store
    #[arg(long)]
    dry_run: bool,
}

impl IngestArgs {
    fn filter(&self) -> VenueFilter {
        VenueFilter {
            only: trimmed(&self.venues),
            skip: trimmed(&self.skip),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize scraped events and write new or changed ones
    Ingest(IngestArgs),
    /// Mark events whose end date has passed as past
    Reconcile,
    /// Print venue and event counts for the store
    Stats,
    /// Backup, ingest, reconcile, then append to the size log
    Run(IngestArgs),
}

fn trimmed(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn read_events(path: &Path) -> Result<Vec<RawEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events from {}", path.display()))?;
    let events: Vec<RawEvent> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse events in {}", path.display()))?;
    info!("Loaded {} scraped events from {}", events.len(), path.display());
    Ok(events)
}

fn print_ingest(result: &PipelineResult) {
    println!("\n📊 Ingest Results:");
    println!("   Total events: {}", result.total_events);
    println!("   Created: {}", result.created);
    println!("   Updated: {}", result.updated);
    println!("   Unchanged: {}", result.unchanged);
    println!("   Skipped venues: {}", result.skipped);
    println!("   Errors: {}", result.errors.len());

    if !result.errors.is_empty() {
        warn!("{} errors encountered during ingest", result.errors.len());
        println!("\n⚠️  Errors encountered:");
        for error in &result.errors {
            println!("   - {}", error);
        }
    }
}

fn print_reconcile(report: &ReconcileReport) {
    println!("\n🗓️  Phase Reconciliation:");
    println!("   Examined: {}", report.examined);
    println!("   Marked past: {}", report.marked_past);
    println!("   Past tag removed: {}", report.unmarked_past);
    println!("   Errors: {}", report.errors.len());
}

fn ingest(pipeline: &Pipeline, args: &IngestArgs) -> Result<PipelineResult> {
    let events = read_events(&args.input)?;
    let result = pipeline.process_batch(&events, &args.filter())?;
    print_ingest(&result);
    Ok(result)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let _guard = logging::init_logging(&config.logging);

    let region = cli.region.clone().unwrap_or_else(|| config.default_region.clone());
    if let Commands::Ingest(args) | Commands::Run(args) = &cli.command {
        config.dry_run |= args.dry_run;
    }

    let today = chrono::Local::now().date_naive();
    let pipeline = Pipeline::from_config(&config, &region, today)
        .with_context(|| format!("Failed to set up pipeline for region '{}'", region))?;
    info!("Using store {} for region {}", pipeline.storage().location(), region);

    match &cli.command {
        Commands::Ingest(args) => {
            println!("🔄 Ingesting events...");
            ingest(&pipeline, args)?;
        }
        Commands::Reconcile => {
            println!("🔄 Reconciling event phases...");
            let report = pipeline.run_phase_reconciliation()?;
            print_reconcile(&report);
        }
        Commands::Stats => {
            let stats = StoreStats::of(&pipeline.storage().load());
            println!("📦 {} venues, {} events", stats.venues, stats.events);
        }
        Commands::Run(args) => {
            println!("🚀 Running full pipeline...");
            let started = Instant::now();
            let store_path = config.region(&region)?.store_path.clone();

            if config.summary.backup && !config.dry_run {
                println!("\n💾 Step 1: Backing up store...");
                summary::backup_store(&store_path)
                    .with_context(|| format!("Failed to back up {}", store_path.display()))?;
            }

            println!("\n📥 Step 2: Ingesting events...");
            ingest(&pipeline, args)?;

            println!("\n🗓️  Step 3: Reconciling phases...");
            match pipeline.run_phase_reconciliation() {
                Ok(report) => print_reconcile(&report),
                Err(e) => {
                    error!("Phase reconciliation failed: {}", e);
                    println!("❌ Phase reconciliation failed: {}", e);
                    return Err(e.into());
                }
            }

            let stats = StoreStats::of(&pipeline.storage().load());
            let run = RunSummary {
                timestamp: chrono::Utc::now(),
                stats,
                elapsed_secs: started.elapsed().as_secs_f64(),
            };
            if !config.dry_run {
                summary::append_summary(&config.summary.csv_path, &run).with_context(|| {
                    format!("Failed to append to {}", config.summary.csv_path.display())
                })?;
            }
            println!(
                "✅ Full pipeline completed: {} venues, {} events in {:.1}s",
                stats.venues, stats.events, run.elapsed_secs
            );
        }
    }
    Ok(())
}
