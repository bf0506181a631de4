use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

mod analytics;
mod config;
mod dimension;
mod error;
mod extract;
mod models;
mod normalize;
mod parser;
mod pipeline;
mod reconcile;
mod report;
mod semester;
mod store;

use config::{LoadArgs, StoreArgs};
use extract::DocumentExtractor;
use models::AnalyticsRow;
use pipeline::Pipeline;
use store::{MemoryWarehouse, Warehouse};

#[derive(Parser)]
#[command(name = "transcript-warehouse")]
#[command(about = "Loads academic transcripts into a dimensional warehouse", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the warehouse schema and seed the grade dimension
    InitDb,
    /// Load every transcript in a folder, then recompute course analytics
    Load(LoadArgs),
    /// Run a load against an in-memory warehouse without touching Postgres
    DryRun(LoadArgs),
    /// Recompute course analytics from all loaded transcripts
    Analyze,
    /// Generate a markdown course analytics report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export course analytics as CSV
    Export {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        command @ Commands::DryRun(_) => dry_run(command).await,
        command => {
            let warehouse = cli.store.connect().await?;
            let result = run(&warehouse, command).await;
            warehouse.close().await;
            result
        }
    }
}

async fn run(warehouse: &dyn Warehouse, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => {
            warehouse.init_schema().await.context("failed to create schema")?;
            println!("Schema ready.");
        }
        Commands::Load(args) | Commands::DryRun(args) => load(warehouse, &args).await?,
        Commands::Analyze => {
            let rows = analytics::recompute(warehouse)
                .await
                .context("course analytics recompute failed")?;
            println!("Recomputed analytics for {rows} course offerings.");
        }
        Commands::Report { out } => {
            let rows = fetch_analytics(warehouse).await?;
            let report = report::build_report(chrono::Utc::now(), &rows);
            std::fs::write(&out, report)
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { csv } => {
            let rows = fetch_analytics(warehouse).await?;
            let file = File::create(&csv)
                .with_context(|| format!("cannot create {}", csv.display()))?;
            report::write_csv(file, &rows)?;
            println!("Exported {} rows to {}.", rows.len(), csv.display());
        }
    }

    Ok(())
}

async fn load(warehouse: &dyn Warehouse, args: &LoadArgs) -> anyhow::Result<()> {
    warehouse.init_schema().await.context("failed to create schema")?;
    let normalizer = args.normalizer()?;
    let mut pipeline = Pipeline::new(warehouse, &DocumentExtractor, normalizer);
    info!(folder = %args.input.display(), "starting transcript processing");
    let stats = pipeline.run_batch(&args.input).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", report::summarize_load(&stats));
    }
    Ok(())
}

/// Runs a load command against a fresh in-memory warehouse and prints what
/// it would have written.
async fn dry_run(command: Commands) -> anyhow::Result<()> {
    let warehouse = MemoryWarehouse::new();
    let result = run(&warehouse, command).await;
    if result.is_ok() {
        let state = warehouse.state()?;
        println!(
            "Dry run warehouse: {} students, {} courses, {} terms, {} facts, {} semester snapshots, {} course analytics.",
            state.students.len(),
            state.courses.len(),
            state.terms.len(),
            state.facts.len(),
            state.snapshots.len(),
            state.analytics.len()
        );
    }
    warehouse.close().await;
    result
}

async fn fetch_analytics(warehouse: &dyn Warehouse) -> anyhow::Result<Vec<AnalyticsRow>> {
    let mut tx = warehouse.begin().await?;
    let rows = tx.analytics_rows().await?;
    tx.commit().await?;
    Ok(rows)
}
