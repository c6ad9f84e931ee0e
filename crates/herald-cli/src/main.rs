use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use herald_client::ReqwestFeedSource;
use herald_core::traits::FeedStore;
use herald_core::{
    FeedCheckOutcome, IngestConfig, IngestService, MemoryStore, RefreshScheduler,
    TracingSchedulerReporter,
};
use herald_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "herald", version, about = "RSS/Atom feed ingestion")]
struct Cli {
    /// Keep everything in memory instead of PostgreSQL
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the `HERALD_*` ingestion settings.
#[derive(Args)]
struct Tuning {
    /// Failed checks tolerated before a feed is deactivated
    #[arg(long, global = true, env = "HERALD_ERROR_LIMIT")]
    error_limit: Option<u32>,

    /// Seconds between two checks of the same feed
    #[arg(long, global = true, env = "HERALD_CHECK_INTERVAL_SECS")]
    check_interval_secs: Option<u64>,

    /// Seconds before a feed fetch is abandoned
    #[arg(long, global = true, env = "HERALD_FETCH_TIMEOUT_SECS")]
    fetch_timeout_secs: Option<u64>,

    /// Feeds refreshed in parallel
    #[arg(long, global = true, env = "HERALD_REFRESH_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Seconds between scheduler polls
    #[arg(long, global = true, env = "HERALD_SCHEDULER_TICK_SECS")]
    tick_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a feed and import its entries
    Add {
        /// Feed URL
        #[arg(short, long)]
        url: String,
    },

    /// Refresh every feed whose next check is due, once
    Refresh,

    /// Keep refreshing due feeds until Ctrl-C
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries JSON results.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("herald=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ingest_config(&cli.tuning)?;

    let source = ReqwestFeedSource::with_timeout(config.fetch_timeout)?.allow_private_urls();

    if cli.dry_run {
        tracing::info!("Dry run: using in-memory store");
        let service = IngestService::new(source, MemoryStore::new(), config);
        run_command(cli.command, service).await
    } else {
        let db = connect_db().await?;
        let service = IngestService::new(source, db.feed_store(), config);
        run_command(cli.command, service).await
    }
}

fn ingest_config(tuning: &Tuning) -> Result<IngestConfig> {
    let mut config = IngestConfig::from_env().context("Invalid HERALD_* configuration")?;

    if let Some(limit) = tuning.error_limit {
        config = config.with_error_limit(limit);
    }
    if let Some(secs) = tuning.check_interval_secs {
        config = config.with_check_interval(Duration::from_secs(secs));
    }
    if let Some(secs) = tuning.fetch_timeout_secs {
        config = config.with_fetch_timeout(Duration::from_secs(secs));
    }
    if let Some(concurrency) = tuning.concurrency {
        config = config.with_refresh_concurrency(concurrency);
    }
    if let Some(secs) = tuning.tick_secs {
        config = config.with_scheduler_tick(Duration::from_secs(secs.max(1)));
    }

    Ok(config)
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()
        .context("DATABASE_URL not set. Use --dry-run to run without a database.")?;

    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;

    Ok(db)
}

async fn run_command<S: FeedStore>(
    command: Commands,
    service: IngestService<ReqwestFeedSource, S>,
) -> Result<()> {
    match command {
        Commands::Add { url } => cmd_add(&url, &service).await,
        Commands::Refresh => cmd_refresh(service).await,
        Commands::Schedule => cmd_schedule(service).await,
    }
}

async fn cmd_add<S: FeedStore>(
    url: &str,
    service: &IngestService<ReqwestFeedSource, S>,
) -> Result<()> {
    let outcome = service.create_feed(url).await?;
    println!("{}", serde_json::to_string_pretty(&outcome_json(&outcome))?);

    if !outcome.is_success() {
        anyhow::bail!("RSS Feed URL is invalid");
    }
    Ok(())
}

async fn cmd_refresh<S: FeedStore>(service: IngestService<ReqwestFeedSource, S>) -> Result<()> {
    let scheduler = RefreshScheduler::new(Arc::new(service));
    let summary = scheduler
        .run_once(Utc::now(), &TracingSchedulerReporter)
        .await?;

    let report = json!({
        "refreshed": summary.refreshed,
        "failed": summary.failed,
        "skipped": summary.skipped,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_schedule<S: FeedStore>(service: IngestService<ReqwestFeedSource, S>) -> Result<()> {
    let cancel_token = CancellationToken::new();

    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing current batch...");
            ctrl_c_token.cancel();
        }
    });

    let scheduler = RefreshScheduler::new(Arc::new(service));
    scheduler.run(cancel_token, &TracingSchedulerReporter).await?;
    Ok(())
}

fn outcome_json(outcome: &FeedCheckOutcome) -> serde_json::Value {
    match outcome {
        FeedCheckOutcome::Created {
            feed,
            entries_added,
        } => json!({
            "outcome": "created",
            "message": "RSS Feed successfully was created",
            "feed": feed,
            "entries_added": entries_added,
        }),
        FeedCheckOutcome::Refreshed {
            feed,
            entries_added,
        } => json!({
            "outcome": "refreshed",
            "feed": feed,
            "entries_added": entries_added,
        }),
        FeedCheckOutcome::Rejected { feed_url, reason } => json!({
            "outcome": "rejected",
            "message": "RSS Feed URL is invalid",
            "feed_url": feed_url,
            "reason": reason.to_string(),
        }),
        FeedCheckOutcome::Failed { feed, reason } => json!({
            "outcome": "failed",
            "feed": feed,
            "reason": reason.to_string(),
        }),
        FeedCheckOutcome::Skipped { feed_id } => json!({
            "outcome": "skipped",
            "feed_id": feed_id,
        }),
    }
}
