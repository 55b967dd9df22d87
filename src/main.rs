//! `FlowSplit` entry point: one sweep of the ingestion loop, then
//! automatic allocation of whatever income arrived.

use dotenvy::dotenv;
use flowsplit::config;
use flowsplit::core::{connection, rule, sync};
use flowsplit::errors::{Error, Result};
use flowsplit::feed::replay::ReplayFeed;
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::app::load_default_config()
        .inspect_err(|e| error!("Failed to load application configuration: {e}"))?;

    // 4. Initialize the database
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    config::database::create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {e}"))?;

    // 5. Seed configured connections and rules (existing rows untouched)
    let seeded = connection::seed_connections(&db, &app_config.connections).await?;
    if seeded > 0 {
        info!(count = seeded, "seeded connections");
    }
    let seeded = rule::seed_rules(&db, &app_config.rules).await?;
    if seeded > 0 {
        info!(count = seeded, "seeded allocation rules");
    }

    // 6. Build the feed. FEED_FILE overrides the config.toml setting.
    let feed_file = env::var("FEED_FILE")
        .ok()
        .or_else(|| app_config.feed_file.clone())
        .ok_or_else(|| Error::Config {
            message: "No feed configured: set feed_file in config.toml or FEED_FILE".to_string(),
        })?;
    let feed = ReplayFeed::from_file(&feed_file)
        .inspect_err(|e| error!("Failed to load feed script '{feed_file}': {e}"))?;

    // 7. Run the sweep
    let report = sync::sync_and_allocate(&db, &feed, app_config.auto_allocate).await?;

    info!(
        connections = report.sync.connections_processed,
        succeeded = report.sync.connections_succeeded,
        failed = report.sync.connections_failed,
        added = report.sync.added,
        modified = report.sync.modified,
        removed = report.sync.removed,
        allocated = report.allocations_created,
        skipped = report.allocations_skipped,
        allocation_failures = report.allocation_failures,
        "sweep finished"
    );
    for failure in &report.sync.failures {
        warn!(
            connection_id = %failure.connection_id,
            error = %failure.message,
            "connection left for retry on next run"
        );
    }

    Ok(())
}
