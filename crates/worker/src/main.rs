use std::time::Duration;

use courier_common::config::AppConfig;
use courier_common::db;
use courier_worker::dispatch::DispatchEngine;
use courier_worker::transport::PostmarkTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_worker=info,courier_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Courier dispatch worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let transport = PostmarkTransport::new(
        config.postmark_api_url.clone(),
        config.postmark_server_token.clone().unwrap_or_default(),
        config.transport_timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("failed to build transport: {}", e))?;

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let engine = DispatchEngine::new(pool, transport, config.clone());

    tracing::info!(
        batch_size = config.batch_size,
        poll_interval_ms = config.poll_interval_ms,
        delivery_mode = %config.delivery_mode,
        dry_run = config.dry_run,
        "Dispatch worker started"
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = run_passes(&engine, poll_interval) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Dispatch worker exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Courier dispatch worker stopped.");
    Ok(())
}

/// Run one pass per poll interval, forever.
///
/// A pass that fails at the claim step leaves no partial state; log it and
/// try again on the next tick rather than tearing the worker down.
async fn run_passes<T: courier_worker::transport::Transport>(
    engine: &DispatchEngine<T>,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    loop {
        match engine.run_pass().await {
            Ok(summary) if summary.processed > 0 => {
                tracing::debug!(processed = summary.processed, "Pass finished");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Dispatch pass failed");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
