use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_client::ReqwestFeedSource;
use herald_core::{IngestConfig, IngestService, RefreshScheduler, TracingSchedulerReporter};
use herald_db::{Database, DatabaseConfig};
use herald_server::routes;
use herald_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("herald=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("HERALD_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = IngestConfig::from_env()?;
    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let source = ReqwestFeedSource::with_timeout(config.fetch_timeout)?;
    let state = Arc::new(AppState::new(IngestService::new(
        source.clone(),
        db.feed_store(),
        config.clone(),
    )));

    // The scheduler gets its own service over the same pool.
    let cancel_token = CancellationToken::new();
    let scheduler = RefreshScheduler::new(Arc::new(IngestService::new(
        source,
        db.feed_store(),
        config,
    )));
    let scheduler_token = cancel_token.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler
            .run(scheduler_token, &TracingSchedulerReporter)
            .await
        {
            tracing::error!(error = %e, "Refresh scheduler exited with error");
        }
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    let _ = scheduler_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
