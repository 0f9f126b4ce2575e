//! # Herald Publisher
//!
//! Hosts the publish worker pool next to a small Actix-web API for
//! scheduling posts, triggering them manually and reading queue stats.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

use herald_infra::WorkerPool;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env()?;

    tracing::info!(
        "Starting Herald publisher on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::build(&config).await?;

    let workers = WorkerPool::new(state.runner.clone(), config.pipeline.workers.clone()).start();

    #[cfg(feature = "scheduler")]
    let monitor = background::QueueMonitor::start(state.runner.queue().clone(), &config.monitor_cron)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start queue monitor: {e:?}"))?;

    let server_state = state.clone();
    // Returns once SIGINT/SIGTERM has stopped the server.
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(server_state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    tracing::info!("HTTP server stopped, draining workers");
    workers.shutdown().await;

    #[cfg(feature = "scheduler")]
    if let Err(e) = monitor.shutdown().await {
        tracing::warn!(error = ?e, "Queue monitor did not stop cleanly");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
