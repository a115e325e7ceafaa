mod api;
mod batching;
mod config;
mod engine;
mod error;
mod models;
mod observability;
mod routing;
mod state;

use std::sync::Arc;

use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::routing::manhattan::ManhattanMatrix;
use crate::routing::matrix::TimeMatrix;
use crate::routing::osrm::OsrmMatrix;

const FALLBACK_SPEED_MPS: f64 = 10.0;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let matrix: Arc<dyn TimeMatrix> = match &config.osrm_base_url {
        Some(url) => {
            tracing::info!(endpoint = %url, "using OSRM travel-time matrix");
            Arc::new(
                OsrmMatrix::new(url)
                    .map_err(|err| error::AppError::Internal(format!("osrm client: {err}")))?,
            )
        }
        None => {
            tracing::warn!("OSRM_BASE_URL unset; falling back to the Manhattan mock matrix");
            Arc::new(ManhattanMatrix::new(FALLBACK_SPEED_MPS))
        }
    };

    let (app_state, order_rx, mut abandoned_rx) = state::AppState::new(
        matrix,
        config.policy()?,
        config.order_queue_size,
        config.event_buffer_size,
    );
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(engine::horizon::run_horizon_engine(
        shared_state.clone(),
        order_rx,
        Duration::from_secs(config.cycle_interval_secs),
    ));

    // stand-in consumer for the external abandon queue
    tokio::spawn(async move {
        while let Some(job) = abandoned_rx.recv().await {
            tracing::warn!(job_id = %job.id, orders = job.order_ids.len(), "job handed to abandon queue");
        }
    });

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
