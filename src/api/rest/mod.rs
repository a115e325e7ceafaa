pub mod drivers;
pub mod jobs;
pub mod orders;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::policy_by_name;
use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(orders::router())
        .merge(drivers::router())
        .merge(jobs::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/policy", put(swap_policy))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orders: usize,
    drivers: usize,
    jobs: usize,
    pool: usize,
    live_jobs: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pool = state.horizon.lock().expect("horizon lock poisoned").len();
    Json(HealthResponse {
        status: "ok",
        orders: state.orders.len(),
        drivers: state.drivers.len(),
        jobs: state.jobs.len(),
        pool,
        live_jobs: state.live_jobs.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

#[derive(Deserialize)]
struct SwapPolicyRequest {
    name: String,
}

/// Hot-swap the batching policy; the new one takes effect at the next
/// cycle boundary.
async fn swap_policy(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SwapPolicyRequest>,
) -> Result<StatusCode, AppError> {
    let policy = policy_by_name(&payload.name)
        .map_err(|_| AppError::BadRequest(format!("unknown policy: {}", payload.name)))?;
    state.swap_policy(policy);
    info!(policy = %payload.name, "batching policy swapped");
    Ok(StatusCode::NO_CONTENT)
}
