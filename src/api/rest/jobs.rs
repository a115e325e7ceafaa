use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::engine::dispatcher::resolve_driver_acceptance;
use crate::error::AppError;
use crate::models::job::{Job, JobRecord};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/accept", post(accept_job))
}

#[derive(Deserialize)]
pub struct AcceptJobRequest {
    pub driver_id: String,
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<JobRecord>> {
    let jobs = state
        .jobs
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(jobs)
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    let record = state
        .jobs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", id)))?;

    Ok(Json(record.value().clone()))
}

async fn accept_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AcceptJobRequest>,
) -> Result<Json<Job>, AppError> {
    let job = resolve_driver_acceptance(&state, &id, &payload.driver_id)?;
    Ok(Json(job))
}
