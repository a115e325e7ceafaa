use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::order::Coord;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(register_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/location", patch(update_driver_location))
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub driver_id: String,
    pub lat: f64,
    pub lon: f64,
    pub max_capacity: u32,
    pub push_token: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lon: f64,
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.driver_id.trim().is_empty() {
        return Err(AppError::BadRequest("driver_id cannot be empty".to_string()));
    }
    if payload.max_capacity == 0 {
        return Err(AppError::BadRequest("max_capacity must be > 0".to_string()));
    }
    let location = Coord::new(payload.lon, payload.lat);
    if !location.is_finite() {
        return Err(AppError::BadRequest(
            "coordinates must be finite numbers".to_string(),
        ));
    }
    if state.drivers.contains_key(&payload.driver_id) {
        return Err(AppError::Conflict(format!(
            "driver {} already registered",
            payload.driver_id
        )));
    }

    let driver = Driver {
        id: payload.driver_id,
        location,
        status: DriverStatus::Available,
        max_capacity: payload.max_capacity,
        push_token: payload.push_token,
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.id.clone(), driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn update_driver_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.status = payload.status;
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let location = Coord::new(payload.lon, payload.lat);
    if !location.is_finite() {
        return Err(AppError::BadRequest(
            "coordinates must be finite numbers".to_string(),
        ));
    }

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {} not found", id)))?;

    driver.location = location;
    driver.updated_at = Utc::now();

    Ok(Json(driver.clone()))
}
