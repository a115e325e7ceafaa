use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::horizon::submit_order;
use crate::error::AppError;
use crate::models::order::{Coord, Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/webhook", post(order_webhook))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

#[derive(Deserialize)]
pub struct OrderWebhookRequest {
    pub order_id: String,
    pub restaurant_id: String,
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub dropoff_lat: f64,
    pub dropoff_lon: f64,
    pub created_at: DateTime<Utc>,
}

async fn order_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderWebhookRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.order_id.trim().is_empty() {
        return Err(AppError::BadRequest("order_id cannot be empty".to_string()));
    }

    let pickup = Coord::new(payload.pickup_lon, payload.pickup_lat);
    let dropoff = Coord::new(payload.dropoff_lon, payload.dropoff_lat);
    if !pickup.is_finite() || !dropoff.is_finite() {
        return Err(AppError::BadRequest(
            "coordinates must be finite numbers".to_string(),
        ));
    }
    if pickup == dropoff {
        return Err(AppError::BadRequest(
            "pickup and dropoff must differ".to_string(),
        ));
    }

    if state.orders.contains_key(&payload.order_id) {
        return Err(AppError::Conflict(format!(
            "order {} already received",
            payload.order_id
        )));
    }

    let order = Order {
        id: payload.order_id,
        pickup_id: payload.restaurant_id,
        pickup,
        dropoff,
        created_at: payload.created_at,
        status: OrderStatus::Raw,
    };

    state.orders.insert(order.id.clone(), order.clone());
    submit_order(&state, order.clone()).await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

    Ok(Json(order.value().clone()))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    if !state.orders.contains_key(&id) {
        return Err(AppError::NotFound(format!("order {} not found", id)));
    }

    let evicted = {
        let mut horizon = state.horizon.lock().expect("horizon lock poisoned");
        horizon.cancel(&id)
    };
    let Some(cancelled) = evicted else {
        // already batched into a job; cancellation belongs downstream now
        return Err(AppError::Conflict(format!(
            "order {} has already been dispatched",
            id
        )));
    };

    state.orders.insert(cancelled.id.clone(), cancelled.clone());
    Ok(Json(cancelled))
}
