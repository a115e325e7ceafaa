use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::{Order, Stop, StopKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Single,
    Batch,
}

/// Lifecycle of a stored job, owned by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Ready,
    Offering,
    Assigned,
    Abandoned,
}

#[derive(Debug, Error)]
pub enum JobInvariantError {
    #[error("job has no orders")]
    EmptyOrders,

    #[error("expected {expected} stops, got {got}")]
    StopCountMismatch { expected: usize, got: usize },

    #[error("order {0} is missing a pickup or dropoff stop")]
    MissingStop(String),

    #[error("order {0} appears more than once")]
    DuplicateStop(String),

    #[error("dropoff precedes pickup for order {0}")]
    DropoffBeforePickup(String),

    #[error("stop references order {0} which is not part of the job")]
    ForeignStop(String),

    #[error("route must start with a pickup and end with a dropoff")]
    BoundaryStop,

    #[error("job type does not match order count")]
    TypeMismatch,
}

/// A routed multi-stop job produced by the batching engine.
///
/// Immutable after construction; the dispatcher holds jobs by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: JobType,
    pub order_ids: Vec<String>,
    pub stops: Vec<Stop>,
    pub total_time_seconds: f64,
    pub eta: Option<f64>,
    pub detour_factor: Option<f64>,
    pub savings_percentage: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Validating constructor. Construction fails loudly on any violation
    /// of the pickup-before-dropoff route invariants; callers skip the
    /// offending cluster and leave its orders in the pool.
    pub fn new(
        job_type: JobType,
        order_ids: Vec<String>,
        stops: Vec<Stop>,
        total_time_seconds: f64,
    ) -> Result<Self, JobInvariantError> {
        if order_ids.is_empty() {
            return Err(JobInvariantError::EmptyOrders);
        }

        let single = order_ids.len() == 1;
        if (job_type == JobType::Single) != single {
            return Err(JobInvariantError::TypeMismatch);
        }

        if stops.len() != 2 * order_ids.len() {
            return Err(JobInvariantError::StopCountMismatch {
                expected: 2 * order_ids.len(),
                got: stops.len(),
            });
        }

        let mut pickup_at: HashMap<&str, usize> = HashMap::new();
        let mut dropoff_at: HashMap<&str, usize> = HashMap::new();
        for (idx, stop) in stops.iter().enumerate() {
            if !order_ids.iter().any(|id| id == &stop.order_id) {
                return Err(JobInvariantError::ForeignStop(stop.order_id.clone()));
            }
            let slot = match stop.kind {
                StopKind::Pickup => &mut pickup_at,
                StopKind::Dropoff => &mut dropoff_at,
            };
            if slot.insert(stop.order_id.as_str(), idx).is_some() {
                return Err(JobInvariantError::DuplicateStop(stop.order_id.clone()));
            }
        }

        for id in &order_ids {
            let (Some(p), Some(d)) = (pickup_at.get(id.as_str()), dropoff_at.get(id.as_str()))
            else {
                return Err(JobInvariantError::MissingStop(id.clone()));
            };
            if p > d {
                return Err(JobInvariantError::DropoffBeforePickup(id.clone()));
            }
        }

        let starts_with_pickup = stops.first().map(|s| s.kind) == Some(StopKind::Pickup);
        let ends_with_dropoff = stops.last().map(|s| s.kind) == Some(StopKind::Dropoff);
        if !starts_with_pickup || !ends_with_dropoff {
            return Err(JobInvariantError::BoundaryStop);
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            order_ids,
            stops,
            total_time_seconds,
            eta: None,
            detour_factor: None,
            savings_percentage: None,
            created_at: Utc::now(),
        })
    }
}

/// Output of one batching run. `jobs` and `unbatched_orders` partition the
/// input pool: every input order appears in exactly one of the two sides.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub jobs: Vec<Job>,
    pub unbatched_orders: Vec<Order>,
}

/// A job plus its dispatch bookkeeping, as stored in `AppState.jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: Job,
    pub status: JobStatus,
    pub assigned_driver: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn ready(job: Job) -> Self {
        Self {
            job,
            status: JobStatus::Ready,
            assigned_driver: None,
            assigned_at: None,
        }
    }
}
