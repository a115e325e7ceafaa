use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::job::Job;
use crate::models::order::Coord;

pub const OFFER_TYPE: &str = "NEW_JOB_OFFER";

/// Payload pushed to drivers when a job is offered to a wave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOffer {
    #[serde(rename = "type")]
    pub kind: String,
    pub job_id: String,
    pub num_orders: usize,
    pub pickup_coord: Coord,
    pub driver_ids: Vec<String>,
}

/// Transport seam for offer notifications. The concrete device-token
/// delivery (FCM/APNS) lives outside the core.
pub trait PushService: Send + Sync {
    fn broadcast_offer(&self, driver_ids: &[String], job: &Job);
}

/// Publishes offers on the process-wide broadcast channel; the websocket
/// endpoint streams them to connected driver clients.
pub struct BroadcastPush {
    tx: broadcast::Sender<JobOffer>,
}

impl BroadcastPush {
    pub fn new(tx: broadcast::Sender<JobOffer>) -> Self {
        Self { tx }
    }
}

impl PushService for BroadcastPush {
    fn broadcast_offer(&self, driver_ids: &[String], job: &Job) {
        let Some(first_stop) = job.stops.first() else {
            return;
        };
        let offer = JobOffer {
            kind: OFFER_TYPE.to_string(),
            job_id: job.id.clone(),
            num_orders: job.order_ids.len(),
            pickup_coord: first_stop.coord,
            driver_ids: driver_ids.to_vec(),
        };
        if self.tx.send(offer).is_err() {
            debug!(job_id = %job.id, "no push subscribers connected");
        }
    }
}
