use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::Job;
use crate::models::order::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    Available,
    TransitToCollect,
    TransitToDropoff,
    Paused,
    Offline,
}

/// Snapshot of a driver at a point in time. The core never mutates drivers
/// in place; updates produce a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub location: Coord,
    pub status: DriverStatus,
    pub max_capacity: u32,
    pub push_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Applies an accepted job to a driver: capacity shrinks by the job's order
/// count and the driver heads to collect. Pure; the caller persists the
/// returned value.
pub fn handle_driver_acceptance(driver: &Driver, job: &Job) -> Driver {
    Driver {
        id: driver.id.clone(),
        location: driver.location,
        status: DriverStatus::TransitToCollect,
        max_capacity: driver
            .max_capacity
            .saturating_sub(job.order_ids.len() as u32),
        push_token: driver.push_token.clone(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobType;
    use crate::models::order::{Stop, StopKind};

    fn job_with_orders(n: usize) -> Job {
        let order_ids: Vec<String> = (0..n).map(|i| format!("o{i}")).collect();
        let mut stops = Vec::new();
        for id in &order_ids {
            stops.push(Stop {
                kind: StopKind::Pickup,
                order_id: id.clone(),
                coord: Coord::new(0.0, 0.0),
            });
        }
        for id in &order_ids {
            stops.push(Stop {
                kind: StopKind::Dropoff,
                order_id: id.clone(),
                coord: Coord::new(0.01, 0.0),
            });
        }
        let job_type = if n == 1 { JobType::Single } else { JobType::Batch };
        Job::new(job_type, order_ids, stops, 100.0).unwrap()
    }

    fn driver(capacity: u32) -> Driver {
        Driver {
            id: "d1".to_string(),
            location: Coord::new(13.40, 52.52),
            status: DriverStatus::Available,
            max_capacity: capacity,
            push_token: Some("token".to_string()),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn acceptance_decrements_capacity_by_order_count() {
        let before = driver(3);
        let after = handle_driver_acceptance(&before, &job_with_orders(2));

        assert_eq!(after.max_capacity, 1);
        assert_eq!(after.status, DriverStatus::TransitToCollect);
        // input untouched
        assert_eq!(before.max_capacity, 3);
        assert_eq!(before.status, DriverStatus::Available);
    }

    #[test]
    fn acceptance_saturates_at_zero_capacity() {
        let after = handle_driver_acceptance(&driver(1), &job_with_orders(2));
        assert_eq!(after.max_capacity, 0);
    }
}
