use tracing::warn;

use crate::batching::policy::BatchingPolicy;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::job::Job;
use crate::models::order::Coord;
use crate::routing::matrix::TimeMatrix;

/// Order eligible drivers into `wave_count` buckets of `wave_size`,
/// closest to the job's first pickup first.
///
/// Eligibility: status Available or TransitToCollect, and capacity for the
/// job's order count. Ranking uses matrix travel time from the driver's
/// location to the first stop; ties go to the smaller driver id. Drivers
/// whose travel time cannot be priced are left out of this dispatch.
/// Trailing waves are padded with empty lists.
pub fn build_driver_waves(
    job: &Job,
    online_drivers: &[Driver],
    matrix: &dyn TimeMatrix,
    policy: &BatchingPolicy,
) -> Vec<Vec<String>> {
    let mut waves = vec![Vec::new(); policy.wave_count];

    let Some(first_stop) = job.stops.first() else {
        return waves;
    };
    let pickup = first_stop.coord;
    let required_capacity = job.order_ids.len() as u32;

    let eligible: Vec<&Driver> = online_drivers
        .iter()
        .filter(|d| {
            matches!(
                d.status,
                DriverStatus::Available | DriverStatus::TransitToCollect
            ) && d.max_capacity >= required_capacity
        })
        .collect();
    if eligible.is_empty() {
        return waves;
    }

    let mut coords: Vec<Coord> = eligible.iter().map(|d| d.location).collect();
    coords.push(pickup);
    if let Err(err) = matrix.prefetch(&coords) {
        warn!(error = %err, job_id = %job.id, "driver wave prefetch failed");
    }

    let mut ranked: Vec<(f64, &Driver)> = eligible
        .iter()
        .filter_map(|d| {
            matrix
                .time(d.location, pickup)
                .ok()
                .map(|seconds| (seconds, *d))
        })
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

    for (slot, chunk) in ranked
        .chunks(policy.wave_size)
        .take(policy.wave_count)
        .enumerate()
    {
        waves[slot] = chunk.iter().map(|(_, d)| d.id.clone()).collect();
    }

    waves
}
