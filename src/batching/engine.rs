use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::batching::clustering::build_clusters;
use crate::batching::policy::BatchingPolicy;
use crate::batching::scoring::score_cluster;
use crate::models::job::BatchResult;
use crate::models::order::{Coord, Order};
use crate::routing::matrix::TimeMatrix;

/// Sole entry point of the batching pipeline: cluster the pool, bulk
/// prefetch each cluster's coordinates, then run the greedy insertion loop
/// per cluster.
///
/// Pure with respect to its inputs and deterministic: equal pools, policy
/// and matrix produce structurally equal results. `unbatched_orders`
/// preserves the insertion order of the input pool.
pub fn batch_orders(
    pool: &[Order],
    matrix: &dyn TimeMatrix,
    policy: &BatchingPolicy,
    order_age_seconds: &HashMap<String, f64>,
) -> BatchResult {
    if pool.is_empty() {
        return BatchResult::default();
    }

    let clusters = build_clusters(pool, policy);

    let mut jobs = Vec::new();
    for cluster in &clusters {
        if cluster.is_empty() {
            continue;
        }

        let coords = distinct_coords(cluster);
        if let Err(err) = matrix.prefetch(&coords) {
            // scoring degrades per pair; affected orders retry next cycle
            warn!(error = %err, coords = coords.len(), "matrix prefetch failed");
        }

        jobs.extend(score_cluster(cluster, matrix, policy, order_age_seconds));
    }

    let used: HashSet<&str> = jobs
        .iter()
        .flat_map(|job| job.order_ids.iter().map(String::as_str))
        .collect();
    let unbatched_orders = pool
        .iter()
        .filter(|order| !used.contains(order.id.as_str()))
        .cloned()
        .collect();

    BatchResult {
        jobs,
        unbatched_orders,
    }
}

fn distinct_coords(cluster: &[Order]) -> Vec<Coord> {
    let mut seen = HashSet::new();
    let mut coords = Vec::with_capacity(cluster.len() * 2);
    for order in cluster {
        if seen.insert(order.pickup) {
            coords.push(order.pickup);
        }
        if seen.insert(order.dropoff) {
            coords.push(order.dropoff);
        }
    }
    coords
}
