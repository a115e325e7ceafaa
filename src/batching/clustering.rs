use std::collections::{HashMap, HashSet};

use crate::batching::policy::BatchingPolicy;
use crate::models::order::Order;

/// Partition a pool into candidate groups for batching.
///
/// With continuous chaining the whole pool forms one group and the
/// insertion loop decides what travels well together. Otherwise orders are
/// grouped by `pickup_id` in first-seen order, insertion order preserved
/// within each group. No cross-cluster batching happens downstream.
pub fn build_clusters(pool: &[Order], policy: &BatchingPolicy) -> Vec<Vec<Order>> {
    if pool.is_empty() {
        return Vec::new();
    }

    if policy.enable_continuous_chaining {
        return vec![cap_cluster(pool.to_vec(), policy.max_cluster_candidates)];
    }

    let mut keys: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<Order>> = HashMap::new();
    for order in pool {
        let group = groups.entry(order.pickup_id.as_str()).or_default();
        if group.is_empty() {
            keys.push(order.pickup_id.as_str());
        }
        group.push(order.clone());
    }

    keys.into_iter()
        .map(|key| cap_cluster(groups.remove(key).unwrap_or_default(), policy.max_cluster_candidates))
        .collect()
}

/// Keep the `cap` oldest orders of an oversized cluster, preserving their
/// relative order. Capped-out orders stay in the pool for the next cycle.
fn cap_cluster(orders: Vec<Order>, cap: usize) -> Vec<Order> {
    if orders.len() <= cap {
        return orders;
    }

    let mut ranked: Vec<usize> = (0..orders.len()).collect();
    ranked.sort_by(|&a, &b| {
        orders[a]
            .created_at
            .cmp(&orders[b].created_at)
            .then_with(|| orders[a].id.cmp(&orders[b].id))
    });
    let keep: HashSet<usize> = ranked.into_iter().take(cap).collect();

    orders
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, order)| order)
        .collect()
}
