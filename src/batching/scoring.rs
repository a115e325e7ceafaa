use std::collections::HashMap;

use tracing::error;

use crate::batching::feasibility::evaluate_insertion;
use crate::batching::policy::BatchingPolicy;
use crate::models::job::{Job, JobInvariantError, JobType};
use crate::models::order::{Order, Stop};
use crate::routing::matrix::TimeMatrix;

/// Grow jobs greedily from a cluster of orders.
///
/// Each pass seeds a job with the oldest remaining order and keeps
/// inserting the most profitable candidate until the batch size cap is hit
/// or nothing passes the detour and savings gates. A lone seed consults the
/// rolling horizon: young orders are deferred to the next cycle, aged ones
/// ship as singles. Orders not in the returned jobs stay unbatched.
///
/// Tie-breaks (oldest `created_at`, then smallest id, and first `(i, j)`
/// inside the insertion search) make the whole pass deterministic.
pub fn score_cluster(
    cluster: &[Order],
    matrix: &dyn TimeMatrix,
    policy: &BatchingPolicy,
    order_age_seconds: &HashMap<String, f64>,
) -> Vec<Job> {
    match run(cluster, matrix, policy, order_age_seconds) {
        Ok(jobs) => jobs,
        Err(err) => {
            // Programmer error: a produced route broke the job invariants.
            // Skip the cluster; its orders stay in the pool for next cycle.
            error!(error = %err, orders = cluster.len(), "invalid job constructed; skipping cluster");
            Vec::new()
        }
    }
}

struct Insertion {
    index: usize,
    stops: Vec<Stop>,
    total_time: f64,
    single_time: f64,
    savings: f64,
}

fn run(
    cluster: &[Order],
    matrix: &dyn TimeMatrix,
    policy: &BatchingPolicy,
    order_age_seconds: &HashMap<String, f64>,
) -> Result<Vec<Job>, JobInvariantError> {
    let mut remaining: Vec<Order> = cluster.to_vec();
    let mut jobs: Vec<Job> = Vec::new();

    while !remaining.is_empty() {
        let seed_idx = oldest_index(&remaining);
        let seed = remaining.remove(seed_idx);

        // An order the matrix cannot price stays unbatched this cycle.
        let Ok(seed_single) = matrix.time(seed.pickup, seed.dropoff) else {
            continue;
        };

        let mut stops = vec![Stop::pickup(&seed), Stop::dropoff(&seed)];
        let mut members = vec![seed];
        let mut baseline_sum_single = seed_single;
        let mut total_time = seed_single;

        while members.len() < policy.max_batch_size && !remaining.is_empty() {
            let mut best: Option<Insertion> = None;

            for (index, candidate) in remaining.iter().enumerate() {
                let Ok(single_time) = matrix.time(candidate.pickup, candidate.dropoff) else {
                    continue;
                };
                let eval = evaluate_insertion(&stops, candidate, matrix);
                if !eval.is_feasible {
                    continue;
                }

                let base = baseline_sum_single + single_time;
                if base <= 0.0 {
                    continue;
                }
                let detour = eval.best_time_seconds / base;
                let savings = base - eval.best_time_seconds;

                let cap = if members.len() + 1 == 2 {
                    policy.pair_detour_cap
                } else {
                    policy.multi_detour_cap
                };
                if detour > cap || savings <= 0.0 {
                    continue;
                }

                let improves = match best.as_ref() {
                    None => true,
                    Some(incumbent) => {
                        if savings != incumbent.savings {
                            savings > incumbent.savings
                        } else {
                            let held = &remaining[incumbent.index];
                            (candidate.created_at, candidate.id.as_str())
                                < (held.created_at, held.id.as_str())
                        }
                    }
                };
                if improves {
                    best = Some(Insertion {
                        index,
                        stops: eval.best_stops,
                        total_time: eval.best_time_seconds,
                        single_time,
                        savings,
                    });
                }
            }

            let Some(winner) = best else { break };
            let order = remaining.remove(winner.index);
            stops = winner.stops;
            total_time = winner.total_time;
            baseline_sum_single += winner.single_time;
            members.push(order);
        }

        if members.len() >= 2 {
            let order_ids = members.iter().map(|o| o.id.clone()).collect();
            let mut job = Job::new(JobType::Batch, order_ids, stops, total_time)?;
            job.eta = Some(total_time);
            job.detour_factor = Some(total_time / baseline_sum_single);
            job.savings_percentage =
                Some((baseline_sum_single - total_time) / baseline_sum_single * 100.0);
            jobs.push(job);
        } else {
            let seed = &members[0];
            let age = order_age_seconds.get(&seed.id).copied().unwrap_or(0.0);
            if policy.enable_rolling_horizon && age < policy.max_wait_time_seconds {
                // defer: no job, the order waits for more material
                continue;
            }
            let mut job = Job::new(JobType::Single, vec![seed.id.clone()], stops, total_time)?;
            job.eta = Some(total_time);
            jobs.push(job);
        }
    }

    Ok(jobs)
}

fn oldest_index(orders: &[Order]) -> usize {
    let mut best = 0;
    for (idx, order) in orders.iter().enumerate().skip(1) {
        let held = &orders[best];
        if (order.created_at, order.id.as_str()) < (held.created_at, held.id.as_str()) {
            best = idx;
        }
    }
    best
}
