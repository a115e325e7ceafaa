use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::batching::engine::batch_orders;
use crate::batching::policy::BatchingPolicy;
use crate::engine::dispatcher::dispatch_job;
use crate::error::AppError;
use crate::models::job::{Job, JobRecord, JobType};
use crate::models::order::{Order, OrderStatus};
use crate::routing::matrix::TimeMatrix;
use crate::state::AppState;

/// Time-aware holding area for orders awaiting batching.
///
/// Young orders are deliberately held back so the batcher has more material
/// to combine; the scoring loop guarantees nothing waits past
/// `max_wait_time_seconds`. The queue itself is stateless between ticks —
/// durability belongs to the external store.
#[derive(Debug, Default)]
pub struct RollingHorizonQueue {
    pool: Vec<Order>,
    ids: HashSet<String>,
}

impl RollingHorizonQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent by order id: re-submitting a held order is a no-op.
    pub fn enqueue_raw(&mut self, mut order: Order) -> bool {
        if !self.ids.insert(order.id.clone()) {
            return false;
        }
        order.status = OrderStatus::Raw;
        self.pool.push(order);
        true
    }

    /// Remove a cancelled order from the pool before it gets batched.
    pub fn cancel(&mut self, order_id: &str) -> Option<Order> {
        let idx = self.pool.iter().position(|o| o.id == order_id)?;
        self.ids.remove(order_id);
        let mut order = self.pool.remove(idx);
        order.status = OrderStatus::Cancelled;
        Some(order)
    }

    /// Run one batching cycle over the held pool. Orders that land in jobs
    /// leave the pool; deferred orders stay for the next tick.
    pub fn run_cycle(
        &mut self,
        now: DateTime<Utc>,
        matrix: &dyn TimeMatrix,
        policy: &BatchingPolicy,
    ) -> Vec<Job> {
        if self.pool.is_empty() {
            return Vec::new();
        }

        for order in &mut self.pool {
            order.status = OrderStatus::Batching;
        }

        let ages: HashMap<String, f64> = self
            .pool
            .iter()
            .map(|o| {
                let age = (now - o.created_at).num_milliseconds() as f64 / 1000.0;
                (o.id.clone(), age.max(0.0))
            })
            .collect();

        let result = batch_orders(&self.pool, matrix, policy, &ages);

        self.pool = result.unbatched_orders;
        self.ids = self.pool.iter().map(|o| o.id.clone()).collect();

        result.jobs
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Ids of the orders still waiting in the pool.
    pub fn held_ids(&self) -> Vec<String> {
        self.pool.iter().map(|o| o.id.clone()).collect()
    }
}

/// Hand a freshly persisted order to the horizon engine.
pub async fn submit_order(state: &AppState, order: Order) -> Result<(), AppError> {
    state
        .order_tx
        .send(order)
        .await
        .map_err(|err| AppError::Internal(format!("order queue send failed: {err}")))
}

/// Long-running owner of the horizon queue: absorbs incoming orders and
/// runs one batching cycle per tick, spawning a dispatcher task per job.
pub async fn run_horizon_engine(
    state: Arc<AppState>,
    mut order_rx: mpsc::Receiver<Order>,
    cycle_interval: Duration,
) {
    info!(interval_secs = cycle_interval.as_secs(), "horizon engine started");

    let mut tick = interval(cycle_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick of `interval` fires immediately; skip it
    tick.tick().await;

    loop {
        tokio::select! {
            received = order_rx.recv() => {
                match received {
                    Some(order) => {
                        let pool_len = {
                            let mut horizon = state.horizon.lock().expect("horizon lock poisoned");
                            horizon.enqueue_raw(order);
                            horizon.len()
                        };
                        state.metrics.orders_in_pool.set(pool_len as i64);
                    }
                    None => {
                        warn!("horizon engine stopped: order channel closed");
                        break;
                    }
                }
            }
            _ = tick.tick() => {
                run_cycle_once(&state).await;
            }
        }
    }
}

/// Execute a single horizon cycle: batch the pool, persist job records,
/// mark member orders ready and start one dispatcher per job. Exposed so
/// tests can drive cycles deterministically.
pub async fn run_cycle_once(state: &Arc<AppState>) -> Vec<Job> {
    let started = Instant::now();
    let policy = state.current_policy();

    let cycle_state = state.clone();
    let cycle_policy = policy.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut horizon = cycle_state.horizon.lock().expect("horizon lock poisoned");
        horizon.run_cycle(Utc::now(), cycle_state.matrix.as_ref(), &cycle_policy)
    })
    .await;

    let jobs = match outcome {
        Ok(jobs) => jobs,
        Err(err) => {
            error!(error = %err, "batching cycle panicked");
            return Vec::new();
        }
    };

    let held = {
        let horizon = state.horizon.lock().expect("horizon lock poisoned");
        horizon.held_ids()
    };
    for order_id in &held {
        if let Some(mut order) = state.orders.get_mut(order_id) {
            order.status = OrderStatus::Batching;
        }
    }
    state.metrics.orders_in_pool.set(held.len() as i64);
    state.metrics.batch_cycles_total.inc();
    state
        .metrics
        .batch_cycle_seconds
        .observe(started.elapsed().as_secs_f64());

    for job in &jobs {
        for order_id in &job.order_ids {
            if let Some(mut order) = state.orders.get_mut(order_id) {
                order.status = OrderStatus::Ready;
            }
        }

        let type_label = match job.job_type {
            JobType::Single => "single",
            JobType::Batch => "batch",
        };
        state
            .metrics
            .jobs_emitted_total
            .with_label_values(&[type_label])
            .inc();

        state
            .jobs
            .insert(job.id.clone(), JobRecord::ready(job.clone()));

        info!(
            job_id = %job.id,
            orders = job.order_ids.len(),
            total_time_seconds = job.total_time_seconds,
            "job ready for dispatch"
        );

        tokio::spawn(dispatch_job(state.clone(), job.clone()));
    }

    jobs
}
