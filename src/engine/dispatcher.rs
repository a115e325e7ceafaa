use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, warn};

use crate::engine::selection::build_driver_waves;
use crate::error::AppError;
use crate::models::driver::handle_driver_acceptance;
use crate::models::job::{Job, JobStatus};
use crate::models::order::OrderStatus;
use crate::state::AppState;

/// Wakes the dispatcher task of one live job when its acceptance commits.
#[derive(Debug, Default)]
pub struct LiveJob {
    pub notify: Notify,
}

/// Per-job offer loop: Pending -> Offering(k) -> Assigned | Abandoned.
///
/// Publishes the job to driver waves with `wave_interval_ms` between them,
/// then waits out the remainder of `acceptance_deadline_ms`. Acceptance
/// arrives only through `resolve_driver_acceptance`, which settles the job
/// lock and wakes this task; cancellation is cooperative. An unanswered
/// deadline settles the lock as abandoned and hands the job to the abandon
/// queue.
pub async fn dispatch_job(state: Arc<AppState>, job: Job) {
    let policy = state.current_policy();

    let drivers: Vec<_> = state.drivers.iter().map(|e| e.value().clone()).collect();
    let wave_job = job.clone();
    let wave_state = state.clone();
    let wave_policy = policy.clone();
    let waves = match tokio::task::spawn_blocking(move || {
        build_driver_waves(&wave_job, &drivers, wave_state.matrix.as_ref(), &wave_policy)
    })
    .await
    {
        Ok(waves) => waves,
        Err(err) => {
            error!(job_id = %job.id, error = %err, "driver wave construction panicked");
            return;
        }
    };

    let live = Arc::new(LiveJob::default());
    state.live_jobs.insert(job.id.clone(), live.clone());
    if let Some(mut record) = state.jobs.get_mut(&job.id) {
        record.status = JobStatus::Offering;
    }

    info!(
        job_id = %job.id,
        populated_waves = waves.iter().filter(|w| !w.is_empty()).count(),
        "dispatch started"
    );

    let deadline = Duration::from_millis(policy.acceptance_deadline_ms);
    let offering = async {
        for (k, wave) in waves.iter().enumerate() {
            if state.lock.is_settled(&job.id) {
                return;
            }
            if !wave.is_empty() {
                state.push.broadcast_offer(wave, &job);
                state.metrics.offers_sent_total.inc_by(wave.len() as u64);
                info!(job_id = %job.id, wave = k, drivers = wave.len(), "offer wave published");
            }
            tokio::select! {
                _ = live.notify.notified() => return,
                _ = sleep(Duration::from_millis(policy.wave_interval_ms)) => {}
            }
        }
        // all waves out; hold the job open until the deadline
        live.notify.notified().await;
    };

    let timed_out = timeout(deadline, offering).await.is_err();

    if timed_out && state.lock.try_abandon(&job.id) {
        if let Some(mut record) = state.jobs.get_mut(&job.id) {
            record.status = JobStatus::Abandoned;
        }
        state.metrics.jobs_abandoned_total.inc();
        if state.abandoned_tx.send(job.clone()).is_err() {
            warn!(job_id = %job.id, "abandon queue receiver dropped");
        }
        warn!(job_id = %job.id, "job abandoned: acceptance deadline elapsed");
    }

    state.live_jobs.remove(&job.id);
}

/// The only way a job leaves Offering. Returns the accepted job to the
/// winning driver; every concurrent loser gets `AcceptanceLost` (409).
pub fn resolve_driver_acceptance(
    state: &AppState,
    job_id: &str,
    driver_id: &str,
) -> Result<Job, AppError> {
    let Some(record) = state.jobs.get(job_id).map(|r| r.value().clone()) else {
        return Err(AppError::NotFound(format!("job {job_id} not found")));
    };
    if !state.drivers.contains_key(driver_id) {
        return Err(AppError::NotFound(format!("driver {driver_id} not found")));
    }

    if !state.lock.try_claim(job_id, driver_id) {
        state
            .metrics
            .acceptances_total
            .with_label_values(&["lost"])
            .inc();
        return Err(AppError::AcceptanceLost(job_id.to_string()));
    }

    let now = Utc::now();
    if let Some(mut stored) = state.jobs.get_mut(job_id) {
        stored.status = JobStatus::Assigned;
        stored.assigned_driver = Some(driver_id.to_string());
        stored.assigned_at = Some(now);
    }
    for order_id in &record.job.order_ids {
        if let Some(mut order) = state.orders.get_mut(order_id) {
            order.status = OrderStatus::Assigned;
        }
    }
    if let Some(driver) = state.drivers.get(driver_id).map(|d| d.value().clone()) {
        let updated = handle_driver_acceptance(&driver, &record.job);
        state.drivers.insert(driver_id.to_string(), updated);
    }
    if let Some(live) = state.live_jobs.get(job_id) {
        live.notify.notify_one();
    }

    state
        .metrics
        .acceptances_total
        .with_label_values(&["won"])
        .inc();
    info!(job_id, driver_id, "job assigned");

    Ok(record.job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batching::policy::{default_policy, BatchingPolicy};
    use crate::models::driver::{Driver, DriverStatus};
    use crate::models::job::{JobRecord, JobType};
    use crate::models::order::{Coord, Order, Stop};
    use crate::routing::manhattan::ManhattanMatrix;
    use crate::state::AppState;

    const DEG: f64 = 1.0 / 111_320.0;

    fn test_policy() -> BatchingPolicy {
        BatchingPolicy {
            wave_size: 2,
            wave_count: 3,
            wave_interval_ms: 20,
            acceptance_deadline_ms: 200,
            ..default_policy()
        }
    }

    fn test_state(policy: BatchingPolicy) -> (Arc<AppState>, tokio::sync::mpsc::UnboundedReceiver<Job>) {
        let matrix = Arc::new(ManhattanMatrix::new(10.0));
        let (state, _order_rx, abandoned_rx) = AppState::new(matrix, policy, 64, 64);
        (Arc::new(state), abandoned_rx)
    }

    fn seed_job(state: &AppState) -> Job {
        let order = Order {
            id: "o1".to_string(),
            pickup_id: "m1".to_string(),
            pickup: Coord::new(0.0, 0.0),
            dropoff: Coord::new(2000.0 * DEG, 0.0),
            created_at: Utc::now(),
            status: OrderStatus::Ready,
        };
        state.orders.insert(order.id.clone(), order.clone());

        let stops = vec![Stop::pickup(&order), Stop::dropoff(&order)];
        let job = Job::new(JobType::Single, vec![order.id], stops, 200.0).unwrap();
        state.jobs.insert(job.id.clone(), JobRecord::ready(job.clone()));
        job
    }

    fn seed_driver(state: &AppState, id: &str, distance_m: f64) {
        let driver = Driver {
            id: id.to_string(),
            location: Coord::new(distance_m * DEG, 0.0),
            status: DriverStatus::Available,
            max_capacity: 3,
            push_token: None,
            updated_at: Utc::now(),
        };
        state.drivers.insert(driver.id.clone(), driver);
    }

    #[tokio::test]
    async fn acceptance_stops_the_wave_loop_and_assigns() {
        let (state, _abandoned_rx) = test_state(test_policy());
        seed_driver(&state, "d1", 100.0);
        seed_driver(&state, "d2", 200.0);
        let job = seed_job(&state);

        let mut offers = state.offer_events_tx.subscribe();
        let task = tokio::spawn(dispatch_job(state.clone(), job.clone()));

        let offer = offers.recv().await.unwrap();
        assert_eq!(offer.job_id, job.id);

        let accepted = resolve_driver_acceptance(&state, &job.id, "d1").unwrap();
        assert_eq!(accepted.id, job.id);

        task.await.unwrap();

        let record = state.jobs.get(&job.id).unwrap().value().clone();
        assert_eq!(record.status, JobStatus::Assigned);
        assert_eq!(record.assigned_driver, Some("d1".to_string()));
        assert_eq!(
            state.orders.get("o1").unwrap().status,
            OrderStatus::Assigned
        );
        // capacity shrank by the job's order count
        assert_eq!(state.drivers.get("d1").unwrap().max_capacity, 2);
    }

    #[tokio::test]
    async fn losing_driver_gets_acceptance_lost() {
        let (state, _abandoned_rx) = test_state(test_policy());
        seed_driver(&state, "d1", 100.0);
        seed_driver(&state, "d2", 200.0);
        let job = seed_job(&state);

        assert!(resolve_driver_acceptance(&state, &job.id, "d1").is_ok());
        let lost = resolve_driver_acceptance(&state, &job.id, "d2").unwrap_err();
        assert!(matches!(lost, AppError::AcceptanceLost(_)));
    }

    #[tokio::test]
    async fn unanswered_job_is_abandoned_after_the_deadline() {
        let (state, mut abandoned_rx) = test_state(test_policy());
        seed_driver(&state, "d1", 100.0);
        let job = seed_job(&state);

        dispatch_job(state.clone(), job.clone()).await;

        let record = state.jobs.get(&job.id).unwrap().value().clone();
        assert_eq!(record.status, JobStatus::Abandoned);
        assert_eq!(abandoned_rx.recv().await.map(|j| j.id), Some(job.id.clone()));
        // late tap loses to the abandonment
        let late = resolve_driver_acceptance(&state, &job.id, "d1").unwrap_err();
        assert!(matches!(late, AppError::AcceptanceLost(_)));
    }

    #[tokio::test]
    async fn waves_go_out_in_ranked_chunks() {
        let (state, _abandoned_rx) = test_state(test_policy());
        for (idx, distance) in [100.0, 200.0, 300.0, 400.0, 500.0].iter().enumerate() {
            seed_driver(&state, &format!("d{idx}"), *distance);
        }
        let job = seed_job(&state);

        let mut offers = state.offer_events_tx.subscribe();
        let task = tokio::spawn(dispatch_job(state.clone(), job.clone()));

        let first = offers.recv().await.unwrap();
        assert_eq!(first.driver_ids, vec!["d0".to_string(), "d1".to_string()]);
        let second = offers.recv().await.unwrap();
        assert_eq!(second.driver_ids, vec!["d2".to_string(), "d3".to_string()]);
        let third = offers.recv().await.unwrap();
        assert_eq!(third.driver_ids, vec!["d4".to_string()]);

        task.await.unwrap();

        let record = state.jobs.get(&job.id).unwrap().value().clone();
        assert_eq!(record.status, JobStatus::Abandoned);
    }

    #[tokio::test]
    async fn accepting_an_unknown_job_is_not_found() {
        let (state, _abandoned_rx) = test_state(test_policy());
        seed_driver(&state, "d1", 100.0);

        let err = resolve_driver_acceptance(&state, "missing", "d1").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
