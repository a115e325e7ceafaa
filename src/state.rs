use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::batching::policy::BatchingPolicy;
use crate::engine::dispatcher::LiveJob;
use crate::engine::horizon::RollingHorizonQueue;
use crate::engine::lock::JobLock;
use crate::engine::push::{BroadcastPush, JobOffer, PushService};
use crate::models::driver::Driver;
use crate::models::job::{Job, JobRecord};
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::routing::matrix::TimeMatrix;

pub struct AppState {
    pub orders: DashMap<String, Order>,
    pub drivers: DashMap<String, Driver>,
    pub jobs: DashMap<String, JobRecord>,
    /// Single-writer: only the horizon engine task runs cycles.
    pub horizon: Mutex<RollingHorizonQueue>,
    /// Swapped wholesale at cycle boundaries; never mutated in place.
    pub policy: RwLock<Arc<BatchingPolicy>>,
    pub matrix: Arc<dyn TimeMatrix>,
    pub lock: JobLock,
    pub live_jobs: DashMap<String, Arc<LiveJob>>,
    pub push: Arc<dyn PushService>,
    pub order_tx: mpsc::Sender<Order>,
    pub offer_events_tx: broadcast::Sender<JobOffer>,
    /// Jobs nobody accepted in time; consumed by an external abandon queue.
    pub abandoned_tx: mpsc::UnboundedSender<Job>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        matrix: Arc<dyn TimeMatrix>,
        policy: BatchingPolicy,
        order_queue_size: usize,
        event_buffer_size: usize,
    ) -> (
        Self,
        mpsc::Receiver<Order>,
        mpsc::UnboundedReceiver<Job>,
    ) {
        let (order_tx, order_rx) = mpsc::channel(order_queue_size);
        let (offer_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);
        let (abandoned_tx, abandoned_rx) = mpsc::unbounded_channel();
        let push = Arc::new(BroadcastPush::new(offer_events_tx.clone()));

        (
            Self {
                orders: DashMap::new(),
                drivers: DashMap::new(),
                jobs: DashMap::new(),
                horizon: Mutex::new(RollingHorizonQueue::new()),
                policy: RwLock::new(Arc::new(policy)),
                matrix,
                lock: JobLock::new(),
                live_jobs: DashMap::new(),
                push,
                order_tx,
                offer_events_tx,
                abandoned_tx,
                metrics: Metrics::new(),
            },
            order_rx,
            abandoned_rx,
        )
    }

    pub fn current_policy(&self) -> Arc<BatchingPolicy> {
        self.policy
            .read()
            .expect("policy lock poisoned")
            .clone()
    }

    pub fn swap_policy(&self, policy: BatchingPolicy) {
        *self.policy.write().expect("policy lock poisoned") = Arc::new(policy);
    }
}
