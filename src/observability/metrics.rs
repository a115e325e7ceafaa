use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_in_pool: IntGauge,
    pub batch_cycles_total: IntCounter,
    pub batch_cycle_seconds: Histogram,
    pub jobs_emitted_total: IntCounterVec,
    pub offers_sent_total: IntCounter,
    pub acceptances_total: IntCounterVec,
    pub jobs_abandoned_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_in_pool = IntGauge::new(
            "orders_in_pool",
            "Orders currently held by the rolling horizon",
        )
        .expect("valid orders_in_pool metric");

        let batch_cycles_total =
            IntCounter::new("batch_cycles_total", "Completed batching cycles")
                .expect("valid batch_cycles_total metric");

        let batch_cycle_seconds = Histogram::with_opts(HistogramOpts::new(
            "batch_cycle_seconds",
            "Duration of one batching cycle in seconds",
        ))
        .expect("valid batch_cycle_seconds metric");

        let jobs_emitted_total = IntCounterVec::new(
            Opts::new("jobs_emitted_total", "Jobs produced by batching, by type"),
            &["job_type"],
        )
        .expect("valid jobs_emitted_total metric");

        let offers_sent_total =
            IntCounter::new("offers_sent_total", "Driver offers pushed across all waves")
                .expect("valid offers_sent_total metric");

        let acceptances_total = IntCounterVec::new(
            Opts::new("acceptances_total", "Acceptance attempts by outcome"),
            &["outcome"],
        )
        .expect("valid acceptances_total metric");

        let jobs_abandoned_total = IntCounter::new(
            "jobs_abandoned_total",
            "Jobs no driver accepted before the deadline",
        )
        .expect("valid jobs_abandoned_total metric");

        registry
            .register(Box::new(orders_in_pool.clone()))
            .expect("register orders_in_pool");
        registry
            .register(Box::new(batch_cycles_total.clone()))
            .expect("register batch_cycles_total");
        registry
            .register(Box::new(batch_cycle_seconds.clone()))
            .expect("register batch_cycle_seconds");
        registry
            .register(Box::new(jobs_emitted_total.clone()))
            .expect("register jobs_emitted_total");
        registry
            .register(Box::new(offers_sent_total.clone()))
            .expect("register offers_sent_total");
        registry
            .register(Box::new(acceptances_total.clone()))
            .expect("register acceptances_total");
        registry
            .register(Box::new(jobs_abandoned_total.clone()))
            .expect("register jobs_abandoned_total");

        Self {
            registry,
            orders_in_pool,
            batch_cycles_total,
            batch_cycle_seconds,
            jobs_emitted_total,
            offers_sent_total,
            acceptances_total,
            jobs_abandoned_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
