use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide metrics.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // HTTP surface
    pub token_requests: IntCounterVec,

    // Cache metrics
    pub cache_hits: IntCounter,
    pub refresh_joins: IntCounter,
    pub token_expiry_unix: IntGauge,

    // Upstream metrics
    pub upstream_fetch_requests: IntCounter,
    pub upstream_fetch_failures: IntCounterVec,
    pub upstream_fetch_duration: Histogram,

    // Config/runtime
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        // metric names and label sets below are literals; construction only fails on invalid names
        let registry = Registry::new_custom(Some("tokenrelay".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            token_requests: IntCounterVec::new(Opts::new("token_requests_total", "Token requests by variant and outcome"), &["variant", "outcome"]).unwrap(),

            cache_hits: IntCounter::new("cache_hits_total", "Requests served from a fresh cached token").unwrap(),
            refresh_joins: IntCounter::new("refresh_joins_total", "Requests that attached to an in-flight refresh").unwrap(),
            token_expiry_unix: IntGauge::new("token_expiry_unix_seconds", "Expiry of the most recently fetched token").unwrap(),

            upstream_fetch_requests: IntCounter::new("upstream_fetch_requests_total", "Token endpoint exchanges started").unwrap(),
            upstream_fetch_failures: IntCounterVec::new(Opts::new("upstream_fetch_failures_total", "Token endpoint failures by reason"), &["reason"]).unwrap(),
            upstream_fetch_duration: Histogram::with_opts(HistogramOpts::new("upstream_fetch_duration_seconds", "Token endpoint exchange duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])).unwrap(),

            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_requests.clone())).unwrap();
        reg.register(Box::new(metrics.cache_hits.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_joins.clone())).unwrap();
        reg.register(Box::new(metrics.token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_fetch_requests.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_fetch_failures.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_fetch_duration.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
