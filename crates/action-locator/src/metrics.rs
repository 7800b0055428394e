use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{core::Collector, histogram_opts, Histogram, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref RESOLVER_TIER_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "stepwright_resolver_tier_total",
            "Resolver tier attempts by outcome"
        ),
        &["tier", "outcome"]
    )
    .expect("valid metric definition");
    static ref RESOLUTION_DURATION: Histogram = Histogram::with_opts(histogram_opts!(
        "stepwright_resolution_duration_seconds",
        "Time to resolve one target",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ))
    .expect("valid metric definition");
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register resolver metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, RESOLVER_TIER_TOTAL.clone());
    register(registry, RESOLUTION_DURATION.clone());
}

pub fn record_tier(tier: &str, outcome: &str) {
    RESOLVER_TIER_TOTAL.with_label_values(&[tier, outcome]).inc();
}

pub fn record_resolution(elapsed: Duration) {
    RESOLUTION_DURATION.observe(elapsed.as_secs_f64());
}

pub fn tier_count(tier: &str, outcome: &str) -> u64 {
    RESOLVER_TIER_TOTAL.with_label_values(&[tier, outcome]).get()
}
