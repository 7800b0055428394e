use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{core::Collector, histogram_opts, HistogramVec, IntCounterVec, Registry};
use tracing::error;

lazy_static! {
    static ref EXECUTOR_STRATEGY_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "stepwright_executor_strategy_total",
            "Executor strategy attempts by outcome"
        ),
        &["action", "strategy", "outcome"]
    )
    .expect("valid metric definition");
    static ref ACTION_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "stepwright_action_duration_seconds",
            "Time to execute one action",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        ),
        &["action", "outcome"]
    )
    .expect("valid metric definition");
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register executor metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, EXECUTOR_STRATEGY_TOTAL.clone());
    register(registry, ACTION_DURATION.clone());
}

pub fn record_strategy(action: &str, strategy: &str, outcome: &str) {
    EXECUTOR_STRATEGY_TOTAL
        .with_label_values(&[action, strategy, outcome])
        .inc();
}

pub fn record_action(action: &str, ok: bool, elapsed: Duration) {
    let outcome = if ok { "ok" } else { "failed" };
    ACTION_DURATION
        .with_label_values(&[action, outcome])
        .observe(elapsed.as_secs_f64());
}

pub fn strategy_count(action: &str, strategy: &str, outcome: &str) -> u64 {
    EXECUTOR_STRATEGY_TOTAL
        .with_label_values(&[action, strategy, outcome])
        .get()
}
