use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{core::Collector, histogram_opts, HistogramVec, IntCounterVec, Registry};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageMetricsSnapshot {
    pub commands: u64,
    pub failures: u64,
    pub latency_total_us: u64,
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static FAILURES: AtomicU64 = AtomicU64::new(0);
static LATENCY_TOTAL_US: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref PAGE_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("stepwright_page_commands_total", "Page commands executed"),
        &["method"]
    )
    .expect("valid metric definition");
    static ref PAGE_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "stepwright_page_command_failures_total",
            "Page commands that returned an error"
        ),
        &["method"]
    )
    .expect("valid metric definition");
    static ref PAGE_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "stepwright_page_command_duration_seconds",
            "Page command latency",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
        ),
        &["method"]
    )
    .expect("valid metric definition");
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register page metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, PAGE_COMMANDS_TOTAL.clone());
    register(registry, PAGE_COMMAND_FAILURES_TOTAL.clone());
    register(registry, PAGE_COMMAND_DURATION.clone());
}

pub fn record_command(method: &str, duration: Duration, ok: bool) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    PAGE_COMMANDS_TOTAL.with_label_values(&[method]).inc();
    let micros = duration.as_micros().min(u64::MAX as u128) as u64;
    LATENCY_TOTAL_US.fetch_add(micros, Ordering::Relaxed);
    PAGE_COMMAND_DURATION
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
    if !ok {
        FAILURES.fetch_add(1, Ordering::Relaxed);
        PAGE_COMMAND_FAILURES_TOTAL
            .with_label_values(&[method])
            .inc();
    }
}

pub fn snapshot() -> PageMetricsSnapshot {
    PageMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        failures: FAILURES.load(Ordering::Relaxed),
        latency_total_us: LATENCY_TOTAL_US.load(Ordering::Relaxed),
    }
}
