//! Process-wide metrics registry.
//!
//! Each engine crate keeps its own counters; [`register_metrics`] gathers them into
//! one registry next to the per-step outcome counter, and [`render`] encodes the
//! lot in the Prometheus text format.

use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();
static STEP_RESULTS: OnceCell<IntCounterVec> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        cdp_adapter::metrics::register_metrics(registry);
        action_locator::metrics::register_metrics(registry);
        action_primitives::metrics::register_metrics(registry);
        register_step_metrics(registry);
    });
}

fn register_step_metrics(registry: &Registry) {
    let counter = match IntCounterVec::new(
        Opts::new("stepwright_step_results_total", "Finished steps by action and status"),
        &["action", "status"],
    ) {
        Ok(counter) => counter,
        Err(err) => {
            error!(?err, "failed to build step metric");
            return;
        }
    };
    if let Err(err) = registry.register(Box::new(counter.clone())) {
        error!(?err, "failed to register step metric");
    }
    let _ = STEP_RESULTS.set(counter);
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn record_step(action: &str, status: &str) {
    register_metrics();
    if let Some(counter) = STEP_RESULTS.get() {
        counter.with_label_values(&[action, status]).inc();
    }
}

pub fn step_count(action: &str, status: &str) -> u64 {
    STEP_RESULTS
        .get()
        .map(|c| c.with_label_values(&[action, status]).get())
        .unwrap_or(0)
}

/// Current metrics in the Prometheus text exposition format.
pub fn render() -> anyhow::Result<String> {
    register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&global_registry().gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_results_show_up_in_the_rendered_text() {
        let before = step_count("click", "failed");
        record_step("click", "failed");
        assert_eq!(step_count("click", "failed"), before + 1);

        let text = render().unwrap();
        assert!(text.contains("stepwright_step_results_total"));
    }
}
