//! Metrics collection.
//!
//! # Metrics
//! - `selector_picks_total` (counter): selections by balancer, address
//! - `selector_no_available_total` (counter): empty candidate set on select
//! - `selector_force_picks_total` (counter): P2C anti-starvation picks
//! - `selector_call_duration_seconds` (histogram): call latency per address
//! - `selector_candidates` (gauge): nodes in the current snapshot
//!
//! Recording can be switched off process-wide with `set_enabled(false)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn metric recording on or off.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_pick(balancer: &'static str, address: &str) {
    if !enabled() {
        return;
    }
    metrics::counter!(
        "selector_picks_total",
        "balancer" => balancer,
        "address" => address.to_string()
    )
    .increment(1);
}

pub fn record_no_available(balancer: &'static str) {
    if !enabled() {
        return;
    }
    metrics::counter!("selector_no_available_total", "balancer" => balancer).increment(1);
}

pub fn record_force_pick() {
    if !enabled() {
        return;
    }
    metrics::counter!("selector_force_picks_total").increment(1);
}

pub fn record_call_duration(address: &str, latency: Duration) {
    if !enabled() {
        return;
    }
    metrics::histogram!(
        "selector_call_duration_seconds",
        "address" => address.to_string()
    )
    .record(latency.as_secs_f64());
}

pub fn record_candidates(balancer: &'static str, count: usize) {
    if !enabled() {
        return;
    }
    metrics::gauge!("selector_candidates", "balancer" => balancer).set(count as f64);
}
