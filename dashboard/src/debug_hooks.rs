//! Topic-tagged diagnostics for the polling loop. Everything goes through
//! `tracing` under `dash.*` targets, so `RUST_LOG=dash.poll=debug` picks out
//! one topic. The chatty hooks are throttled by call count.

use crate::app::FetchTarget;
use std::sync::atomic::{AtomicU64, Ordering};

/// First `head` calls, then every `every`-th one.
fn throttled(counter: &AtomicU64, head: u64, every: u64) -> Option<u64> {
    let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
    (n <= head || n % every == 0).then_some(n)
}

pub fn log_runtime_start(poll_ms: u64, charts: usize, overlays: usize) {
    tracing::info!(
        target: "dash.runtime",
        poll_ms,
        charts,
        overlays,
        "live view starting"
    );
}

pub fn log_poll_tick(tick: u64, requests: usize, in_flight: usize) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    if let Some(n) = throttled(&COUNT, 5, 30) {
        tracing::debug!(
            target: "dash.poll",
            "tick #{tick} (logged {n}) planned={requests} in_flight={in_flight}"
        );
    }
}

pub fn log_catalog_loaded(count: usize) {
    tracing::info!(target: "dash.catalog", "catalog loaded: {count} signals");
}

pub fn log_series_applied(target: &FetchTarget, seq: u64, points: usize) {
    static COUNT: AtomicU64 = AtomicU64::new(0);
    if let Some(n) = throttled(&COUNT, 10, 50) {
        tracing::trace!(
            target: "dash.series",
            "apply #{n} target={target} seq={seq} points={points}"
        );
    }
}

pub fn log_stale_drop(target: &FetchTarget, seq: u64, applied: u64) {
    tracing::debug!(
        target: "dash.series.stale",
        "dropping response target={target} seq={seq} (already at {applied})"
    );
}

pub fn log_orphan_result(target: &FetchTarget) {
    tracing::debug!(target: "dash.series.orphan", "result for removed {target}; ignored");
}

pub fn log_fetch_error(what: &str, err: &str) {
    tracing::warn!(target: "dash.fetch", "{what}: {err}");
}

pub fn log_preset_applied(charts: usize, overlays: usize, range_secs: u64) {
    tracing::info!(
        target: "dash.preset",
        "preset applied: charts={charts} overlays={overlays} range={range_secs}s"
    );
}

pub fn log_task_failure(detail: impl AsRef<str>) {
    tracing::error!(target: "dash.runtime", "fetch task failed: {}", detail.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_lets_head_and_stride_through() {
        let counter = AtomicU64::new(0);
        let passed: Vec<u64> = (0..20).filter_map(|_| throttled(&counter, 3, 5)).collect();
        assert_eq!(passed, [1, 2, 3, 5, 10, 15, 20]);
    }
}
