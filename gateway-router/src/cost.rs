use std::sync::atomic::{AtomicU64, Ordering};

use crate::variant::Variant;

/// Fixed-point scale so cost weights (which are fractional) can live in
/// atomics. Matches the cache/audit crates' preference for atomic counters
/// over a mutex-guarded float.
const SCALE: f64 = 1_000.0;

/// Running baseline/actual cost totals, updated with atomic increments so
/// the router is safe to call concurrently (§5 concurrency model).
#[derive(Default)]
pub struct CostAccumulator {
    baseline_scaled: AtomicU64,
    actual_scaled: AtomicU64,
    served_requests: AtomicU64,
}

impl CostAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one served request. Cache hits pass `actual = 0.0` and
    /// `baseline = Variant::Full.weight()` per §4.5.
    pub fn record(&self, baseline: f64, actual: f64) {
        self.baseline_scaled.fetch_add((baseline * SCALE) as u64, Ordering::Relaxed);
        self.actual_scaled.fetch_add((actual * SCALE) as u64, Ordering::Relaxed);
        self.served_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, selected: Variant) {
        self.record(Variant::Full.weight(), selected.weight());
    }

    pub fn record_cache_hit(&self) {
        self.record(Variant::Full.weight(), 0.0);
    }

    pub fn baseline_cost(&self) -> f64 {
        self.baseline_scaled.load(Ordering::Relaxed) as f64 / SCALE
    }

    pub fn actual_cost(&self) -> f64 {
        self.actual_scaled.load(Ordering::Relaxed) as f64 / SCALE
    }

    pub fn served_requests(&self) -> u64 {
        self.served_requests.load(Ordering::Relaxed)
    }

    /// `(baseline - actual) / baseline`, or `None` before the first request.
    pub fn savings_ratio(&self) -> Option<f64> {
        if self.served_requests() == 0 {
            return None;
        }
        let baseline = self.baseline_cost();
        if baseline == 0.0 {
            return Some(0.0);
        }
        Some((baseline - self.actual_cost()) / baseline)
    }
}
