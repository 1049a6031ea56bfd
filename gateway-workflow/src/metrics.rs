use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Counters backing the `/internal/metrics` snapshot (§4.7): success rate,
/// average duration, active executions, scheduled count. All increments are
/// atomic so concurrent executions never race on a shared accumulator
/// (§5: "cost counters and latency histograms use atomic increments").
#[derive(Default)]
pub struct WorkflowMetrics {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    active: AtomicI64,
    scheduled_definitions: AtomicU64,
    total_duration_ms: AtomicU64,
    completed_count: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub active_executions: i64,
    pub scheduled_definitions: u64,
    pub success_rate: Option<f64>,
    pub average_duration_ms: Option<f64>,
}

impl WorkflowMetrics {
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self, duration_ms: u64) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.completed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self, duration_ms: u64) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.completed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_scheduled_definitions(&self, count: u64) {
        self.scheduled_definitions.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let started = self.started.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let completed = self.completed_count.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            started,
            succeeded,
            failed,
            active_executions: self.active.load(Ordering::Relaxed),
            scheduled_definitions: self.scheduled_definitions.load(Ordering::Relaxed),
            success_rate: if completed == 0 { None } else { Some(succeeded as f64 / completed as f64) },
            average_duration_ms: if completed == 0 { None } else { Some(total_duration_ms as f64 / completed as f64) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_empty_before_any_execution() {
        let metrics = WorkflowMetrics::default();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.success_rate, None);
        assert_eq!(snapshot.active_executions, 0);
    }

    #[test]
    fn success_rate_and_average_duration_reflect_recorded_executions() {
        let metrics = WorkflowMetrics::default();
        metrics.record_started();
        metrics.record_succeeded(100);
        metrics.record_started();
        metrics.record_failed(300);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.success_rate, Some(0.5));
        assert_eq!(snapshot.average_duration_ms, Some(200.0));
        assert_eq!(snapshot.active_executions, 0);
    }
}
