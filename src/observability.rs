//! Process-wide counters for pool and client activity.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;

static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Shared metrics handle.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    runs_cancelled: AtomicU64,
    clients_built: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_cancelled(&self) {
        self.runs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_built(&self) {
        self.clients_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            clients_built: self.clients_built.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub runs_cancelled: u64,
    pub clients_built: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.task_completed();
        metrics.task_completed();
        metrics.task_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_completed, 2);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.runs_cancelled, 0);
    }
}
