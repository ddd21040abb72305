//! Build counters with Prometheus text rendering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{ContextBuildResult, NoContextReason};

/// Context build counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Snapshot scans completed
    pub snapshots_total: AtomicU64,
    /// Builds started
    pub builds_total: AtomicU64,
    /// Builds that were cancelled or superseded
    pub builds_cancelled: AtomicU64,
    /// Builds that produced no context
    pub builds_empty: AtomicU64,
    /// Files attached in full
    pub files_attached: AtomicU64,
    /// Files attached after trimming
    pub files_truncated: AtomicU64,
    /// Files excluded by the budget
    pub files_excluded: AtomicU64,
    /// Files that could not be read
    pub load_failures: AtomicU64,
    /// Requests sent to the assistant
    pub assistant_calls: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_snapshots(&self) {
        self.snapshots_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_builds(&self) {
        self.builds_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cancelled(&self) {
        self.builds_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_assistant_calls(&self) {
        self.assistant_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty(&self, _reason: NoContextReason) {
        self.builds_empty.fetch_add(1, Ordering::Relaxed);
    }

    /// Add the classification counts of a finished build.
    pub fn record_result(&self, result: &ContextBuildResult) {
        self.files_attached
            .fetch_add(result.attachments.len() as u64, Ordering::Relaxed);
        self.files_truncated
            .fetch_add(result.truncated.len() as u64, Ordering::Relaxed);
        self.files_excluded
            .fetch_add(result.excluded.len() as u64, Ordering::Relaxed);
        self.load_failures
            .fetch_add(result.load_failures.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            snapshots_total: self.snapshots_total.load(Ordering::Relaxed),
            builds_total: self.builds_total.load(Ordering::Relaxed),
            builds_cancelled: self.builds_cancelled.load(Ordering::Relaxed),
            builds_empty: self.builds_empty.load(Ordering::Relaxed),
            files_attached: self.files_attached.load(Ordering::Relaxed),
            files_truncated: self.files_truncated.load(Ordering::Relaxed),
            files_excluded: self.files_excluded.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            assistant_calls: self.assistant_calls.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let rows = [
            ("snapshots_total", "Workspace snapshots built", s.snapshots_total),
            ("builds_total", "Context builds started", s.builds_total),
            ("builds_cancelled", "Context builds cancelled", s.builds_cancelled),
            ("builds_empty", "Context builds with nothing to send", s.builds_empty),
            ("files_attached", "Files attached in full", s.files_attached),
            ("files_truncated", "Files attached after truncation", s.files_truncated),
            ("files_excluded", "Files excluded by budget", s.files_excluded),
            ("load_failures", "Files that failed to load", s.load_failures),
            ("assistant_calls", "Requests sent to the assistant", s.assistant_calls),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP workspace_context_{name} {help}\n# TYPE workspace_context_{name} counter\nworkspace_context_{name} {value}\n\n"
            ));
        }
        out
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub snapshots_total: u64,
    pub builds_total: u64,
    pub builds_cancelled: u64,
    pub builds_empty: u64,
    pub files_attached: u64,
    pub files_truncated: u64,
    pub files_excluded: u64,
    pub load_failures: u64,
    pub assistant_calls: u64,
}
