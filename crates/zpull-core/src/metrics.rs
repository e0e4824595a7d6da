//! Duration observations emitted by snapshot and bookmark operations.
//!
//! Registration with an exporter is left to the embedding program; this
//! module only defines the emission point and an in-memory recorder.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Snapshot,
    Bookmark,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Snapshot => "snapshot",
            Operation::Bookmark => "bookmark",
        })
    }
}

/// Sink for per-filesystem command durations.
pub trait CommandMetrics: Send + Sync {
    fn observe(&self, op: Operation, filesystem: &str, elapsed: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl CommandMetrics for NoopMetrics {
    fn observe(&self, _op: Operation, _filesystem: &str, _elapsed: Duration) {}
}

/// Aggregated observations for one operation and filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

/// Keeps count, total and max duration per `(operation, filesystem)`.
#[derive(Debug, Default)]
pub struct DurationRecorder {
    entries: Mutex<HashMap<(Operation, String), DurationStats>>,
}

impl DurationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, op: Operation, filesystem: &str) -> Option<DurationStats> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(op, filesystem.to_string()))
            .copied()
    }

    pub fn snapshot(&self) -> Vec<(Operation, String, DurationStats)> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = entries
            .iter()
            .map(|((op, fs), stats)| (*op, fs.clone(), *stats))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        out
    }
}

impl CommandMetrics for DurationRecorder {
    fn observe(&self, op: Operation, filesystem: &str, elapsed: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let stats = entries.entry((op, filesystem.to_string())).or_default();
        stats.count += 1;
        stats.total += elapsed;
        stats.max = stats.max.max(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_aggregates_per_filesystem() {
        let recorder = DurationRecorder::new();
        recorder.observe(Operation::Snapshot, "tank/a", Duration::from_millis(5));
        recorder.observe(Operation::Snapshot, "tank/a", Duration::from_millis(15));
        recorder.observe(Operation::Bookmark, "tank/a", Duration::from_millis(1));
        recorder.observe(Operation::Snapshot, "tank/b", Duration::from_millis(2));

        let a = recorder.stats(Operation::Snapshot, "tank/a").unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(a.total, Duration::from_millis(20));
        assert_eq!(a.max, Duration::from_millis(15));
        assert_eq!(recorder.snapshot().len(), 3);
        assert!(recorder.stats(Operation::Bookmark, "tank/b").is_none());
    }
}
