// # Bounded History
//
// Newest-first, fixed-capacity store of accepted results.
//
// ## Invariants
//
// - `entries.len() <= capacity` after every mutation
// - `entries[0]` is the most recently accepted record
// - Order never changes after insertion
// - `total_received` counts every accept and is never reset by eviction
//
// ## Concurrency
//
// `accept` holds the write guard across insert-then-trim, so the capacity
// bound holds even transiently. Reads take the read guard and return owned
// copies; nothing handed out aliases internal storage.
//
// ## Lifecycle
//
// Created at startup and shared through an `Arc`. Nothing is persisted;
// mirroring is handled outside the store.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::record::ResultRecord;

/// Outcome of a single accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Entries held after the insert (never above capacity)
    pub queue_size: usize,
    /// Records accepted since the store was created
    pub total_received: u64,
}

#[derive(Debug, Default)]
struct HistoryInner {
    entries: VecDeque<ResultRecord>,
    total_received: u64,
}

/// Bounded, newest-first result history
///
/// # Example
///
/// ```rust
/// use draw_core::{BoundedHistory, ResultRecord};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let history = BoundedHistory::new(3)?;
///
///     for period in ["P1", "P2", "P3", "P4"] {
///         history.accept(ResultRecord::new(period, vec![1, 2, 3, 4, 5])).await;
///     }
///
///     let periods: Vec<String> = history
///         .snapshot(None)
///         .await
///         .into_iter()
///         .map(|r| r.period)
///         .collect();
///     assert_eq!(periods, ["P4", "P3", "P2"]);
///     assert_eq!(history.total_received().await, 4);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    capacity: usize,
    dedupe_by_period: bool,
    inner: Arc<RwLock<HistoryInner>>,
}

impl BoundedHistory {
    /// Create an empty history
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::config("History capacity must be > 0"));
        }

        Ok(Self {
            capacity,
            dedupe_by_period: false,
            inner: Arc::new(RwLock::new(HistoryInner {
                entries: VecDeque::with_capacity(capacity),
                total_received: 0,
            })),
        })
    }

    /// Replace an existing entry with the same period instead of appending
    /// a second one
    pub fn with_dedupe_by_period(mut self, dedupe: bool) -> Self {
        self.dedupe_by_period = dedupe;
        self
    }

    /// Insert a record at the front, evicting the oldest entry when full
    pub async fn accept(&self, record: ResultRecord) -> Accepted {
        let mut guard = self.inner.write().await;

        if self.dedupe_by_period
            && let Some(pos) = guard.entries.iter().position(|r| r.period == record.period)
        {
            guard.entries.remove(pos);
        }

        guard.entries.push_front(record);
        guard.total_received += 1;

        if guard.entries.len() > self.capacity {
            guard.entries.pop_back();
        }

        Accepted {
            queue_size: guard.entries.len(),
            total_received: guard.total_received,
        }
    }

    /// The most recently accepted record
    pub async fn latest(&self) -> Option<ResultRecord> {
        self.inner.read().await.entries.front().cloned()
    }

    /// Copy of the newest `limit` entries
    ///
    /// `None` and `Some(0)` both return the full history.
    pub async fn snapshot(&self, limit: Option<usize>) -> Vec<ResultRecord> {
        let guard = self.inner.read().await;
        let take = match limit {
            None | Some(0) => guard.entries.len(),
            Some(n) => n,
        };
        guard.entries.iter().take(take).cloned().collect()
    }

    /// Copy of the newest `limit` entries plus the number of entries held,
    /// read under one guard
    pub async fn snapshot_with_len(&self, limit: Option<usize>) -> (Vec<ResultRecord>, usize) {
        let guard = self.inner.read().await;
        let len = guard.entries.len();
        let take = match limit {
            None | Some(0) => len,
            Some(n) => n,
        };
        (guard.entries.iter().take(take).cloned().collect(), len)
    }

    /// Number of entries currently held
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Check if the history is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Records accepted since creation
    pub async fn total_received(&self) -> u64 {
        self.inner.read().await.total_received
    }

    /// Length and total read under one guard
    pub async fn counts(&self) -> Accepted {
        let guard = self.inner.read().await;
        Accepted {
            queue_size: guard.entries.len(),
            total_received: guard.total_received,
        }
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether repeated periods replace earlier entries
    pub fn dedupe_by_period(&self) -> bool {
        self.dedupe_by_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(period: &str) -> ResultRecord {
        ResultRecord::new(period, vec![1, 2, 3, 4, 5])
    }

    async fn periods(history: &BoundedHistory) -> Vec<String> {
        history
            .snapshot(None)
            .await
            .into_iter()
            .map(|r| r.period)
            .collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(BoundedHistory::new(0).is_err());
    }

    #[tokio::test]
    async fn test_history_basic() {
        let history = BoundedHistory::new(3).unwrap();

        // Initially empty
        assert!(history.is_empty().await);
        assert_eq!(history.latest().await, None);
        assert!(history.snapshot(Some(10)).await.is_empty());

        let accepted = history.accept(record("P1")).await;
        assert_eq!(
            accepted,
            Accepted {
                queue_size: 1,
                total_received: 1
            }
        );
        assert_eq!(history.latest().await.unwrap().period, "P1");
    }

    #[tokio::test]
    async fn test_evicts_oldest_beyond_capacity() {
        let history = BoundedHistory::new(3).unwrap();

        for period in ["P1", "P2", "P3", "P4"] {
            let accepted = history.accept(record(period)).await;
            assert!(accepted.queue_size <= 3);
        }

        assert_eq!(periods(&history).await, ["P4", "P3", "P2"]);
        assert_eq!(history.total_received().await, 4);
        assert_eq!(history.len().await, 3);
    }

    #[tokio::test]
    async fn test_exactly_one_eviction_per_accept_when_full() {
        let history = BoundedHistory::new(5).unwrap();

        for i in 0..50 {
            let before = periods(&history).await;
            let accepted = history.accept(record(&format!("P{i}"))).await;
            let after = periods(&history).await;

            assert_eq!(after[0], format!("P{i}"));
            assert_eq!(accepted.total_received, i + 1);

            if before.len() == 5 {
                // Everything but the oldest survives, shifted by one
                assert_eq!(&after[1..], &before[..4]);
            } else {
                assert_eq!(&after[1..], &before[..]);
            }
        }
    }

    #[tokio::test]
    async fn test_repeated_period_appends_without_dedupe() {
        let history = BoundedHistory::new(10).unwrap();

        history.accept(record("P1")).await;
        history.accept(record("P1")).await;

        assert_eq!(periods(&history).await, ["P1", "P1"]);
    }

    #[tokio::test]
    async fn test_dedupe_replaces_existing_period() {
        let history = BoundedHistory::new(10).unwrap().with_dedupe_by_period(true);

        history.accept(record("P1")).await;
        history.accept(record("P2")).await;
        let mut updated = record("P1");
        updated.numbers = vec![9, 9, 9, 9, 9];
        let accepted = history.accept(updated).await;

        assert_eq!(accepted.queue_size, 2);
        assert_eq!(accepted.total_received, 3);
        assert_eq!(periods(&history).await, ["P1", "P2"]);
        assert_eq!(history.latest().await.unwrap().numbers, vec![9, 9, 9, 9, 9]);
    }

    #[tokio::test]
    async fn test_snapshot_limit_and_isolation() {
        let history = BoundedHistory::new(10).unwrap();
        for period in ["P1", "P2", "P3"] {
            history.accept(record(period)).await;
        }

        let mut first_two = history.snapshot(Some(2)).await;
        assert_eq!(
            first_two.iter().map(|r| r.period.as_str()).collect::<Vec<_>>(),
            ["P3", "P2"]
        );

        // Mutating the copy leaves the store untouched
        first_two[0].period = "changed".to_string();
        first_two.clear();
        assert_eq!(periods(&history).await, ["P3", "P2", "P1"]);

        // Zero and oversized limits return the full history
        assert_eq!(history.snapshot(Some(0)).await.len(), 3);
        assert_eq!(history.snapshot(Some(100)).await.len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_with_len_reports_held_entries() {
        let history = BoundedHistory::new(10).unwrap();
        for period in ["P1", "P2", "P3", "P4", "P5"] {
            history.accept(record(period)).await;
        }

        let (entries, len) = history.snapshot_with_len(Some(2)).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].period, "P5");
        assert_eq!(len, 5);

        let (entries, len) = history.snapshot_with_len(None).await;
        assert_eq!(entries.len(), 5);
        assert_eq!(len, 5);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_respect_capacity() {
        let history = BoundedHistory::new(8).unwrap();

        let mut handles = Vec::new();
        for i in 0..64 {
            let history = history.clone();
            handles.push(tokio::spawn(async move {
                history.accept(record(&format!("P{i}"))).await
            }));
        }
        for handle in handles {
            let accepted = handle.await.unwrap();
            assert!(accepted.queue_size <= 8);
        }

        assert_eq!(history.len().await, 8);
        assert_eq!(history.total_received().await, 64);
    }
}
