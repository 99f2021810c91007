// # Live Slot
//
// Single "current value" written by the poll engine.
//
// Poll deployments keep only the latest extracted record; a failed fetch
// never touches the held value. Fetch counters feed the health endpoint.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::record::ResultRecord;

/// Latest polled record plus fetch diagnostics
#[derive(Debug, Clone, Default)]
pub struct LiveSlot {
    current: Arc<RwLock<Option<ResultRecord>>>,
    fetches_ok: Arc<AtomicU64>,
    fetches_failed: Arc<AtomicU64>,
}

/// Point-in-time fetch counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStats {
    pub fetches_ok: u64,
    pub fetches_failed: u64,
}

impl LiveSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held record, returning the previous one
    pub async fn replace(&self, record: ResultRecord) -> Option<ResultRecord> {
        self.fetches_ok.fetch_add(1, Ordering::Relaxed);
        self.current.write().await.replace(record)
    }

    /// Count a failed fetch; the held record is left as is
    pub fn record_failure(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the held record
    pub async fn get(&self) -> Option<ResultRecord> {
        self.current.read().await.clone()
    }

    /// Ingestion time of the held record
    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.current.read().await.as_ref().map(|r| r.received_at)
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            fetches_ok: self.fetches_ok.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_and_failure() {
        let slot = LiveSlot::new();
        assert!(slot.get().await.is_none());

        assert!(slot.replace(ResultRecord::new("P1", vec![3])).await.is_none());
        slot.record_failure();

        let previous = slot.replace(ResultRecord::new("P2", vec![4])).await;
        assert_eq!(previous.unwrap().period, "P1");
        assert_eq!(slot.get().await.unwrap().period, "P2");
        assert_eq!(
            slot.stats(),
            FetchStats {
                fetches_ok: 2,
                fetches_failed: 1
            }
        );
    }
}
