//! Push ingest
//!
//! The `Ingestor` takes one draft per inbound write and runs it through:
//!
//! 1. Validation / normalization (`ValidationMode`), rejected before any mutation
//! 2. `BoundedHistory::accept`, the local commit
//! 3. Mirror dispatch on a detached task, never awaited by the caller
//!
//! A mirror failure is logged and counted; the receipt returned to the
//! caller reflects the local commit only.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::record::{RecordDefaults, RecordDraft, ResultRecord, ValidationMode};
use crate::store::BoundedHistory;
use crate::traits::MirrorSink;

/// What the caller gets back after a successful ingest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub period: String,
    pub queue_size: usize,
    pub total_received: u64,
}

/// Mirror write counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MirrorCounters {
    pub writes: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct MirrorStats {
    writes: AtomicU64,
    failures: AtomicU64,
}

/// Validates pushed drafts, commits them, and hands them to the mirror
pub struct Ingestor {
    history: BoundedHistory,
    mirror: Arc<dyn MirrorSink>,
    validation: ValidationMode,
    defaults: RecordDefaults,
    stats: Arc<MirrorStats>,
}

impl Ingestor {
    /// Create an ingestor over an existing history
    pub fn new(
        history: BoundedHistory,
        mirror: Arc<dyn MirrorSink>,
        validation: ValidationMode,
        defaults: RecordDefaults,
    ) -> Self {
        Self {
            history,
            mirror,
            validation,
            defaults,
            stats: Arc::new(MirrorStats::default()),
        }
    }

    /// Create an ingestor using the validation mode and defaults from `config`
    pub fn from_config(
        history: BoundedHistory,
        mirror: Arc<dyn MirrorSink>,
        config: &ServiceConfig,
    ) -> Self {
        Self::new(
            history,
            mirror,
            config.ingest.validation(),
            config.records.clone(),
        )
    }

    /// Validate, commit, and mirror one draft
    ///
    /// # Errors
    ///
    /// Only `Error::Validation`; the history is untouched in that case.
    pub async fn ingest(&self, draft: RecordDraft) -> Result<IngestReceipt> {
        let record = draft.normalize(self.validation, &self.defaults, Utc::now())?;
        let period = record.period.clone();

        let accepted = self.history.accept(record.clone()).await;
        info!(
            "Accepted period {} (queue size {}, total {})",
            period, accepted.queue_size, accepted.total_received
        );

        self.dispatch_mirror(record);

        Ok(IngestReceipt {
            period,
            queue_size: accepted.queue_size,
            total_received: accepted.total_received,
        })
    }

    /// The history this ingestor commits to
    pub fn history(&self) -> &BoundedHistory {
        &self.history
    }

    pub fn validation(&self) -> ValidationMode {
        self.validation
    }

    /// Name of the active mirror sink
    pub fn mirror_name(&self) -> &'static str {
        self.mirror.sink_name()
    }

    /// Whether accepted records leave the process
    pub fn mirror_configured(&self) -> bool {
        self.mirror.is_configured()
    }

    pub fn mirror_counters(&self) -> MirrorCounters {
        MirrorCounters {
            writes: self.stats.writes.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    fn dispatch_mirror(&self, record: ResultRecord) {
        if !self.mirror.is_configured() {
            return;
        }

        let sink = Arc::clone(&self.mirror);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            match sink.save_record(&record).await {
                Ok(()) => {
                    stats.writes.fetch_add(1, Ordering::Relaxed);
                    debug!("Mirrored period {} to {}", record.period, sink.sink_name());
                }
                Err(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Mirror save failed for period {} ({}): {}",
                        record.period,
                        sink.sink_name(),
                        e
                    );
                }
            }

            match sink.append_queue(&record).await {
                Ok(len) => {
                    stats.writes.fetch_add(1, Ordering::Relaxed);
                    debug!("Mirror queue now holds {} entries", len);
                }
                Err(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Mirror queue update failed for period {} ({}): {}",
                        record.period,
                        sink.sink_name(),
                        e
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::traits::NoopMirrorSink;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct FailingSink;

    #[async_trait]
    impl MirrorSink for FailingSink {
        async fn save_record(&self, _record: &ResultRecord) -> Result<()> {
            Err(Error::mirror("connection refused"))
        }

        async fn append_queue(&self, _record: &ResultRecord) -> Result<usize> {
            Err(Error::mirror("connection refused"))
        }

        fn sink_name(&self) -> &'static str {
            "failing"
        }
    }

    fn draft(body: serde_json::Value) -> RecordDraft {
        RecordDraft::from_json(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_returns_receipt() {
        let history = BoundedHistory::new(100).unwrap();
        let ingestor = Ingestor::new(
            history.clone(),
            Arc::new(NoopMirrorSink),
            ValidationMode::Lenient,
            RecordDefaults::default(),
        );

        let receipt = ingestor
            .ingest(draft(json!({"period": "P1", "numbers": [1, 2, 3, 4, 5]})))
            .await
            .unwrap();

        assert_eq!(
            receipt,
            IngestReceipt {
                period: "P1".to_string(),
                queue_size: 1,
                total_received: 1
            }
        );
        assert_eq!(history.latest().await.unwrap().period, "P1");
        assert!(!ingestor.mirror_configured());
    }

    #[tokio::test]
    async fn test_rejected_draft_leaves_history_unchanged() {
        let history = BoundedHistory::new(100).unwrap();
        let ingestor = Ingestor::new(
            history.clone(),
            Arc::new(NoopMirrorSink),
            ValidationMode::Strict { arity: 5 },
            RecordDefaults::default(),
        );

        let err = ingestor
            .ingest(draft(json!({"period": "P1", "numbers": [1, 2]})))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(history.is_empty().await);
        assert_eq!(history.total_received().await, 0);
    }

    #[tokio::test]
    async fn test_mirror_failure_does_not_reach_caller() {
        let history = BoundedHistory::new(100).unwrap();
        let ingestor = Ingestor::new(
            history.clone(),
            Arc::new(FailingSink),
            ValidationMode::Lenient,
            RecordDefaults::default(),
        );

        let receipt = ingestor
            .ingest(draft(json!({"period": "P1"})))
            .await
            .unwrap();
        assert_eq!(receipt.queue_size, 1);

        // Both mirror calls fail on the detached task
        for _ in 0..50 {
            if ingestor.mirror_counters().failures == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            ingestor.mirror_counters(),
            MirrorCounters {
                writes: 0,
                failures: 2
            }
        );
        assert_eq!(history.len().await, 1);
    }
}
