// # Mirror Sink Trait
//
// Defines the interface for best-effort replication of accepted records to
// a remote keyed store.
//
// ## Implementations
//
// - REST document store: `draw-mirror-rest` crate
// - `NoopMirrorSink` (this module): used when nothing is configured
//
// Mirroring never gates the local accept. The `Ingestor` commits to
// `BoundedHistory` first and only then hands the record to a detached task
// that calls the sink; failures are logged there and go no further.

use async_trait::async_trait;

use crate::record::ResultRecord;

/// Trait for mirror sink implementations
///
/// # Allowed
/// - Perform HTTP calls to the configured store
/// - Keep its own bounded queue remotely
///
/// # Forbidden
/// - Touch the local history
/// - Retry (a lost mirror write is acceptable)
/// - Log credentials
#[async_trait]
pub trait MirrorSink: Send + Sync {
    /// Store a record under its period key
    async fn save_record(&self, record: &ResultRecord) -> Result<(), crate::Error>;

    /// Prepend a record to the sink's own bounded queue
    ///
    /// # Returns
    ///
    /// The remote queue length after the write
    async fn append_queue(&self, record: &ResultRecord) -> Result<usize, crate::Error>;

    /// Name for logging and health output
    fn sink_name(&self) -> &'static str;

    /// Whether writes actually leave the process
    fn is_configured(&self) -> bool {
        true
    }
}

/// Helper trait for constructing mirror sinks from configuration
pub trait MirrorSinkFactory: Send + Sync {
    /// Create a MirrorSink instance from configuration
    fn create(
        &self,
        config: &crate::config::MirrorConfig,
    ) -> Result<Box<dyn MirrorSink>, crate::Error>;
}

/// Sink that accepts everything and sends nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMirrorSink;

#[async_trait]
impl MirrorSink for NoopMirrorSink {
    async fn save_record(&self, _record: &ResultRecord) -> Result<(), crate::Error> {
        Ok(())
    }

    async fn append_queue(&self, _record: &ResultRecord) -> Result<usize, crate::Error> {
        Ok(0)
    }

    fn sink_name(&self) -> &'static str {
        "noop"
    }

    fn is_configured(&self) -> bool {
        false
    }
}
