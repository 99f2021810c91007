// # Result Source Trait
//
// Defines the interface for pulling the latest round from an external feed.
//
// ## Implementations
//
// - HTTP JSON feed: `draw-source-http` crate
//
// ## Usage
//
// ```rust,ignore
// use draw_core::ResultSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* ResultSource implementation */;
//
//     // One fetch, no scheduling
//     let draft = source.fetch().await?;
//     println!("latest period: {:?}", draft.period);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::record::RecordDraft;

/// Trait for result source implementations
///
/// A source performs exactly one fetch per call. Scheduling, timeouts around
/// the call, and what to do with failures are owned by `PollEngine`.
///
/// # Allowed
/// - Perform HTTP calls to the configured feed
/// - Parse the response into a [`RecordDraft`]
/// - Return an error on any failure
///
/// # Forbidden
/// - Spawn tasks or polling loops (the engine owns the timer)
/// - Retry or back off
/// - Write to any store
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Fetch the newest round
    ///
    /// # Returns
    ///
    /// - `Ok(RecordDraft)`: A draft with at least `period` set
    /// - `Err(Error::UpstreamFetch)`: Network failure, non-JSON body, or no usable data
    async fn fetch(&self) -> Result<RecordDraft, crate::Error>;

    /// Label shown to readers as the data source (e.g. "DK WIN")
    fn source_name(&self) -> &str;
}

/// Helper trait for constructing result sources from configuration
pub trait ResultSourceFactory: Send + Sync {
    /// Create a ResultSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Ingest configuration; factories reject variants they don't handle
    fn create(
        &self,
        config: &crate::config::IngestConfig,
    ) -> Result<Box<dyn ResultSource>, crate::Error>;
}
