// # draw-core
//
// Core library for the draw-relay lottery result service.
//
// ## Architecture Overview
//
// - **ResultRecord / RecordDraft**: normalized result and its raw input form
// - **BoundedHistory**: newest-first, fixed-capacity store (push deployments)
// - **LiveSlot**: single current value (poll deployments)
// - **FieldAliases**: ordered field-name lists for polled documents
// - **ResultSource**: trait for fetching the newest round from a feed
// - **MirrorSink**: trait for best-effort replication to a remote store
// - **Ingestor**: validate → commit → mirror for pushed records
// - **PollEngine**: cancellable periodic fetch loop
// - **SourceRegistry**: plugin registry for sources and sinks
//
// ## Design Principles
//
// 1. **Library-First**: stores are owned objects injected at startup, not globals
// 2. **Commit before mirror**: the local accept never waits on, or rolls back for, a mirror
// 3. **Engine-owned scheduling**: sources fetch once per call, the engine owns the timer
// 4. **Plugin-Based**: sources and sinks are registered, not hard-coded

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod record;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{IngestConfig, IngestMode, MirrorConfig, ServiceConfig};
pub use engine::{PollEngine, PollEvent, PollHandle};
pub use error::{Error, Result};
pub use extract::FieldAliases;
pub use ingest::{IngestReceipt, Ingestor, MirrorCounters};
pub use record::{RecordDefaults, RecordDraft, ResultRecord, ValidationMode};
pub use registry::SourceRegistry;
pub use store::{Accepted, BoundedHistory, LiveSlot};
pub use traits::{MirrorSink, NoopMirrorSink, ResultSource};
