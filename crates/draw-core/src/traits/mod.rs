//! Core traits for the draw-relay system
//!
//! This module defines the abstract interfaces that all plugins must follow.
//!
//! - [`ResultSource`]: Fetch the newest round from an external feed
//! - [`MirrorSink`]: Replicate accepted records to a remote store

pub mod mirror_sink;
pub mod result_source;

pub use mirror_sink::{MirrorSink, MirrorSinkFactory, NoopMirrorSink};
pub use result_source::{ResultSource, ResultSourceFactory};
