//! Test doubles and common utilities for contract tests
//!
//! These doubles exercise the real extraction and normalization paths; only
//! the network is replaced.

#![allow(dead_code)]

use draw_core::error::{Error, Result};
use draw_core::record::{RecordDraft, ResultRecord};
use draw_core::traits::{MirrorSink, ResultSource};
use draw_core::{FieldAliases, ServiceConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted fetch outcome
#[derive(Debug, Clone)]
pub enum Step {
    /// Respond with this body; it goes through JSON parsing and alias extraction
    Body(&'static str),
    /// Never respond
    Hang,
}

/// A source that replays a script, repeating the last step forever
pub struct ScriptedSource {
    steps: Vec<Step>,
    aliases: FieldAliases,
    fetch_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty(), "script needs at least one step");
        Self {
            steps,
            aliases: FieldAliases::default(),
            fetch_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of fetch() calls
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetch_count)
    }

    /// Shared high-water mark of concurrent fetches
    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ResultSource for ScriptedSource {
    async fn fetch(&self) -> Result<RecordDraft> {
        let call = self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(Arc::clone(&self.in_flight));

        let step = self.steps[call.min(self.steps.len() - 1)].clone();
        match step {
            Step::Body(body) => {
                let document: serde_json::Value = serde_json::from_str(body)
                    .map_err(|e| Error::upstream(format!("invalid JSON: {}", e)))?;
                self.aliases.extract(&document)
            }
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::upstream("hung fetch finished"))
            }
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// A mirror that records what it was asked to write
pub struct RecordingMirror {
    saved: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    fail: bool,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self {
            saved: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    /// Every write sleeps for `delay` first
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// Every write fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn saved_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.saved)
    }
}

#[async_trait::async_trait]
impl MirrorSink for RecordingMirror {
    async fn save_record(&self, record: &ResultRecord) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(Error::mirror("store unreachable"));
        }
        self.saved.lock().unwrap().push(record.period.clone());
        Ok(())
    }

    async fn append_queue(&self, _record: &ResultRecord) -> Result<usize> {
        if self.fail {
            return Err(Error::mirror("store unreachable"));
        }
        Ok(self.saved.lock().unwrap().len())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A valid WinGo-style document for `period`
pub const WINGO_P1: &str = r#"{"data":[{"issueNumber":"P1","number":"7","colour":"green"}]}"#;
pub const WINGO_P2: &str = r#"{"data":[{"issueNumber":"P2","number":"3"}]}"#;

/// Default poll configuration used by engine tests
pub fn poll_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.engine.event_channel_capacity = 1000;
    config
}
