//! Poll engine
//!
//! The PollEngine is responsible for:
//! - Owning the fetch schedule (one fetch in flight at a time)
//! - Bounding every fetch with an explicit timeout
//! - Replacing the live value on success
//! - Logging and swallowing failures, keeping the previous value
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   tick    ┌──────────────┐  RecordDraft  ┌──────────────┐
//! │ interval     │─────────▶│ PollEngine   │◀──────────────│ ResultSource │
//! └──────────────┘           └──────────────┘               └──────────────┘
//!                                   │
//!                 ┌─────────────────┴─────────────────┐
//!                 ▼                                   ▼
//!          ┌──────────────┐                    ┌─────────────┐
//!          │  LiveSlot    │                    │   Events    │
//!          │  (replace)   │                    │  (notify)   │
//!          └──────────────┘                    └─────────────┘
//! ```
//!
//! ## Failure policy
//!
//! Network errors, non-JSON bodies, empty `data` and timeouts are all the
//! same to the engine: warn, count, keep the held value, try again on the
//! next tick. There is no backoff and no retry cap.

use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::record::{RecordDefaults, ValidationMode};
use crate::store::LiveSlot;
use crate::traits::ResultSource;

/// Events emitted by the PollEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Engine started
    Started { source: String },

    /// A new period replaced the live value
    Updated {
        period: String,
        previous: Option<String>,
    },

    /// The feed still reports the held period
    Unchanged { period: String },

    /// Fetch or extraction failed; live value retained
    FetchFailed { error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Periodic fetch loop feeding a [`LiveSlot`]
///
/// ## Lifecycle
///
/// 1. Create with [`PollEngine::new()`]
/// 2. Either [`PollEngine::spawn()`] and later [`PollHandle::shutdown()`],
///    or await [`PollEngine::run_with_shutdown()`] directly
/// 3. The loop exits on the shutdown signal, also mid-fetch
pub struct PollEngine {
    /// Feed to poll
    source: Box<dyn ResultSource>,

    /// Where successful fetches land
    live: LiveSlot,

    /// Defaults for fields the feed omits
    defaults: RecordDefaults,

    /// Time between fetch starts
    interval: Duration,

    /// Upper bound on one fetch
    fetch_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<PollEvent>,
}

impl PollEngine {
    /// Create a new poll engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    ///
    /// # Errors
    ///
    /// Configuration errors, including a push-mode configuration.
    pub fn new(
        source: Box<dyn ResultSource>,
        live: LiveSlot,
        config: &ServiceConfig,
    ) -> Result<(Self, mpsc::Receiver<PollEvent>)> {
        config.validate()?;

        let (interval, fetch_timeout) = config
            .ingest
            .schedule()
            .ok_or_else(|| Error::config("Poll engine requires a poll ingest configuration"))?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            source,
            live,
            defaults: config.records.clone(),
            interval,
            fetch_timeout,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Override the poll interval (clamped to at least 1ms)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Override the per-fetch timeout
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Run until `shutdown_rx` fires or its sender is dropped
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(async move {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Move the engine onto its own task
    pub fn spawn(self) -> PollHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(async move { self.run_with_shutdown(shutdown_rx).await });

        PollHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }

    async fn run_internal(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        info!(
            "Starting poll engine (source={}, interval={:?}, timeout={:?})",
            self.source.source_name(),
            self.interval,
            self.fetch_timeout
        );
        self.emit_event(PollEvent::Started {
            source: self.source.source_name().to_string(),
        });

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                _ = ticker.tick() => {
                    tokio::select! {
                        biased;

                        _ = &mut shutdown => break,

                        _ = self.poll_once() => {}
                    }
                }
            }
        }

        info!("Shutdown signal received, poll engine stopped");
        self.emit_event(PollEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Perform one bounded fetch and apply its outcome
    async fn poll_once(&self) {
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(Error::upstream(format!(
                "fetch timed out after {:?}",
                self.fetch_timeout
            ))),
        };

        let normalized = fetched.and_then(|draft| {
            draft.normalize(ValidationMode::Lenient, &self.defaults, Utc::now())
        });

        match normalized {
            Ok(record) => {
                let period = record.period.clone();
                let previous = self.live.replace(record).await.map(|r| r.period);

                if previous.as_deref() == Some(period.as_str()) {
                    debug!("Period {} unchanged", period);
                    self.emit_event(PollEvent::Unchanged { period });
                } else {
                    info!("Live result updated: {:?} -> {}", previous, period);
                    self.emit_event(PollEvent::Updated { period, previous });
                }
            }
            Err(e) => {
                self.live.record_failure();
                warn!("Fetch from {} failed: {}", self.source.source_name(), e);
                self.emit_event(PollEvent::FetchFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: PollEvent) {
        // Never block the loop on a slow consumer
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Handle to a spawned [`PollEngine`]
///
/// Dropping the handle also stops the engine: the shutdown sender goes
/// away with it.
#[derive(Debug)]
pub struct PollHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<()>>,
}

impl PollHandle {
    /// Signal the engine and wait for its task to finish
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        (&mut self.join)
            .await
            .map_err(|e| Error::internal(format!("poll task failed: {}", e)))?
    }

    /// Whether the engine task has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
