use std::sync::Arc;
use std::time::Instant;

use draw_core::config::RateLimitConfig;
use draw_core::{BoundedHistory, IngestMode, Ingestor, LiveSlot, MirrorCounters};
use serde::Serialize;

use crate::rate_limit::RateLimiter;

/// Everything the handlers read from
///
/// Poll deployments hold a `LiveSlot` and an empty history; push
/// deployments hold an `Ingestor` whose history backs every read.
pub struct AppState {
    pub mode: IngestMode,
    pub source_name: String,
    pub history: BoundedHistory,
    pub live: LiveSlot,
    pub ingestor: Option<Arc<Ingestor>>,
    pub limiter: RateLimiter,
    pub started_at: Instant,
}

/// Mirror section of `/health`
#[derive(Debug, Clone, Serialize)]
pub struct MirrorHealth {
    pub configured: bool,
    pub sink: &'static str,
    pub writes: u64,
    pub failures: u64,
}

impl AppState {
    /// State for a deployment fed by the poll engine
    pub fn for_poll(source_name: impl Into<String>, live: LiveSlot, history: BoundedHistory) -> Self {
        Self {
            mode: IngestMode::Poll,
            source_name: source_name.into(),
            history,
            live,
            ingestor: None,
            limiter: RateLimiter::disabled(),
            started_at: Instant::now(),
        }
    }

    /// State for a deployment fed through `POST /api/live`
    pub fn for_push(source_name: impl Into<String>, ingestor: Arc<Ingestor>) -> Self {
        Self {
            mode: IngestMode::Push,
            source_name: source_name.into(),
            history: ingestor.history().clone(),
            live: LiveSlot::new(),
            ingestor: Some(ingestor),
            limiter: RateLimiter::disabled(),
            started_at: Instant::now(),
        }
    }

    pub fn with_rate_limit(mut self, config: &RateLimitConfig) -> Self {
        self.limiter = RateLimiter::from_config(config);
        self
    }

    pub fn mirror_health(&self) -> MirrorHealth {
        match &self.ingestor {
            Some(ingestor) => {
                let MirrorCounters { writes, failures } = ingestor.mirror_counters();
                MirrorHealth {
                    configured: ingestor.mirror_configured(),
                    sink: ingestor.mirror_name(),
                    writes,
                    failures,
                }
            }
            None => MirrorHealth {
                configured: false,
                sink: "none",
                writes: 0,
                failures: 0,
            },
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Page size assumed when converting `/proc/self/statm` pages to bytes.
/// Correct for x86_64 and most aarch64 kernels; 16K/64K page kernels
/// under-report by that factor.
pub const ASSUMED_PAGE_SIZE: u64 = 4096;

/// Resident set size of this process, where the platform exposes it
///
/// Computed as resident pages times [`ASSUMED_PAGE_SIZE`].
pub fn rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    rss_from_statm(&statm)
}

/// statm fields: size resident shared text lib data dt
fn rss_from_statm(statm: &str) -> Option<u64> {
    let resident: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident * ASSUMED_PAGE_SIZE)
}
