//! Configuration types for the draw-relay system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::FieldAliases;
use crate::record::{RecordDefaults, ValidationMode};

/// Feed polled when nothing else is configured
pub const DEFAULT_POLL_URL: &str = "https://draw.ar-lottery01.com/WinGo/WinGo_1M.json";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// How results enter the service
    #[serde(default)]
    pub ingest: IngestConfig,

    /// History sizing and dedupe
    #[serde(default)]
    pub history: HistoryConfig,

    /// Defaults applied to incoming records
    #[serde(default)]
    pub records: RecordDefaults,

    /// Optional remote mirror
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Poll engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.ingest.validate()?;
        self.history.validate()?;
        self.mirror.validate()?;
        self.server.validate()?;
        self.engine.validate()?;

        if self.records.market.trim().is_empty() {
            return Err(crate::Error::config("Default market label cannot be empty"));
        }

        Ok(())
    }

    /// Which ingest path is active
    pub fn mode(&self) -> IngestMode {
        self.ingest.mode()
    }
}

/// Ingest path of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Results are pulled from a feed on a timer
    Poll,
    /// Results are pushed through `POST /api/live`
    Push,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestMode::Poll => f.write_str("poll"),
            IngestMode::Push => f.write_str("push"),
        }
    }
}

/// Ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestConfig {
    /// Poll an HTTP JSON feed
    Poll {
        /// Feed URL
        url: String,
        /// Seconds between fetches
        #[serde(default = "default_poll_interval_secs")]
        interval_secs: u64,
        /// Upper bound on a single fetch, in seconds
        #[serde(default = "default_fetch_timeout_secs")]
        timeout_secs: u64,
        /// Label reported as the data source
        #[serde(default = "default_source_name")]
        source_name: String,
        /// Accepted field names, in priority order
        #[serde(default)]
        aliases: FieldAliases,
    },

    /// Accept records pushed over HTTP
    Push {
        /// Strict or lenient input checking
        #[serde(default)]
        validation: ValidationMode,
    },

    /// Poll through a custom registered source
    Custom {
        /// Factory name to use
        factory: String,
        /// Seconds between fetches
        #[serde(default = "default_poll_interval_secs")]
        interval_secs: u64,
        /// Upper bound on a single fetch, in seconds
        #[serde(default = "default_fetch_timeout_secs")]
        timeout_secs: u64,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IngestConfig {
    /// Validate the ingest configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IngestConfig::Poll {
                url,
                interval_secs,
                timeout_secs,
                ..
            } => {
                if url.is_empty() {
                    return Err(crate::Error::config("Poll URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Poll URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                validate_schedule(*interval_secs, *timeout_secs)
            }
            IngestConfig::Push { validation } => match validation {
                ValidationMode::Strict { arity: 0 } => Err(crate::Error::config(
                    "Strict validation requires a numbers arity > 0",
                )),
                _ => Ok(()),
            },
            IngestConfig::Custom {
                factory,
                interval_secs,
                timeout_secs,
                config,
            } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                validate_schedule(*interval_secs, *timeout_secs)
            }
        }
    }

    /// Which ingest path this configuration selects
    pub fn mode(&self) -> IngestMode {
        match self {
            IngestConfig::Push { .. } => IngestMode::Push,
            IngestConfig::Poll { .. } | IngestConfig::Custom { .. } => IngestMode::Poll,
        }
    }

    /// Registry key of the source factory (`None` for push)
    pub fn type_name(&self) -> Option<&str> {
        match self {
            IngestConfig::Poll { .. } => Some("http"),
            IngestConfig::Push { .. } => None,
            IngestConfig::Custom { factory, .. } => Some(factory),
        }
    }

    /// Poll interval and fetch timeout, for poll modes
    pub fn schedule(&self) -> Option<(std::time::Duration, std::time::Duration)> {
        match self {
            IngestConfig::Poll {
                interval_secs,
                timeout_secs,
                ..
            }
            | IngestConfig::Custom {
                interval_secs,
                timeout_secs,
                ..
            } => Some((
                std::time::Duration::from_secs(*interval_secs),
                std::time::Duration::from_secs(*timeout_secs),
            )),
            IngestConfig::Push { .. } => None,
        }
    }

    /// Validation mode for push deployments (lenient for poll)
    pub fn validation(&self) -> ValidationMode {
        match self {
            IngestConfig::Push { validation } => *validation,
            _ => ValidationMode::Lenient,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig::Poll {
            url: DEFAULT_POLL_URL.to_string(),
            interval_secs: default_poll_interval_secs(),
            timeout_secs: default_fetch_timeout_secs(),
            source_name: default_source_name(),
            aliases: FieldAliases::default(),
        }
    }
}

fn validate_schedule(interval_secs: u64, timeout_secs: u64) -> Result<(), crate::Error> {
    if interval_secs == 0 {
        return Err(crate::Error::config("Poll interval must be > 0"));
    }
    if timeout_secs == 0 {
        return Err(crate::Error::config("Fetch timeout must be > 0"));
    }
    Ok(())
}

/// History configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of retained records
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,

    /// Replace an entry with the same period instead of appending
    ///
    /// Off by default: a repeated period is stored twice.
    #[serde(default)]
    pub dedupe_by_period: bool,
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.capacity == 0 {
            return Err(crate::Error::config("History capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            dedupe_by_period: false,
        }
    }
}

/// Mirror configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorConfig {
    /// No mirroring
    #[default]
    Disabled,

    /// REST document store (`PUT {base_url}/{path}/{key}.json`)
    Rest {
        /// Store root URL; empty means "not configured"
        base_url: String,
        /// Access token appended as `?auth=`
        /// ⚠️ NEVER log this value
        #[serde(default)]
        auth_token: Option<String>,
        /// Collection that holds one document per period
        #[serde(default = "default_records_path")]
        records_path: String,
        /// Key of the mirror's own bounded queue
        #[serde(default = "default_queue_key")]
        queue_key: String,
        /// Length of the mirror queue
        #[serde(default = "default_history_capacity")]
        queue_capacity: usize,
        /// Upper bound on a single write, in seconds
        #[serde(default = "default_fetch_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom mirror sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl MirrorConfig {
    /// Validate the mirror configuration
    ///
    /// A REST mirror without a base URL is valid: it degrades to a no-op.
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            MirrorConfig::Rest {
                base_url,
                queue_key,
                queue_capacity,
                timeout_secs,
                ..
            } => {
                if !base_url.is_empty()
                    && !base_url.starts_with("https://")
                    && !base_url.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "Mirror URL must use HTTP or HTTPS scheme. Got: {}",
                        base_url
                    )));
                }
                if queue_key.is_empty() {
                    return Err(crate::Error::config("Mirror queue key cannot be empty"));
                }
                if *queue_capacity == 0 {
                    return Err(crate::Error::config("Mirror queue capacity must be > 0"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("Mirror timeout must be > 0"));
                }
                Ok(())
            }
            MirrorConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom mirror factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Whether a sink should be built at all
    pub fn is_enabled(&self) -> bool {
        match self {
            MirrorConfig::Disabled => false,
            MirrorConfig::Rest { base_url, .. } => !base_url.is_empty(),
            MirrorConfig::Custom { .. } => true,
        }
    }

    /// Get the mirror type name
    pub fn type_name(&self) -> &str {
        match self {
            MirrorConfig::Disabled => "disabled",
            MirrorConfig::Rest { .. } => "rest",
            MirrorConfig::Custom { factory, .. } => factory,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Write-endpoint rate limit
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_body_bytes == 0 {
            return Err(crate::Error::config("Max body size must be > 0"));
        }
        self.rate_limit.validate()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Fixed-window rate limit applied per client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window; 0 disables limiting
    #[serde(default = "default_rate_limit_max")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.is_enabled() && self.window_secs == 0 {
            return Err(crate::Error::config("Rate limit window must be > 0"));
        }
        Ok(())
    }

    /// Whether requests are limited at all
    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_rate_limit_max(),
            window_secs: default_rate_limit_window_secs(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the poll engine's event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_source_name() -> String {
    "DK WIN".to_string()
}

fn default_history_capacity() -> usize {
    100
}

fn default_records_path() -> String {
    "results".to_string()
}

fn default_queue_key() -> String {
    "live_queue".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

fn default_rate_limit_max() -> u32 {
    60
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
