// # drawd - draw-relay daemon
//
// Thin integration layer: everything about records, history, polling and
// mirroring lives in draw-core and the plugin crates.
//
// The drawd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Registering sources and mirror sinks
// 4. Starting the poll engine (poll mode) or the ingestor (push mode)
// 5. Serving HTTP until SIGTERM/SIGINT, then stopping the engine
//
// ## Configuration
//
// ### Ingest
// - `DRAW_MODE`: `poll` (default) or `push`
// - `DRAW_POLL_URL`: Feed to poll
// - `DRAW_POLL_INTERVAL_SECS`: Seconds between fetches (1..=3600, default 2)
// - `DRAW_FETCH_TIMEOUT_SECS`: Upper bound on one fetch (1..=120, default 10)
// - `DRAW_SOURCE_NAME`: Label reported as the data source (default "DK WIN")
// - `DRAW_VALIDATION`: `lenient` (default) or `strict`
// - `DRAW_NUMBERS_ARITY`: Values per round in strict mode (default 5)
// - `DRAW_MARKET`: Market label for records without one (default "WinGo_1M")
//
// ### History
// - `DRAW_HISTORY_CAPACITY`: Records kept (1..=100000, default 100)
// - `DRAW_DEDUPE_BY_PERIOD`: Replace records with a repeated period (default false)
//
// ### Mirror
// - `DRAW_MIRROR_URL`: Document store root; unset disables mirroring
// - `DRAW_MIRROR_TOKEN`: Access token (optional)
// - `DRAW_MIRROR_QUEUE_KEY`: Key of the mirror queue (default "live_queue")
//
// ### Server
// - `DRAW_PORT` (or `PORT`): Listen port (default 3000)
// - `DRAW_RATE_LIMIT_MAX`: Pushes per client per window, 0 disables (default 60)
// - `DRAW_RATE_LIMIT_WINDOW_SECS`: Window length (default 60)
// - `DRAW_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DRAW_MODE=push
// export DRAW_VALIDATION=strict
// export DRAW_MIRROR_URL=https://example-rtdb.firebaseio.com
// export DRAW_MIRROR_TOKEN=your_token
//
// drawd
// ```

use anyhow::Result;
use draw_core::config::{
    DEFAULT_POLL_URL, EngineConfig, HistoryConfig, RateLimitConfig, ServerConfig,
};
use draw_core::record::DEFAULT_TIMER;
use draw_core::{
    BoundedHistory, FieldAliases, IngestConfig, IngestMode, Ingestor, LiveSlot, MirrorConfig,
    PollEngine, PollEvent, RecordDefaults, ServiceConfig, SourceRegistry, ValidationMode,
};
use draw_server::{AppState, QueryServer};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the poll engine gets to stop after the server has
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DrawExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DrawExitCode> for ExitCode {
    fn from(code: DrawExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration, as read from the environment
///
/// No Debug derive: `mirror_token` must never reach the logs.
struct Config {
    port: u16,
    mode: String,
    poll_url: String,
    poll_interval_secs: u64,
    fetch_timeout_secs: u64,
    source_name: String,
    history_capacity: usize,
    dedupe_by_period: bool,
    validation: String,
    numbers_arity: usize,
    market: String,
    mirror_url: Option<String>,
    mirror_token: Option<String>,
    mirror_queue_key: String,
    rate_limit_max: u32,
    rate_limit_window_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, one variable name at a time
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            port: match lookup("DRAW_PORT") {
                Some(_) => parse_var(&lookup, "DRAW_PORT", 3000)?,
                None => parse_var(&lookup, "PORT", 3000)?,
            },
            mode: text("DRAW_MODE", "poll").to_lowercase(),
            poll_url: text("DRAW_POLL_URL", DEFAULT_POLL_URL),
            poll_interval_secs: parse_var(&lookup, "DRAW_POLL_INTERVAL_SECS", 2)?,
            fetch_timeout_secs: parse_var(&lookup, "DRAW_FETCH_TIMEOUT_SECS", 10)?,
            source_name: text("DRAW_SOURCE_NAME", "DK WIN"),
            history_capacity: parse_var(&lookup, "DRAW_HISTORY_CAPACITY", 100)?,
            dedupe_by_period: parse_bool(&lookup, "DRAW_DEDUPE_BY_PERIOD")?,
            validation: text("DRAW_VALIDATION", "lenient").to_lowercase(),
            numbers_arity: parse_var(&lookup, "DRAW_NUMBERS_ARITY", 5)?,
            market: text("DRAW_MARKET", draw_core::record::DEFAULT_MARKET),
            mirror_url: lookup("DRAW_MIRROR_URL").filter(|v| !v.trim().is_empty()),
            mirror_token: lookup("DRAW_MIRROR_TOKEN").filter(|v| !v.trim().is_empty()),
            mirror_queue_key: text("DRAW_MIRROR_QUEUE_KEY", "live_queue"),
            rate_limit_max: parse_var(&lookup, "DRAW_RATE_LIMIT_MAX", 60)?,
            rate_limit_window_secs: parse_var(&lookup, "DRAW_RATE_LIMIT_WINDOW_SECS", 60)?,
            log_level: text("DRAW_LOG_LEVEL", "info"),
        })
    }

    /// Validate the configuration
    ///
    /// Covers enumerations, numeric ranges and URL schemes. Structural
    /// checks are repeated by `ServiceConfig::validate`.
    fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "poll" | "push" => {}
            _ => anyhow::bail!(
                "DRAW_MODE '{}' is not supported. Supported modes: poll, push",
                self.mode
            ),
        }

        match self.validation.as_str() {
            "strict" | "lenient" => {}
            _ => anyhow::bail!(
                "DRAW_VALIDATION '{}' is not valid. Valid modes: strict, lenient",
                self.validation
            ),
        }

        if self.mode == "poll"
            && !self.poll_url.starts_with("https://")
            && !self.poll_url.starts_with("http://")
        {
            anyhow::bail!(
                "DRAW_POLL_URL must use HTTP or HTTPS scheme. Got: {}",
                self.poll_url
            );
        }

        if let Some(ref url) = self.mirror_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            anyhow::bail!("DRAW_MIRROR_URL must use HTTP or HTTPS scheme. Got: {}", url);
        }

        if !(1..=3600).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "DRAW_POLL_INTERVAL_SECS must be between 1 and 3600 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        if !(1..=120).contains(&self.fetch_timeout_secs) {
            anyhow::bail!(
                "DRAW_FETCH_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                self.fetch_timeout_secs
            );
        }

        if !(1..=100_000).contains(&self.history_capacity) {
            anyhow::bail!(
                "DRAW_HISTORY_CAPACITY must be between 1 and 100000. Got: {}",
                self.history_capacity
            );
        }

        if self.validation == "strict" && self.numbers_arity == 0 {
            anyhow::bail!("DRAW_NUMBERS_ARITY must be > 0 in strict mode");
        }

        if self.rate_limit_max > 0 && self.rate_limit_window_secs == 0 {
            anyhow::bail!("DRAW_RATE_LIMIT_WINDOW_SECS must be > 0 when rate limiting is enabled");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DRAW_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Non-fatal configuration issues, logged once tracing is up
    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.mode == "poll" && self.poll_url.starts_with("http://") {
            warnings.push(
                "DRAW_POLL_URL uses HTTP (not HTTPS). Consider using HTTPS.".to_string(),
            );
        }
        if self.mirror_url.is_none() && self.mirror_token.is_some() {
            warnings.push(
                "DRAW_MIRROR_TOKEN is set but DRAW_MIRROR_URL is not; mirroring disabled"
                    .to_string(),
            );
        }
        if self.mode == "poll" && self.mirror_url.is_some() {
            warnings.push("DRAW_MIRROR_URL is ignored in poll mode".to_string());
        }

        warnings
    }

    fn ingest_mode(&self) -> IngestMode {
        if self.mode == "push" {
            IngestMode::Push
        } else {
            IngestMode::Poll
        }
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Build the typed service configuration
    fn to_service_config(&self) -> ServiceConfig {
        let validation = if self.validation == "strict" {
            ValidationMode::Strict {
                arity: self.numbers_arity,
            }
        } else {
            ValidationMode::Lenient
        };

        let ingest = match self.ingest_mode() {
            IngestMode::Poll => IngestConfig::Poll {
                url: self.poll_url.clone(),
                interval_secs: self.poll_interval_secs,
                timeout_secs: self.fetch_timeout_secs,
                source_name: self.source_name.clone(),
                aliases: FieldAliases::default(),
            },
            IngestMode::Push => IngestConfig::Push { validation },
        };

        let mirror = match &self.mirror_url {
            Some(url) => MirrorConfig::Rest {
                base_url: url.clone(),
                auth_token: self.mirror_token.clone(),
                records_path: "results".to_string(),
                queue_key: self.mirror_queue_key.clone(),
                queue_capacity: self.history_capacity,
                timeout_secs: self.fetch_timeout_secs,
            },
            None => MirrorConfig::Disabled,
        };

        ServiceConfig {
            ingest,
            history: HistoryConfig {
                capacity: self.history_capacity,
                dedupe_by_period: self.dedupe_by_period,
            },
            records: RecordDefaults {
                market: self.market.clone(),
                timer: DEFAULT_TIMER.to_string(),
            },
            mirror,
            server: ServerConfig {
                port: self.port,
                rate_limit: RateLimitConfig {
                    max_requests: self.rate_limit_max,
                    window_secs: self.rate_limit_window_secs,
                },
                ..ServerConfig::default()
            },
            engine: EngineConfig::default(),
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, v, e)),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    match lookup(key).map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => anyhow::bail!("{} must be a boolean. Got: {}", key, other),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DrawExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DrawExitCode::ConfigError.into();
    }

    let service_config = config.to_service_config();
    if let Err(e) = service_config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DrawExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DrawExitCode::ConfigError.into();
    }

    info!("Starting drawd daemon");
    for warning in config.warnings() {
        warn!("{}", warning);
    }

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DrawExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(&config, service_config).await {
            error!("Daemon error: {}", e);
            DrawExitCode::RuntimeError
        } else {
            DrawExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: &Config, service: ServiceConfig) -> Result<()> {
    let registry = SourceRegistry::new();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP result source");
        draw_source_http::register(&registry);
    }

    #[cfg(feature = "rest-mirror")]
    {
        info!("Registering REST mirror sink");
        draw_mirror_rest::register(&registry);
    }

    let history = BoundedHistory::new(service.history.capacity)?
        .with_dedupe_by_period(service.history.dedupe_by_period);

    info!(
        "Mode: {}, history capacity: {}, dedupe by period: {}",
        service.mode(),
        history.capacity(),
        history.dedupe_by_period()
    );

    let mut poll_handle = None;

    let state = match service.mode() {
        IngestMode::Poll => {
            let live = LiveSlot::new();
            let source = registry.create_source(&service.ingest)?;
            let (engine, events) = PollEngine::new(source, live.clone(), &service)?;

            tokio::spawn(log_poll_events(events));
            poll_handle = Some(engine.spawn());

            AppState::for_poll(config.source_name.clone(), live, history)
        }
        IngestMode::Push => {
            let mirror = registry.create_mirror(&service.mirror)?;
            info!(
                "Validation: {:?}, mirror: {}",
                service.ingest.validation(),
                mirror.sink_name()
            );

            let ingestor = Ingestor::from_config(history, mirror, &service);
            AppState::for_push(config.source_name.clone(), Arc::new(ingestor))
        }
    }
    .with_rate_limit(&service.server.rate_limit);

    let server = QueryServer::new(state, service.server.port, service.server.max_body_bytes);
    let served = server.run(shutdown_signal()).await;

    // Stop the engine whether or not the server exited cleanly
    if let Some(handle) = poll_handle {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.shutdown()).await {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("Poll engine shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
        }
    }

    served?;
    info!("Shutting down daemon");
    Ok(())
}

/// Forward poll engine events to the log
async fn log_poll_events(events: mpsc::Receiver<PollEvent>) {
    let mut events = ReceiverStream::new(events);

    while let Some(event) = events.next().await {
        match event {
            PollEvent::Started { source } => info!("Polling {}", source),
            PollEvent::Updated { period, previous } => {
                debug!("Period {} replaced {:?}", period, previous)
            }
            PollEvent::Unchanged { period } => debug!("Period {} unchanged", period),
            PollEvent::FetchFailed { error } => debug!("Fetch failed: {}", error),
            PollEvent::Stopped { reason } => info!("Polling stopped: {}", reason),
        }
    }
}

/// Resolve once SIGTERM or SIGINT arrives
async fn shutdown_signal() {
    match wait_for_signal().await {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => {
            error!("Signal handling failed, falling back to Ctrl-C: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
