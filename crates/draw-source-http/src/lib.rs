// # HTTP Result Source
//
// This crate provides an HTTP JSON feed source for the draw-relay service.
//
// ## Behaviour
//
// One `fetch()` is one GET. The body must be JSON; the newest round is then
// located and read through `FieldAliases`, so feeds that say `issueNumber`
// and feeds that say `currentPeriod` are both understood without code
// changes.
//
// The client carries its own timeout. `PollEngine` wraps every call in a
// second one, so a stalled connection never holds up the schedule.

use draw_core::config::IngestConfig;
use draw_core::record::RecordDraft;
use draw_core::traits::{ResultSource, ResultSourceFactory};
use draw_core::{Error, FieldAliases, Result, SourceRegistry};

use std::time::Duration;

/// Default HTTP timeout for feed requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP JSON feed source
pub struct HttpResultSource {
    /// Feed URL
    url: String,

    /// Label reported to readers
    source_name: String,

    /// Field names to look for, in priority order
    aliases: FieldAliases,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpResultSource {
    /// Create a source with the default aliases and timeout
    ///
    /// # Parameters
    ///
    /// - `url`: Feed URL (e.g., "https://draw.ar-lottery01.com/WinGo/WinGo_1M.json")
    /// - `source_name`: Label shown as the data source (e.g., "DK WIN")
    pub fn new(url: impl Into<String>, source_name: impl Into<String>) -> Result<Self> {
        Self::with_options(url, source_name, FieldAliases::default(), DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a source with explicit aliases and timeout
    pub fn with_options(
        url: impl Into<String>,
        source_name: impl Into<String>,
        aliases: FieldAliases,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            source_name: source_name.into(),
            aliases,
            client,
        })
    }

    /// Fetch and parse the raw document
    async fn fetch_document(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::upstream(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::upstream(format!("HTTP error: {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::upstream(format!("Failed to read response: {}", e)))?;

        parse_document(&body)
    }
}

/// Parse a response body as JSON
fn parse_document(body: &str) -> Result<serde_json::Value> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(64).collect();
        Error::upstream(format!("Response is not JSON ({}): {:?}", e, preview))
    })
}

#[async_trait::async_trait]
impl ResultSource for HttpResultSource {
    async fn fetch(&self) -> Result<RecordDraft> {
        let document = self.fetch_document().await?;
        let draft = self.aliases.extract(&document)?;

        tracing::debug!("Fetched period {:?} from {}", draft.period, self.url);
        Ok(draft)
    }

    fn source_name(&self) -> &str {
        &self.source_name
    }
}

/// Factory for creating HTTP result sources
pub struct HttpSourceFactory;

impl ResultSourceFactory for HttpSourceFactory {
    fn create(&self, config: &IngestConfig) -> Result<Box<dyn ResultSource>> {
        match config {
            IngestConfig::Poll {
                url,
                timeout_secs,
                source_name,
                aliases,
                ..
            } => Ok(Box::new(HttpResultSource::with_options(
                url.clone(),
                source_name.clone(),
                aliases.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP result source")),
        }
    }
}

/// Register the HTTP result source with a registry
pub fn register(registry: &SourceRegistry) {
    registry.register_source("http", Box::new(HttpSourceFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use draw_core::ValidationMode;

    fn poll_config(url: &str) -> IngestConfig {
        IngestConfig::Poll {
            url: url.to_string(),
            interval_secs: 2,
            timeout_secs: 1,
            source_name: "DK WIN".to_string(),
            aliases: FieldAliases::default(),
        }
    }

    #[test]
    fn test_factory_creation() {
        let factory = HttpSourceFactory;

        let source = factory
            .create(&poll_config("https://draw.ar-lottery01.com/WinGo/WinGo_1M.json"))
            .unwrap();
        assert_eq!(source.source_name(), "DK WIN");
    }

    #[test]
    fn test_factory_rejects_push_config() {
        let factory = HttpSourceFactory;
        let config = IngestConfig::Push {
            validation: ValidationMode::Lenient,
        };

        assert!(matches!(factory.create(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_register() {
        let registry = SourceRegistry::new();
        register(&registry);

        assert!(registry.has_source("http"));
        assert!(registry.create_source(&poll_config("http://127.0.0.1:1/feed.json")).is_ok());
    }

    #[test]
    fn test_non_json_body_is_upstream_error() {
        let err = parse_document("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(_)));
    }

    #[test]
    fn test_wingo_document_extracts() {
        let document =
            parse_document(r#"{"data":[{"issueNumber":"20240101100010001","number":"4"}]}"#)
                .unwrap();
        let draft = FieldAliases::default().extract(&document).unwrap();

        assert_eq!(draft.period.as_deref(), Some("20240101100010001"));
    }

    #[tokio::test]
    async fn test_unreachable_feed_is_upstream_error() {
        let source = HttpResultSource::with_options(
            "http://127.0.0.1:1/feed.json",
            "test",
            FieldAliases::default(),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::UpstreamFetch(_)));
    }
}
