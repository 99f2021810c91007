// # REST Mirror Sink
//
// This crate replicates accepted records to a keyed JSON document store with
// a plain REST surface (`PUT {base}/{path}/{key}.json`, `GET` returning
// `null` for missing keys), such as a realtime-database endpoint.
//
// ## Layout in the store
//
// - `{base}/{records_path}/{period}.json`: one document per round
// - `{base}/{queue_key}.json`: the mirror's own newest-first queue, capped
//   at `queue_capacity`
//
// ## Constraints
//
// - One attempt per call, no retries (a lost mirror write is acceptable)
// - Explicit client timeout on every request
// - The access token is sent as the `auth` query parameter and never
//   appears in logs, errors or `Debug` output

use async_trait::async_trait;
use draw_core::config::MirrorConfig;
use draw_core::record::ResultRecord;
use draw_core::traits::{MirrorSink, MirrorSinkFactory};
use draw_core::{Error, Result, SourceRegistry};
use serde_json::Value;
use std::time::Duration;

/// Default HTTP timeout for store requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters the store refuses in keys
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Mirror sink for a REST keyed document store
///
/// # Security
///
/// The Debug implementation does NOT expose the access token.
pub struct RestMirrorSink {
    /// Store root, without trailing slash
    base_url: String,

    /// Access token
    /// ⚠️ NEVER log this value
    auth_token: Option<String>,

    /// Collection holding one document per period
    records_path: String,

    /// Key of the bounded queue document
    queue_key: String,

    /// Maximum queue length kept remotely
    queue_capacity: usize,

    /// HTTP client for store requests
    client: reqwest::Client,
}

impl std::fmt::Debug for RestMirrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestMirrorSink")
            .field("base_url", &self.base_url)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("records_path", &self.records_path)
            .field("queue_key", &self.queue_key)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl RestMirrorSink {
    /// Create a new REST mirror sink
    ///
    /// # Parameters
    ///
    /// - `base_url`: Store root (e.g., "https://example-rtdb.firebaseio.com")
    /// - `auth_token`: Optional access token
    ///
    /// # Errors
    ///
    /// `Error::Config` for an empty base URL or a client that cannot be built.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("Mirror base URL cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            auth_token: auth_token.filter(|t| !t.is_empty()),
            records_path: "results".to_string(),
            queue_key: "live_queue".to_string(),
            queue_capacity: 100,
            client,
        })
    }

    /// Override the records collection path
    pub fn with_records_path(mut self, records_path: impl Into<String>) -> Self {
        self.records_path = records_path.into().trim_matches('/').to_string();
        self
    }

    /// Override the queue key and capacity
    pub fn with_queue(mut self, queue_key: impl Into<String>, capacity: usize) -> Self {
        self.queue_key = sanitize_key(&queue_key.into());
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(self)
    }

    /// Document URL for one period
    fn record_url(&self, period: &str) -> String {
        format!(
            "{}/{}/{}.json",
            self.base_url,
            self.records_path,
            sanitize_key(period)
        )
    }

    /// Document URL for the bounded queue
    fn queue_url(&self) -> String {
        format!("{}/{}.json", self.base_url, self.queue_key)
    }

    /// Attach the token, if any, as a query parameter
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    async fn put_json(&self, url: &str, body: &Value) -> Result<()> {
        let response = self
            .authorize(self.client.put(url))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::mirror(format!("HTTP request failed: {}", e.without_url())))?;

        check_status(response, "write").await?;
        Ok(())
    }

    /// Read the current queue; a missing document is an empty queue
    async fn read_queue(&self) -> Result<Vec<Value>> {
        let response = self
            .authorize(self.client.get(self.queue_url()))
            .send()
            .await
            .map_err(|e| Error::mirror(format!("HTTP request failed: {}", e.without_url())))?;

        let response = check_status(response, "queue read").await?;

        let document: Value = response
            .json()
            .await
            .map_err(|e| Error::mirror(format!("Failed to parse queue: {}", e.without_url())))?;

        Ok(match document {
            Value::Null => Vec::new(),
            Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).collect(),
            other => {
                tracing::warn!(
                    "Mirror queue {} is not an array ({}), starting over",
                    self.queue_key,
                    kind(&other)
                );
                Vec::new()
            }
        })
    }
}

/// Replace characters the store forbids in keys with `_`
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if FORBIDDEN_KEY_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Map a store response to an error by status code
async fn check_status(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());

    match status.as_u16() {
        401 | 403 => Err(Error::auth(format!(
            "Mirror rejected credentials. Status: {}",
            status
        ))),
        429 => Err(Error::rate_limited(format!(
            "Mirror rate limit exceeded. Status: {}",
            status
        ))),
        _ => Err(Error::mirror(format!(
            "Mirror {} failed: {} - {}",
            operation, status, error_text
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl MirrorSink for RestMirrorSink {
    async fn save_record(&self, record: &ResultRecord) -> Result<()> {
        let body = serde_json::to_value(record)?;
        self.put_json(&self.record_url(&record.period), &body).await?;

        tracing::debug!("Mirrored record {} to {}", record.period, self.records_path);
        Ok(())
    }

    async fn append_queue(&self, record: &ResultRecord) -> Result<usize> {
        let mut queue = self.read_queue().await?;

        queue.insert(0, serde_json::to_value(record)?);
        queue.truncate(self.queue_capacity);

        let len = queue.len();
        self.put_json(&self.queue_url(), &Value::Array(queue)).await?;

        Ok(len)
    }

    fn sink_name(&self) -> &'static str {
        "rest"
    }
}

/// Factory for creating REST mirror sinks
pub struct RestMirrorFactory;

impl MirrorSinkFactory for RestMirrorFactory {
    fn create(&self, config: &MirrorConfig) -> Result<Box<dyn MirrorSink>> {
        match config {
            MirrorConfig::Rest {
                base_url,
                auth_token,
                records_path,
                queue_key,
                queue_capacity,
                timeout_secs,
            } => {
                let sink = RestMirrorSink::new(base_url.clone(), auth_token.clone())?
                    .with_records_path(records_path.clone())
                    .with_queue(queue_key.clone(), *queue_capacity)
                    .with_timeout(Duration::from_secs(*timeout_secs))?;

                tracing::info!("REST mirror configured: {:?}", sink);
                Ok(Box::new(sink))
            }
            _ => Err(Error::config("Invalid config for REST mirror sink")),
        }
    }
}

/// Register the REST mirror sink with a registry
pub fn register(registry: &SourceRegistry) {
    registry.register_mirror("rest", Box::new(RestMirrorFactory));
}
