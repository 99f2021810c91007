//! Field-alias extraction for polled documents
//!
//! Upstream feeds disagree on field names (`issueNumber` vs `issue`,
//! `number` vs `currentNumbers`, ...). Instead of fallback chains at each
//! call site, every accepted name lives in an ordered alias list and the
//! first present, non-empty field wins.
//!
//! ## Payload location
//!
//! 1. `data` is an array → its first element (empty array is an error)
//! 2. `data.list` is an array → its first element (empty list is an error)
//! 3. `data` is an object → that object
//! 4. otherwise → the document root

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::record::{RecordDraft, scalar_to_string};

/// Ordered alias lists, first match wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAliases {
    #[serde(default = "default_period_aliases")]
    pub period: Vec<String>,
    #[serde(default = "default_numbers_aliases")]
    pub numbers: Vec<String>,
    #[serde(default = "default_timer_aliases")]
    pub timer: Vec<String>,
    #[serde(default = "default_market_aliases")]
    pub market: Vec<String>,
    #[serde(default = "default_timestamp_aliases")]
    pub timestamp: Vec<String>,
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            period: default_period_aliases(),
            numbers: default_numbers_aliases(),
            timer: default_timer_aliases(),
            market: default_market_aliases(),
            timestamp: default_timestamp_aliases(),
        }
    }
}

impl FieldAliases {
    /// Pull a draft out of a polled document
    ///
    /// # Errors
    ///
    /// `UpstreamFetch` if the document has no usable payload or no period.
    pub fn extract(&self, document: &Value) -> Result<RecordDraft> {
        let payload = locate_payload(document)?;

        let period = first_scalar(payload, &self.period).ok_or_else(|| {
            Error::upstream(format!(
                "no period field found (tried {})",
                self.period.join(", ")
            ))
        })?;

        Ok(RecordDraft {
            period: Some(period),
            numbers: first_present(payload, &self.numbers).cloned(),
            timer: first_scalar(payload, &self.timer),
            market: first_scalar(payload, &self.market),
            timestamp: first_scalar(payload, &self.timestamp),
        })
    }
}

fn locate_payload(document: &Value) -> Result<&Map<String, Value>> {
    let root = document
        .as_object()
        .ok_or_else(|| Error::upstream("document is not a JSON object"))?;

    let Some(data) = root.get("data") else {
        return Ok(root);
    };

    match data {
        Value::Array(items) => first_object(items),
        Value::Object(inner) => match inner.get("list") {
            Some(Value::Array(items)) => first_object(items),
            _ => Ok(inner),
        },
        Value::Null => Err(Error::upstream("empty data")),
        _ => Err(Error::upstream("data is neither an object nor an array")),
    }
}

fn first_object(items: &[Value]) -> Result<&Map<String, Value>> {
    items
        .first()
        .ok_or_else(|| Error::upstream("empty data"))?
        .as_object()
        .ok_or_else(|| Error::upstream("data entry is not an object"))
}

fn first_present<'a>(payload: &'a Map<String, Value>, aliases: &[String]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|name| payload.get(name))
        .find(|v| !v.is_null())
}

fn first_scalar(payload: &Map<String, Value>, aliases: &[String]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|name| payload.get(name))
        .find_map(scalar_to_string)
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_period_aliases() -> Vec<String> {
    aliases(&["issueNumber", "issue", "currentPeriod", "period"])
}

fn default_numbers_aliases() -> Vec<String> {
    aliases(&["number", "numbers", "currentNumbers"])
}

fn default_timer_aliases() -> Vec<String> {
    aliases(&["timer", "countdown"])
}

fn default_market_aliases() -> Vec<String> {
    aliases(&["market", "game"])
}

fn default_timestamp_aliases() -> Vec<String> {
    aliases(&["timestamp", "drawTime"])
}
