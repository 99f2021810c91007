// # Result Records
//
// One normalized lottery round result, plus the un-normalized draft that
// ingest paths produce before validation.
//
// Drafts come from two places:
// - the push body (`POST /api/live`), via `RecordDraft::from_json`
// - poll extraction, via `FieldAliases::extract`
//
// `RecordDraft::normalize` is the only place defaults and validation apply.
// Server-assigned fields (`receivedAt`) are always set there and never
// taken from the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Timer value used when the caller does not provide one
pub const DEFAULT_TIMER: &str = "00:00";

/// Market label used when neither caller nor configuration provide one
pub const DEFAULT_MARKET: &str = "WinGo_1M";

/// A normalized lottery round result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Round identifier, natural key for replacement and mirroring
    pub period: String,
    /// Drawn values in draw order
    pub numbers: Vec<u32>,
    /// Countdown / timestamp hint
    pub timer: String,
    /// Game or market label
    pub market: String,
    /// Creation time reported by the producer (or ingestion time)
    pub timestamp: DateTime<Utc>,
    /// Server-assigned ingestion time
    pub received_at: DateTime<Utc>,
}

impl ResultRecord {
    /// Create a record stamped with the current time and default labels
    ///
    /// Always uses `DEFAULT_TIMER` and `DEFAULT_MARKET`; configured labels are
    /// only applied by [`RecordDraft::normalize`].
    pub fn new(period: impl Into<String>, numbers: Vec<u32>) -> Self {
        let now = Utc::now();
        Self {
            period: period.into(),
            numbers,
            timer: DEFAULT_TIMER.to_string(),
            market: DEFAULT_MARKET.to_string(),
            timestamp: now,
            received_at: now,
        }
    }
}

/// How strictly incoming drafts are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ValidationMode {
    /// Reject drafts without exactly `arity` numbers or with a bad timestamp
    Strict {
        /// Number of drawn values expected per round
        arity: usize,
    },
    /// Fill missing or malformed optional fields with defaults
    #[default]
    Lenient,
}

impl ValidationMode {
    /// Whether malformed optional fields are rejected
    pub fn is_strict(&self) -> bool {
        matches!(self, ValidationMode::Strict { .. })
    }
}

/// Fallback values applied during normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefaults {
    /// Market label for drafts without one
    pub market: String,
    /// Timer value for drafts without one
    pub timer: String,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        Self {
            market: DEFAULT_MARKET.to_string(),
            timer: DEFAULT_TIMER.to_string(),
        }
    }
}

/// An un-normalized record as received from a push body or a poll source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub period: Option<String>,
    /// Raw JSON value; see [`parse_numbers`] for the accepted shapes
    pub numbers: Option<Value>,
    pub timer: Option<String>,
    pub market: Option<String>,
    /// RFC 3339 text
    pub timestamp: Option<String>,
}

impl RecordDraft {
    /// Build a draft from a push body
    ///
    /// The body must be a JSON object. Unknown fields, including any
    /// caller-supplied `receivedAt` or `lastUpdate`, are ignored.
    pub fn from_json(body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::validation("body must be a JSON object"))?;

        Ok(Self {
            period: object.get("period").and_then(scalar_to_string),
            numbers: object.get("numbers").filter(|v| !v.is_null()).cloned(),
            timer: object.get("timer").and_then(scalar_to_string),
            market: object.get("market").and_then(scalar_to_string),
            timestamp: object.get("timestamp").and_then(scalar_to_string),
        })
    }

    /// Validate the draft and fill defaults
    ///
    /// `period` is required in every mode. `now` becomes `received_at`, and
    /// `timestamp` when the draft has none.
    pub fn normalize(
        self,
        mode: ValidationMode,
        defaults: &RecordDefaults,
        now: DateTime<Utc>,
    ) -> Result<ResultRecord> {
        let period = self
            .period
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::validation("period is required"))?;

        let numbers = match mode {
            ValidationMode::Strict { arity } => {
                let raw = self
                    .numbers
                    .ok_or_else(|| Error::validation("numbers is required"))?;
                let parsed = parse_numbers(&raw).ok_or_else(|| {
                    Error::validation("numbers must be a list of non-negative integers")
                })?;
                if parsed.len() != arity {
                    return Err(Error::validation(format!(
                        "numbers must contain exactly {} values, got {}",
                        arity,
                        parsed.len()
                    )));
                }
                parsed
            }
            ValidationMode::Lenient => self
                .numbers
                .as_ref()
                .and_then(parse_numbers)
                .unwrap_or_default(),
        };

        let timestamp = match self.timestamp {
            None => now,
            Some(text) => match DateTime::parse_from_rfc3339(text.trim()) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) if mode.is_strict() => {
                    return Err(Error::validation(format!(
                        "timestamp '{}' is not RFC 3339: {}",
                        text, e
                    )));
                }
                Err(_) => now,
            },
        };

        Ok(ResultRecord {
            period,
            numbers,
            timer: self
                .timer
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| defaults.timer.clone()),
            market: self
                .market
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| defaults.market.clone()),
            timestamp,
            received_at: now,
        })
    }
}

/// Coerce a JSON scalar into a non-empty string
///
/// Periods are often published as bare integers, so numbers are accepted.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse drawn values from the shapes seen in the wild
///
/// Accepts an array of integers or numeric strings, a single integer, or a
/// string of integers separated by commas or whitespace (`"7"`, `"1,2,3"`).
/// Returns `None` when any element is not a `u32`.
pub fn parse_numbers(value: &Value) -> Option<Vec<u32>> {
    match value {
        Value::Array(items) => items.iter().map(parse_single).collect(),
        Value::Number(_) => parse_single(value).map(|n| vec![n]),
        Value::String(text) => {
            let parts: Vec<&str> = text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.is_empty() {
                return None;
            }
            parts.iter().map(|p| p.parse::<u32>().ok()).collect()
        }
        _ => None,
    }
}

fn parse_single(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
