use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use draw_core::{IngestMode, RecordDraft, ResultRecord};
use draw_core::store::FetchStats;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::rate_limit::{Decision, client_key};
use crate::state::{AppState, MirrorHealth, rss_bytes};

pub type SharedState = Arc<AppState>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime: u64,
    pub memory: MemoryUsage,
    pub mode: IngestMode,
    pub queue_size: usize,
    pub total_received: u64,
    pub mirror: MirrorHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetches: Option<FetchStats>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss_bytes: Option<u64>,
}

/// The current record as served by `GET /api/live`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveData {
    #[serde(flatten)]
    pub record: ResultRecord,
    pub last_update: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct LiveResponse {
    /// false until the first record arrives
    pub status: bool,
    pub source: String,
    pub data: Option<LiveData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestResponse {
    pub current: Option<ResultRecord>,
    pub queue_size: usize,
    pub total_received: u64,
    pub server_time: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    limit: Option<String>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub history: Vec<ResultRecord>,
    /// Entries held, independent of `limit`
    pub total: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub status: &'static str,
    pub queue_size: usize,
    pub total_received: u64,
    pub period: String,
}

/// GET /
pub async fn banner_handler(State(state): State<SharedState>) -> impl IntoResponse {
    format!(
        "{} LIVE SERVER RUNNING ({} mode)",
        state.source_name.to_uppercase(),
        state.mode
    )
}

/// GET /health
pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let counts = state.history.counts().await;

    Json(HealthResponse {
        status: "ok",
        uptime: state.uptime_secs(),
        memory: MemoryUsage {
            rss_bytes: rss_bytes(),
        },
        mode: state.mode,
        queue_size: counts.queue_size,
        total_received: counts.total_received,
        mirror: state.mirror_health(),
        fetches: (state.mode == IngestMode::Poll).then(|| state.live.stats()),
        timestamp: Utc::now(),
    })
}

/// GET /api/live
pub async fn live_handler(State(state): State<SharedState>) -> Json<LiveResponse> {
    let current = match state.mode {
        IngestMode::Poll => state.live.get().await,
        IngestMode::Push => state.history.latest().await,
    };

    let data = current.map(|record| LiveData {
        last_update: record.received_at,
        record,
    });

    Json(LiveResponse {
        status: data.is_some(),
        source: state.source_name.clone(),
        data,
    })
}

/// GET /api/latest
pub async fn latest_handler(State(state): State<SharedState>) -> Json<LatestResponse> {
    let current = match state.mode {
        IngestMode::Poll => state.live.get().await,
        IngestMode::Push => state.history.latest().await,
    };
    let counts = state.history.counts().await;

    Json(LatestResponse {
        current,
        queue_size: counts.queue_size,
        total_received: counts.total_received,
        server_time: Utc::now(),
    })
}

/// GET /api/history?limit=N
pub async fn history_handler(
    State(state): State<SharedState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = match params.limit.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<usize>()
                .map_err(|_| ApiError::bad_request(format!("Invalid limit: {}", raw)))?,
        ),
    };

    let (history, total) = state.history.snapshot_with_len(limit).await;
    Ok(Json(HistoryResponse { history, total }))
}

/// POST /api/live
pub async fn push_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<PushResponse>, ApiError> {
    let client = client_key(&headers, peer.as_ref());
    if let Decision::Limited { retry_after } = state.limiter.check(&client).await {
        debug!("Rate limited {}", client);
        return Err(ApiError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        });
    }

    let ingestor = state
        .ingestor
        .as_ref()
        .ok_or_else(|| ApiError::Internal("push route without an ingestor".to_string()))?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("Empty request body"));
    }

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

    let draft = RecordDraft::from_json(&value)?;
    let receipt = ingestor.ingest(draft).await?;

    Ok(Json(PushResponse {
        status: "success",
        queue_size: receipt.queue_size,
        total_received: receipt.total_received,
        period: receipt.period,
    }))
}
