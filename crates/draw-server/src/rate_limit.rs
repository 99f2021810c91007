//! Fixed-window rate limiting for the write endpoint
//!
//! Each client gets `max_requests` per window. The window starts with the
//! client's first request and resets once it has fully elapsed.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use draw_core::config::RateLimitConfig;
use std::net::SocketAddr;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Tracked clients before stale windows are swept
const PRUNE_THRESHOLD: usize = 1024;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    /// Requests used in the current window
    request_count: u32,
    /// When the current window started
    window_start: Instant,
}

/// Per-client fixed-window counter
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl RateLimiter {
    /// `max_requests == 0` disables limiting
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    /// A limiter that allows everything
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_requests > 0 && !self.window.is_zero()
    }

    /// Count one request from `client`
    pub async fn check(&self, client: &str) -> Decision {
        if !self.is_enabled() {
            return Decision::Allowed {
                remaining: u32::MAX,
            };
        }

        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        if clients.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.window_start) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(ClientWindow {
            request_count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.request_count = 0;
            entry.window_start = now;
        }

        if entry.request_count >= self.max_requests {
            let elapsed = now.duration_since(entry.window_start);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        entry.request_count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.request_count,
        }
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}

/// Identify the caller: first `X-Forwarded-For` entry, then the peer address
pub fn client_key(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(ConnectInfo(addr))) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_window_budget_and_reset() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert_eq!(limiter.check("a").await, Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("a").await, Decision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check("a").await, Decision::Limited { .. }));

        // Other clients have their own budget
        assert_eq!(limiter.check("b").await, Decision::Allowed { remaining: 1 });

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.check("a").await, Decision::Allowed { remaining: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_counts_down() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check("a").await;

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(
            limiter.check("a").await,
            Decision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter::disabled();
        for _ in 0..1000 {
            assert!(matches!(limiter.check("a").await, Decision::Allowed { .. }));
        }
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_windows_pruned() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1));
        for n in 0..PRUNE_THRESHOLD {
            limiter.check(&format!("client-{}", n)).await;
        }
        assert_eq!(limiter.tracked_clients().await, PRUNE_THRESHOLD);

        tokio::time::advance(Duration::from_secs(2)).await;
        limiter.check("fresh").await;
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 51000)));

        assert_eq!(client_key(&headers, None), "unknown");
        assert_eq!(client_key(&headers, Some(&peer)), "10.0.0.7");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(&peer)), "203.0.113.9");
    }
}
