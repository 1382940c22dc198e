//! # Rate Limiting
//!
//! Fixed-window, per-client limiter for the public endpoints that touch the
//! database without a session (coupon validation, newsletter signup).
//!
//! ```text
//! client key ──► window start + count
//!                   │
//!                   ├── window elapsed  → reset to count 1
//!                   ├── count < max     → count += 1, allow
//!                   └── count == max    → 429, Retry-After = window left
//! ```
//!
//! State is in memory and per process.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-client request limiter.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request from `key`.
    ///
    /// ## Returns
    /// * `Err(ApiError::RateLimited)` - the client used up its window
    pub async fn check(&self, key: &str) -> Result<(), ApiError> {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;

        // Evict expired windows once the map gets large.
        if clients.len() > 10_000 {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            debug!(client = %key, "Rate limit hit");
            return Err(ApiError::RateLimited {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }
}

/// Identifies the caller: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the socket address.
pub fn client_key(parts: &Parts) -> String {
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_limits_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        limiter.check("1.1.1.1").await.unwrap();
        limiter.check("1.1.1.1").await.unwrap();
        let err = limiter.check("1.1.1.1").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_after_secs } if retry_after_secs >= 59));

        // Other clients are unaffected.
        limiter.check("2.2.2.2").await.unwrap();
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));

        limiter.check("1.1.1.1").await.unwrap();
        assert!(limiter.check("1.1.1.1").await.is_err());

        tokio::time::sleep(Duration::from_millis(30)).await;
        limiter.check("1.1.1.1").await.unwrap();
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let (parts, _) = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(client_key(&parts), "203.0.113.7");

        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(client_key(&parts), "unknown");
    }
}
