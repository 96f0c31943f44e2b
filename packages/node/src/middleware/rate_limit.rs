//! Per-IP fixed-window rate limiting.
//!
//! Each client IP may make `max_per_minute` requests per 60-second window.
//! The IP is taken from `X-Forwarded-For` (leftmost entry), then `X-Real-IP`,
//! then the shared `"unknown"` key. Over the limit the request is answered
//! with 429 and a `Retry-After` header; the handler never runs.
//!
//! A limit of `0` disables the limiter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use kinship_node_api::{error::codes, ErrorResponse};

/// Buckets are swept once the table grows past this many keys.
const SWEEP_THRESHOLD: usize = 10_000;

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Fixed-window per-IP request counter.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_per_window: u32,
    window: Duration,
}

struct Window {
    started: Instant,
    count: u32,
}

/// The request was refused; retry after this many seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exceeded {
    pub retry_after_secs: u64,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self::with_window(max_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(max_per_window: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_per_window,
            window,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_per_window > 0
    }

    /// Count one request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), Exceeded> {
        if !self.is_enabled() {
            return Ok(());
        }
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= SWEEP_THRESHOLD {
            let span = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }

        let w = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.duration_since(w.started);
        if elapsed >= self.window {
            w.started = now;
            w.count = 0;
        }
        if w.count >= self.max_per_window {
            let remaining = self.window.saturating_sub(elapsed);
            return Err(Exceeded {
                retry_after_secs: remaining.as_secs().max(1),
            });
        }
        w.count += 1;
        Ok(())
    }

    pub fn check(&self, key: &str) -> Result<(), Exceeded> {
        self.check_at(key, Instant::now())
    }
}

// ---------------------------------------------------------------------------
// Middleware function
// ---------------------------------------------------------------------------

/// Axum `from_fn` middleware enforcing the limiter.
pub async fn rate_limit_middleware(limiter: Arc<RateLimiter>, req: Request, next: Next) -> Response {
    let key = client_key(req.headers());
    match limiter.check(&key) {
        Ok(()) => next.run(req).await,
        Err(Exceeded { retry_after_secs }) => {
            tracing::debug!(client = %key, retry_after_secs, "rate limit exceeded");
            let body = ErrorResponse::new(
                codes::RATE_LIMIT_EXCEEDED,
                "Too many requests. Please try again later.",
            );
            let mut resp = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            resp
        }
    }
}

/// The key a request is counted under.
fn client_key(headers: &HeaderMap) -> String {
    if let Some(first) = header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return first.to_string();
    }
    header_str(headers, "x-real-ip")
        .unwrap_or("unknown")
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_limiter_never_refuses() {
        let rl = RateLimiter::new(0);
        assert!(!rl.is_enabled());
        for _ in 0..500 {
            assert!(rl.check("10.0.0.1").is_ok());
        }
    }

    #[test]
    fn refuses_past_the_cap_until_window_rolls() {
        let rl = RateLimiter::with_window(2, Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(rl.check_at("a", t0).is_ok());
        assert!(rl.check_at("a", t0).is_ok());

        let refused = rl.check_at("a", t0 + Duration::from_secs(20)).unwrap_err();
        assert_eq!(refused.retry_after_secs, 40);

        // Other clients are unaffected.
        assert!(rl.check_at("b", t0).is_ok());

        // A new window starts fresh.
        assert!(rl.check_at("a", t0 + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn key_prefers_forwarded_for() {
        let mut h = HeaderMap::new();
        assert_eq!(client_key(&h), "unknown");

        h.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_key(&h), "9.9.9.9");

        h.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        assert_eq!(client_key(&h), "1.2.3.4");
    }
}
