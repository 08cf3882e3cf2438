/// Rate limiting for the public routes
///
/// Token bucket per client address, kept in process memory. Applied to
/// `/api/auth/*` and `/api/contact` submissions.
///
/// # Algorithm
///
/// - Each client starts with a full bucket of `requests_per_minute` tokens
/// - Tokens refill continuously at `requests_per_minute / 60` per second
/// - Each request consumes 1 token; an empty bucket means 429
///
/// # Client Key
///
/// The peer address from `ConnectInfo`. With `TRUST_PROXY` set, the first
/// `X-Forwarded-For` entry wins when present.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: tokens left after this request
/// - `Retry-After`: seconds to wait (429 responses only)

use crate::{app::AppState, error::ApiError};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Buckets idle this long are dropped during cleanup
const BUCKET_IDLE_TTL: Duration = Duration::from_secs(120);

/// Cleanup runs once the map grows past this many clients
const CLEANUP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub requests_per_minute: u32,

    /// Tokens per second
    pub refill_rate: f64,

    /// Burst capacity
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);

        Self {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, rate: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil().max(1.0) as u64
        }
    }
}

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,

    /// Seconds until the next request would be allowed (0 when allowed)
    pub retry_after: u64,
}

/// In-memory token buckets keyed by client
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Consumes a token for `key`
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let RateLimit {
            refill_rate,
            bucket_capacity,
            ..
        } = self.limit;

        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() > CLEANUP_THRESHOLD {
            buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < BUCKET_IDLE_TTL);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(bucket_capacity, now));
        bucket.refill(refill_rate, bucket_capacity, now);

        let allowed = bucket.try_consume();

        RateLimitDecision {
            allowed,
            remaining: bucket.tokens.floor().max(0.0) as u32,
            retry_after: if allowed {
                0
            } else {
                bucket.seconds_until_available(refill_rate)
            },
        }
    }
}

/// Identifies the client a request counts against
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_proxy)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Rate limiting middleware
///
/// # Errors
///
/// - 429 Too Many Requests, with `Retry-After`, when the bucket is empty
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.config.rate_limit.trust_proxy);

    let decision = state.rate_limiter.check(&key);
    let limit = state.rate_limiter.limit();

    if !decision.allowed {
        tracing::warn!(
            client = %key,
            path = %request.uri().path(),
            retry_after = decision.retry_after,
            "Rate limit exceeded"
        );
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after,
            message: format!(
                "Too many requests, please try again in {} seconds",
                decision.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit.requests_per_minute));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(60);
        assert_eq!(limit.bucket_capacity, 60);
        assert_eq!(limit.refill_rate, 1.0);

        assert_eq!(RateLimit::per_minute(0).requests_per_minute, 1);
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::new(2, Instant::now());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.tokens, 0.0);
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let start = Instant::now();
        let mut bucket = TokenBucket {
            tokens: 5.0,
            last_refill: start,
        };

        bucket.refill(1.0, 100, start + Duration::from_secs(10));
        assert!((bucket.tokens - 15.0).abs() < 0.001);

        bucket.refill(1.0, 20, start + Duration::from_secs(60));
        assert_eq!(bucket.tokens, 20.0);
    }

    #[test]
    fn test_seconds_until_available() {
        let bucket = TokenBucket {
            tokens: 0.25,
            last_refill: Instant::now(),
        };
        // 0.75 tokens short at 0.5 tokens/sec
        assert_eq!(bucket.seconds_until_available(0.5), 2);
    }

    #[test]
    fn test_limiter_blocks_after_capacity() {
        let limiter = RateLimiter::new(RateLimit::per_minute(3));
        let now = Instant::now();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_at("10.0.0.1", now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check_at("10.0.0.1", now);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, 20);

        // Other clients have their own bucket
        assert!(limiter.check_at("10.0.0.2", now).allowed);
        assert_eq!(limiter.buckets.lock().unwrap().len(), 2);

        // One token back after 20 seconds
        assert!(limiter.check_at("10.0.0.1", now + Duration::from_secs(20)).allowed);
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.5");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");
        assert_eq!(client_key(&headers, None, true), "203.0.113.9");
    }

    #[test]
    fn test_forwarded_for_ignored_without_trust_proxy() {
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));

        assert_eq!(client_key(&headers, Some(peer), false), "192.168.1.5");
        assert_eq!(client_key(&headers, None, false), "unknown");
    }
}
