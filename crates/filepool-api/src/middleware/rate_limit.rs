//! Per-client request rate limiting.
//!
//! A fixed-window in-memory limiter keyed by validated client IP. Buckets are
//! cleaned up lazily when the map grows past its cap, so an attacker rotating
//! spoofed IPs cannot grow memory without bound.

use crate::utils::ip_extraction::extract_client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW_SECONDS: u64 = 60;
const MAX_BUCKETS: usize = 10_000;

#[derive(Clone)]
struct RateLimitBucket {
    count: u32,
    reset_at: Instant,
}

impl RateLimitBucket {
    fn new() -> Self {
        Self {
            count: 0,
            reset_at: Instant::now() + Duration::from_secs(WINDOW_SECONDS),
        }
    }

    fn check_and_increment(&mut self, limit: u32) -> (bool, u32) {
        let now = Instant::now();

        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + Duration::from_secs(WINDOW_SECONDS);
        }

        if self.count < limit {
            self.count += 1;
            (true, limit.saturating_sub(self.count))
        } else {
            (false, 0)
        }
    }

    fn reset_in(&self) -> Duration {
        self.reset_at.saturating_duration_since(Instant::now())
    }
}

/// Simple in-memory rate limiter for HTTP requests
pub struct HttpRateLimiter {
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
    limit_per_minute: u32,
    trusted_proxy_count: usize,
}

impl HttpRateLimiter {
    pub fn new(limit_per_minute: u32, trusted_proxy_count: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limit_per_minute,
            trusted_proxy_count,
        }
    }

    pub async fn check_rate_limit(&self, key: &str) -> Result<u32, Duration> {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= MAX_BUCKETS {
            let now = Instant::now();
            buckets.retain(|_key, bucket| bucket.reset_at > now);

            // Still at capacity after dropping expired buckets: evict the
            // bucket closest to reset.
            if buckets.len() >= MAX_BUCKETS {
                let oldest_key = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(k, _)| k.clone());
                if let Some(key_to_remove) = oldest_key {
                    buckets.remove(&key_to_remove);
                    tracing::debug!(
                        removed_key = %key_to_remove,
                        "Evicted oldest rate limit bucket due to capacity limit"
                    );
                }
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(RateLimitBucket::new);

        let (allowed, remaining) = bucket.check_and_increment(self.limit_per_minute);
        if allowed {
            Ok(remaining)
        } else {
            Err(bucket.reset_in())
        }
    }
}

/// HTTP rate limiting middleware
///
/// Adds `X-RateLimit-Limit` and `X-RateLimit-Remaining` to responses, and
/// `Retry-After` on 429 responses.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<HttpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|connect_info| connect_info.0);
    let ip = extract_client_ip(
        request.headers(),
        socket_addr.as_ref(),
        rate_limiter.trusted_proxy_count,
    );
    let rate_limit_key = format!("ip:{}", ip);
    let limit = rate_limiter.limit_per_minute;

    match rate_limiter.check_rate_limit(&rate_limit_key).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;

            if let Ok(header_value) = HeaderValue::from_str(&limit.to_string()) {
                response
                    .headers_mut()
                    .insert("X-RateLimit-Limit", header_value);
            }
            if let Ok(header_value) = HeaderValue::from_str(&remaining.to_string()) {
                response
                    .headers_mut()
                    .insert("X-RateLimit-Remaining", header_value);
            }

            response
        }
        Err(reset_in) => {
            tracing::warn!(
                key = %rate_limit_key,
                limit = limit,
                path = %request.uri().path(),
                "Rate limit exceeded"
            );

            let reset_seconds = reset_in.as_secs().max(1);

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(serde_json::json!({
                    "success": false,
                    "message": "Too many requests. Please slow down."
                })),
            )
                .into_response();

            if let Ok(header_value) = HeaderValue::from_str(&limit.to_string()) {
                response
                    .headers_mut()
                    .insert("X-RateLimit-Limit", header_value);
            }
            response
                .headers_mut()
                .insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            if let Ok(header_value) = HeaderValue::from_str(&reset_seconds.to_string()) {
                response.headers_mut().insert("Retry-After", header_value);
            }

            response
        }
    }
}
