//! Multi-window rate limiting (§4.8): 100 requests/minute, 1000/hour, and a
//! burst allowance of 10 requests/10s, keyed by client identity (an
//! `x-client-id` header if the caller sent one, else their peer address).
//!
//! `tower_governor`'s `GovernorConfigBuilder` only expresses a single
//! per-second-plus-burst model, not three independent concurrent windows,
//! so this is a small dashmap-based counter instead — the same
//! fixed-window-with-reset shape `gateway_auth::lockout::LockoutTracker`
//! already uses for login attempt tracking.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gateway_core::Clock;
use serde::Serialize;

use crate::state::AppState;

struct WindowCounter {
    count: u32,
    window_started_at: DateTime<Utc>,
}

impl WindowCounter {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self { count: 1, window_started_at: now }
    }
}

struct ClientBuckets {
    burst: WindowCounter,
    minute: WindowCounter,
    hour: WindowCounter,
}

pub struct Violation {
    pub window: &'static str,
    pub limit: u32,
    pub retry_after_secs: u64,
}

/// Tracks per-client request counts across three independent fixed windows.
pub struct RateLimiter {
    per_minute: u32,
    per_hour: u32,
    burst: u32,
    clients: DashMap<String, ClientBuckets>,
}

const BURST_WINDOW: chrono::Duration = chrono::Duration::seconds(10);
const MINUTE_WINDOW: chrono::Duration = chrono::Duration::seconds(60);
const HOUR_WINDOW: chrono::Duration = chrono::Duration::seconds(3600);

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32, burst: u32) -> Self {
        Self { per_minute, per_hour, burst, clients: DashMap::new() }
    }

    /// Increments every window's counter, resetting any window whose
    /// period has elapsed, and reports the tightest violated constraint (if
    /// any). Exceeding one window still counts the request against the
    /// others, matching how a real sliding limiter would charge it.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Result<(), Violation> {
        let mut entry = self.clients.entry(key.to_string()).or_insert_with(|| ClientBuckets {
            burst: WindowCounter::fresh(now),
            minute: WindowCounter::fresh(now),
            hour: WindowCounter::fresh(now),
        });

        let burst_violation = bump(&mut entry.burst, now, BURST_WINDOW, self.burst, "burst");
        let minute_violation = bump(&mut entry.minute, now, MINUTE_WINDOW, self.per_minute, "minute");
        let hour_violation = bump(&mut entry.hour, now, HOUR_WINDOW, self.per_hour, "hour");

        burst_violation.or(minute_violation).or(hour_violation).map_or(Ok(()), Err)
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) {
        self.clients.retain(|_, buckets| now - buckets.hour.window_started_at <= HOUR_WINDOW);
    }
}

fn bump(counter: &mut WindowCounter, now: DateTime<Utc>, period: chrono::Duration, limit: u32, label: &'static str) -> Option<Violation> {
    if now - counter.window_started_at > period {
        counter.count = 0;
        counter.window_started_at = now;
    }
    counter.count += 1;
    if counter.count > limit {
        let retry_after_secs = (period - (now - counter.window_started_at)).num_seconds().max(0) as u64;
        Some(Violation { window: label, limit, retry_after_secs })
    } else {
        None
    }
}

#[derive(Serialize)]
struct RateLimitBody {
    error: String,
    status_code: u16,
    window: &'static str,
    limit: u32,
}

fn client_identity<B>(req: &Request<B>) -> String {
    if let Some(header) = req.headers().get("x-client-id").and_then(|v| v.to_str().ok()) {
        return header.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request<axum::body::Body>, next: Next) -> Response {
    let key = client_identity(&req);
    let now = state.clock.now();

    match state.rate_limiter.check(&key, now) {
        Ok(()) => next.run(req).await,
        Err(violation) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(RateLimitBody {
                    error: format!("rate limit exceeded ({} window)", violation.window),
                    status_code: 429,
                    window: violation.window,
                    limit: violation.limit,
                }),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&violation.retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn allows_requests_under_every_window() {
        let limiter = RateLimiter::new(100, 1000, 10);
        for _ in 0..10 {
            assert!(limiter.check("client-a", at(0)).is_ok());
        }
    }

    #[test]
    fn burst_window_trips_before_the_minute_window() {
        let limiter = RateLimiter::new(100, 1000, 10);
        for _ in 0..10 {
            limiter.check("client-a", at(0)).unwrap();
        }
        let violation = limiter.check("client-a", at(0)).unwrap_err();
        assert_eq!(violation.window, "burst");
    }

    #[test]
    fn burst_window_resets_after_its_period() {
        let limiter = RateLimiter::new(100, 1000, 10);
        for _ in 0..10 {
            limiter.check("client-a", at(0)).unwrap();
        }
        assert!(limiter.check("client-a", at(11)).is_ok());
    }

    #[test]
    fn distinct_clients_have_independent_counters() {
        let limiter = RateLimiter::new(100, 1000, 1);
        limiter.check("client-a", at(0)).unwrap();
        assert!(limiter.check("client-b", at(0)).is_ok());
    }
}
