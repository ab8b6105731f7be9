//! Fixed-window request limits keyed by client address.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::config::{RateLimitsConfig, WindowLimit};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Live windows plus the time expired ones were last swept out.
#[derive(Debug)]
struct Windows {
    entries: HashMap<String, Window>,
    swept: Instant,
}

/// Counts hits per key inside fixed windows of `window` length.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max: u32,
    window: Duration,
    message: &'static str,
    windows: Mutex<Windows>,
}

impl FixedWindowLimiter {
    pub fn new(limit: WindowLimit, message: &'static str) -> Self {
        Self {
            max: limit.max,
            window: limit.window(),
            message,
            windows: Mutex::new(Windows {
                entries: HashMap::new(),
                swept: Instant::now(),
            }),
        }
    }

    /// Records a hit for `key`, failing once the window's budget is spent.
    pub fn check(&self, key: &str) -> Result<(), AppError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), AppError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| AppError::Internal("rate limiter lock poisoned".into()))?;

        let window = self.window;
        // Sweep at most once per window.
        if now.duration_since(windows.swept) >= window {
            windows
                .entries
                .retain(|_, w| now.duration_since(w.started) < window);
            windows.swept = now;
        }

        let fresh = Window {
            started: now,
            count: 0,
        };
        let entry = windows.entries.entry(key.to_string()).or_insert(fresh);
        if now.duration_since(entry.started) >= window {
            *entry = fresh;
        }

        if entry.count >= self.max {
            let remaining = window.saturating_sub(now.duration_since(entry.started));
            tracing::warn!("Rate limit hit for {}: {}", key, self.message);
            return Err(AppError::TooManyRequests {
                message: self.message.to_string(),
                retry_after: remaining.as_secs().max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }
}

pub struct RateLimits {
    pub threads: FixedWindowLimiter,
    pub posts: FixedWindowLimiter,
    pub votes: FixedWindowLimiter,
    pub auth: FixedWindowLimiter,
}

impl RateLimits {
    pub fn from_config(config: &RateLimitsConfig) -> Self {
        Self {
            threads: FixedWindowLimiter::new(
                config.threads,
                "Too many threads created. Please wait before creating another.",
            ),
            posts: FixedWindowLimiter::new(config.posts, "Too many posts. Please slow down."),
            votes: FixedWindowLimiter::new(config.votes, "Too many votes. Please slow down."),
            auth: FixedWindowLimiter::new(
                config.auth,
                "Too many authentication attempts. Please try again later.",
            ),
        }
    }
}

/// Selects which limiter a [`RateLimited`] extractor consults.
pub trait LimitPolicy {
    fn limiter(limits: &RateLimits) -> &FixedWindowLimiter;
}

pub struct ThreadLimit;
pub struct PostLimit;
pub struct VoteLimit;
pub struct AuthLimit;

impl LimitPolicy for ThreadLimit {
    fn limiter(limits: &RateLimits) -> &FixedWindowLimiter {
        &limits.threads
    }
}

impl LimitPolicy for PostLimit {
    fn limiter(limits: &RateLimits) -> &FixedWindowLimiter {
        &limits.posts
    }
}

impl LimitPolicy for VoteLimit {
    fn limiter(limits: &RateLimits) -> &FixedWindowLimiter {
        &limits.votes
    }
}

impl LimitPolicy for AuthLimit {
    fn limiter(limits: &RateLimits) -> &FixedWindowLimiter {
        &limits.auth
    }
}

/// Extractor that spends one hit of policy `P` for the calling address.
/// Place it after the auth extractor and before the body extractor.
pub struct RateLimited<P>(PhantomData<P>);

impl<P> FromRequestParts<AppState> for RateLimited<P>
where
    P: LimitPolicy + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = client_key(parts);
        P::limiter(&state.limits).check(&key)?;
        Ok(RateLimited(PhantomData))
    }
}

fn client_key(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, secs: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(WindowLimit::new(max, secs), "slow down")
    }

    #[test]
    fn allows_up_to_max_within_window() {
        let l = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(l.check_at("1.2.3.4", now).is_ok());
        }
        match l.check_at("1.2.3.4", now) {
            Err(AppError::TooManyRequests { retry_after, .. }) => {
                assert!(retry_after >= 1 && retry_after <= 60)
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn keys_are_independent() {
        let l = limiter(1, 60);
        let now = Instant::now();
        assert!(l.check_at("a", now).is_ok());
        assert!(l.check_at("b", now).is_ok());
        assert!(l.check_at("a", now).is_err());
    }

    #[test]
    fn window_resets_after_expiry() {
        let l = limiter(1, 10);
        let start = Instant::now();
        assert!(l.check_at("a", start).is_ok());
        assert!(l.check_at("a", start + Duration::from_secs(5)).is_err());
        assert!(l.check_at("a", start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn expired_windows_are_swept_once_per_window() {
        let l = limiter(5, 10);
        let start = Instant::now();
        l.check_at("a", start).unwrap();
        l.check_at("b", start + Duration::from_secs(5)).unwrap();
        assert_eq!(l.windows.lock().unwrap().entries.len(), 2);

        // "a" has expired and goes in the sweep; "b" is still live
        l.check_at("c", start + Duration::from_secs(12)).unwrap();
        let windows = l.windows.lock().unwrap();
        let mut keys: Vec<&str> = windows.entries.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn expired_key_restarts_without_a_sweep() {
        let l = limiter(1, 10);
        let start = Instant::now();
        l.check_at("a", start).unwrap();
        // Keep the sweep from running so the stale entry is still present
        l.windows.lock().unwrap().swept = start + Duration::from_secs(100);
        assert!(l.check_at("a", start + Duration::from_secs(11)).is_ok());
        assert!(l.check_at("a", start + Duration::from_secs(12)).is_err());
    }

    #[test]
    fn defaults_match_route_budgets() {
        let limits = RateLimits::from_config(&RateLimitsConfig::default());
        assert_eq!(limits.threads.max, 10);
        assert_eq!(limits.threads.window, Duration::from_secs(900));
        assert_eq!(limits.posts.max, 20);
        assert_eq!(limits.votes.max, 30);
        assert_eq!(limits.auth.max, 5);
    }
}
