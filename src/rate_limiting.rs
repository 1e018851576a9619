// ABOUTME: Per-IP rate limiting for the authorization endpoints
// ABOUTME: Fixed one-minute windows tracked in process memory, checked by handlers before work
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Lantern

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-endpoint request limits per one-minute window
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub authorize_per_minute: u32,
    pub login_per_minute: u32,
    pub token_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            authorize_per_minute: 60,
            login_per_minute: 20,
            token_per_minute: 120,
        }
    }
}

impl RateLimitConfig {
    fn limit_for(&self, endpoint: &str) -> u32 {
        match endpoint {
            "authorize" => self.authorize_per_minute,
            "login" => self.login_per_minute,
            "token" => self.token_per_minute,
            _ => self.token_per_minute,
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    pub is_limited: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets, for the `Retry-After` header
    pub retry_after_seconds: u64,
}

/// Rate limiter with per-IP tracking
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateLimiterState>>,
    config: RateLimitConfig,
}

struct RateLimiterState {
    /// Per (endpoint, IP) tracking: key -> (request count, window start)
    requests: HashMap<(&'static str, IpAddr), (u32, Instant)>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterState {
                requests: HashMap::new(),
            })),
            config,
        }
    }

    /// Check and count a request for an endpoint and client IP
    #[must_use]
    pub fn check(&self, endpoint: &'static str, client_ip: IpAddr) -> RateLimitStatus {
        let limit = self.config.limit_for(endpoint);
        let now = Instant::now();
        let window = Duration::from_secs(60);

        let mut state = self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Rate limiter lock poisoned, recovering");
            poisoned.into_inner()
        });

        // Drop entries idle for more than two windows
        state
            .requests
            .retain(|_key, (_count, start)| now.duration_since(*start) < window * 2);

        let (count, window_start) = state
            .requests
            .entry((endpoint, client_ip))
            .or_insert((0, now));

        if now.duration_since(*window_start) >= window {
            *count = 0;
            *window_start = now;
        }

        let is_limited = *count >= limit;
        if !is_limited {
            *count += 1;
        }
        let remaining = limit.saturating_sub(*count);
        let retry_after_seconds = window
            .saturating_sub(now.duration_since(*window_start))
            .as_secs()
            .max(1);

        if is_limited {
            tracing::warn!(endpoint, %client_ip, limit, retry_after_seconds, "Rate limit exceeded");
        }

        RateLimitStatus {
            is_limited,
            limit,
            remaining,
            retry_after_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_limit_enforced_within_window() {
        let limiter = RateLimiter::new(RateLimitConfig {
            authorize_per_minute: 3,
            login_per_minute: 3,
            token_per_minute: 3,
        });

        for _ in 0..3 {
            assert!(!limiter.check("authorize", ip(1)).is_limited);
        }
        assert!(limiter.check("authorize", ip(1)).is_limited);
    }

    #[test]
    fn test_limits_are_per_ip() {
        let limiter = RateLimiter::new(RateLimitConfig {
            authorize_per_minute: 1,
            login_per_minute: 1,
            token_per_minute: 1,
        });

        assert!(!limiter.check("login", ip(1)).is_limited);
        assert!(limiter.check("login", ip(1)).is_limited);
        assert!(!limiter.check("login", ip(2)).is_limited);
    }

    #[test]
    fn test_limits_are_per_endpoint() {
        let limiter = RateLimiter::new(RateLimitConfig {
            authorize_per_minute: 1,
            login_per_minute: 1,
            token_per_minute: 1,
        });

        assert!(!limiter.check("authorize", ip(1)).is_limited);
        assert!(!limiter.check("token", ip(1)).is_limited);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = RateLimiter::new(RateLimitConfig {
            authorize_per_minute: 2,
            login_per_minute: 2,
            token_per_minute: 2,
        });

        assert_eq!(limiter.check("token", ip(9)).remaining, 1);
        assert_eq!(limiter.check("token", ip(9)).remaining, 0);
    }

    #[test]
    fn test_retry_after_stays_within_the_window() {
        let limiter = RateLimiter::new(RateLimitConfig {
            authorize_per_minute: 1,
            login_per_minute: 1,
            token_per_minute: 1,
        });

        limiter.check("authorize", ip(3));
        let status = limiter.check("authorize", ip(3));
        assert!(status.is_limited);
        assert!(status.retry_after_seconds >= 1);
        assert!(status.retry_after_seconds <= 60);
    }
}
