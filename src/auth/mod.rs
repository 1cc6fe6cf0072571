//! Shared-password bearer authentication.
//!
//! There is no login endpoint and no session table: one pre-shared password
//! gates every route but `/health`, compared in constant time, with a
//! sliding-window rate limiter over repeated failures from one IP.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::RwLock;

/// Rate limiter for authentication attempts.
///
/// Uses a sliding window algorithm to track failed attempts per IP.
pub struct AuthRateLimiter {
    attempts: Arc<RwLock<HashMap<IpAddr, Vec<chrono::DateTime<Utc>>>>>,
    max_attempts: u32,
    window_seconds: i64,
}

impl AuthRateLimiter {
    pub fn new(max_attempts: u32, window_seconds: i64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window_seconds,
        }
    }

    /// Record a failed authentication attempt. Returns true if the IP is now
    /// rate limited.
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let mut attempts = self.attempts.write();
        let ip_attempts = attempts.entry(ip).or_insert_with(Vec::new);

        ip_attempts.retain(|ts| *ts > window_start);
        ip_attempts.push(now);

        ip_attempts.len() as u32 >= self.max_attempts
    }

    pub fn is_rate_limited(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let attempts = self.attempts.read();
        if let Some(ip_attempts) = attempts.get(&ip) {
            let recent_count = ip_attempts.iter().filter(|ts| **ts > window_start).count();
            recent_count as u32 >= self.max_attempts
        } else {
            false
        }
    }

    /// Clear rate limit for an IP. Call on successful auth.
    pub fn clear(&self, ip: IpAddr) {
        self.attempts.write().remove(&ip);
    }

    /// Drop IPs with no attempts left inside the window. Call periodically.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let window_start = now - Duration::seconds(self.window_seconds);

        let mut attempts = self.attempts.write();
        let before = attempts.len();

        attempts.retain(|_, ip_attempts| {
            ip_attempts.retain(|ts| *ts > window_start);
            !ip_attempts.is_empty()
        });

        before - attempts.len()
    }
}

impl Clone for AuthRateLimiter {
    fn clone(&self) -> Self {
        Self {
            attempts: Arc::clone(&self.attempts),
            max_attempts: self.max_attempts,
            window_seconds: self.window_seconds,
        }
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        // 10 failed attempts per minute.
        Self::new(10, 60)
    }
}

/// Constant-time string comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_exact_strings_only() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hello!"));
    }

    #[test]
    fn rate_limiter_trips_after_max_attempts() {
        let limiter = AuthRateLimiter::new(3, 60);
        let ip: IpAddr = "192.168.1.1".parse().unwrap();

        assert!(!limiter.is_rate_limited(ip));
        assert!(!limiter.record_failure(ip));
        assert!(!limiter.record_failure(ip));
        assert!(limiter.record_failure(ip));
        assert!(limiter.is_rate_limited(ip));
    }

    #[test]
    fn clear_resets_a_rate_limited_ip() {
        let limiter = AuthRateLimiter::new(2, 60);
        let ip: IpAddr = "192.168.1.2".parse().unwrap();

        limiter.record_failure(ip);
        limiter.record_failure(ip);
        assert!(limiter.is_rate_limited(ip));

        limiter.clear(ip);
        assert!(!limiter.is_rate_limited(ip));
    }

    #[test]
    fn rate_limits_are_tracked_per_ip() {
        let limiter = AuthRateLimiter::new(2, 60);
        let ip1: IpAddr = "192.168.1.1".parse().unwrap();
        let ip2: IpAddr = "192.168.1.2".parse().unwrap();

        limiter.record_failure(ip1);
        limiter.record_failure(ip1);
        assert!(limiter.is_rate_limited(ip1));
        assert!(!limiter.is_rate_limited(ip2));
    }
}
