use std::time::Instant;

use crate::auth::AuthRateLimiter;
use crate::config::ServerConfig;
use crate::core::SessionManager;

/// State shared across every HTTP handler.
pub struct AppState {
    pub config: ServerConfig,
    pub manager: SessionManager,
    pub rate_limiter: AuthRateLimiter,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, manager: SessionManager) -> Self {
        Self {
            config,
            manager,
            rate_limiter: AuthRateLimiter::default(),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
