use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost).
    pub bind_addr: String,
    /// Root directory exposed for listing and streaming.
    pub files_root: PathBuf,
    /// Shared bearer-token secret.
    pub password: String,
    /// Require the `Authorization` header on every route but `/health`.
    pub require_auth: bool,
    /// Upper bound on a single transcode job.
    pub encoder_deadline: Duration,
    /// Idle time before a zero-subscriber buffer is reclaimed.
    pub buffer_ttl: Duration,
    /// Optional cap on concurrently running encoders. `None` is unbounded.
    pub max_concurrent_encoders: Option<usize>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // SECURITY: require an explicit password and files root, no defaults.
        let password = env::var("MEDIA_SERVER_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvVar("MEDIA_SERVER_PASSWORD".to_string()))?;

        if password.len() < 8 {
            return Err(ConfigError::InvalidValue(
                "MEDIA_SERVER_PASSWORD must be at least 8 characters".to_string(),
            ));
        }

        let files_root = env::var("MEDIA_SERVER_FILES_ROOT")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnvVar("MEDIA_SERVER_FILES_ROOT".to_string()))?;

        Ok(Self {
            port: env::var("MEDIA_SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: env::var("MEDIA_SERVER_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            files_root,
            password,
            require_auth: env::var("MEDIA_SERVER_REQUIRE_AUTH")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(true),
            encoder_deadline: Duration::from_secs(
                env::var("MEDIA_SERVER_ENCODER_DEADLINE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(4 * 60 * 60),
            ),
            buffer_ttl: Duration::from_secs(
                env::var("MEDIA_SERVER_BUFFER_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(4 * 60 * 60),
            ),
            max_concurrent_encoders: env::var("MEDIA_SERVER_MAX_CONCURRENT_ENCODERS")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }

    /// Get the full bind address (`addr:port`).
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid port number")]
    InvalidPort,
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}
