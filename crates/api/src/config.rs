use std::time::Duration;

use codereel_core::config::{env_or, env_string, ConfigError};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Not applied to
    /// the log stream.
    pub request_timeout_secs: u64,
    /// How often log streams poll the job store (default: 1s).
    pub log_poll_interval: Duration,
    /// How often finished jobs are checked for expiry (default: 60s).
    pub job_sweep_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `3000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `LOG_POLL_INTERVAL_MS`    | `1000`                  |
    /// | `JOB_SWEEP_INTERVAL_SECS` | `60`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors_origins: Vec<String> = env_string("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env_string("HOST", "0.0.0.0"),
            port: env_or("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
            log_poll_interval: Duration::from_millis(env_or("LOG_POLL_INTERVAL_MS", 1000)?),
            job_sweep_interval: Duration::from_secs(env_or("JOB_SWEEP_INTERVAL_SECS", 60)?),
        })
    }
}
