use std::time::Duration;

use scholarship_core::extraction::RetryPolicy;

use crate::auth::jwt::JwtConfig;

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
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for background services to stop (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub extraction: ExtractionConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt: JwtConfig::from_env(),
            extraction: ExtractionConfig::from_env(),
        }
    }
}

/// Settings for the extraction runner and job reaper.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Jobs processed at the same time.
    pub concurrency: usize,
    /// Attempts per job, including the first.
    pub max_attempts: i32,
    /// A processing job whose heartbeat is older than this is reaped.
    pub timeout_secs: i64,
    /// Queue polling interval when no wakeup arrives.
    pub poll_interval: Duration,
    /// Backoff before the first in-process retry. Doubles per attempt.
    pub retry_delay: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_attempts: RetryPolicy::default().max_attempts,
            timeout_secs: 300,
            poll_interval: Duration::from_millis(1000),
            retry_delay: RetryPolicy::default().initial_delay,
        }
    }
}

impl ExtractionConfig {
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `EXTRACTION_CONCURRENCY`   | `2`     |
    /// | `EXTRACTION_MAX_ATTEMPTS`  | `3`     |
    /// | `EXTRACTION_TIMEOUT_SECS`  | `300`   |
    /// | `EXTRACTION_POLL_MS`       | `1000`  |
    /// | `EXTRACTION_RETRY_DELAY_MS`| `2000`  |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let concurrency: usize = std::env::var("EXTRACTION_CONCURRENCY")
            .map(|v| v.parse().expect("EXTRACTION_CONCURRENCY must be a valid usize"))
            .unwrap_or(defaults.concurrency);

        let max_attempts: i32 = std::env::var("EXTRACTION_MAX_ATTEMPTS")
            .map(|v| v.parse().expect("EXTRACTION_MAX_ATTEMPTS must be a valid i32"))
            .unwrap_or(defaults.max_attempts);

        let timeout_secs: i64 = std::env::var("EXTRACTION_TIMEOUT_SECS")
            .map(|v| v.parse().expect("EXTRACTION_TIMEOUT_SECS must be a valid i64"))
            .unwrap_or(defaults.timeout_secs);

        let poll_interval = std::env::var("EXTRACTION_POLL_MS")
            .map(|v| {
                Duration::from_millis(v.parse().expect("EXTRACTION_POLL_MS must be a valid u64"))
            })
            .unwrap_or(defaults.poll_interval);

        let retry_delay = std::env::var("EXTRACTION_RETRY_DELAY_MS")
            .map(|v| {
                Duration::from_millis(
                    v.parse().expect("EXTRACTION_RETRY_DELAY_MS must be a valid u64"),
                )
            })
            .unwrap_or(defaults.retry_delay);

        assert!(concurrency > 0, "EXTRACTION_CONCURRENCY must be at least 1");
        assert!(max_attempts > 0, "EXTRACTION_MAX_ATTEMPTS must be at least 1");

        Self {
            concurrency,
            max_attempts,
            timeout_secs,
            poll_interval,
            retry_delay,
        }
    }

    /// Retry policy with this config's attempt limit.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.retry_delay,
            ..RetryPolicy::default()
        }
    }

    /// How often the reaper scans for stale heartbeats.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs((self.timeout_secs / 4).clamp(5, 60) as u64)
    }

    /// How often a running job refreshes its heartbeat.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs((self.timeout_secs / 3).clamp(1, 30) as u64)
    }
}
