//! Configuration module
//!
//! Process-wide settings for the image host. The value is built once at startup
//! (from the environment, optionally seeded by a `.env` file) and passed explicitly to
//! every component that needs it. Nothing mutates it afterwards.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TTL_LIMIT_SECS, DEFAULT_UPLOAD_DIR};

const DEFAULT_SERVER_PORT: u16 = 8000;
const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Output format for the tracing subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, anyhow::Error> {
        match value.trim().to_lowercase().as_str() {
            "compact" | "text" | "" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!(
                "LOG_FORMAT must be 'compact' or 'json', got '{}'",
                other
            )),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the stored objects (flat, one file per image).
    pub upload_dir: PathBuf,
    /// Seconds between two expiry sweeps.
    pub sweep_interval_secs: u64,
    /// Upper bound for the `expires_in` an upload may request, in seconds.
    pub ttl_limit_secs: i64,
    pub server_port: u16,
    pub environment: String,
    /// Request body cap enforced by the transport layer. `None` disables it.
    pub max_upload_size_bytes: Option<usize>,
    pub http_concurrency_limit: usize,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            ttl_limit_secs: DEFAULT_TTL_LIMIT_SECS,
            server_port: DEFAULT_SERVER_PORT,
            environment: "development".to_string(),
            max_upload_size_bytes: None,
            http_concurrency_limit: DEFAULT_HTTP_CONCURRENCY_LIMIT,
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. `from_env` uses the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let upload_dir = lookup("UPLOAD_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        let sweep_interval_secs = match lookup("SWEEP_INTERVAL") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("SWEEP_INTERVAL must be a whole number of seconds"))?,
            None => defaults.sweep_interval_secs,
        };

        let ttl_limit_secs = match lookup("TTL_LIMIT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("TTL_LIMIT must be a whole number of seconds"))?,
            None => defaults.ttl_limit_secs,
        };

        let server_port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => defaults.server_port,
        };

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or(defaults.environment);

        // Unset, empty or zero disables the limit.
        let max_upload_size_bytes = match lookup("MAX_UPLOAD_SIZE_MB")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
        {
            Some(raw) => {
                let mb: usize = raw.parse().map_err(|_| {
                    anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be a whole number of megabytes")
                })?;
                match mb {
                    0 => None,
                    mb => Some(mb.checked_mul(1024 * 1024).ok_or_else(|| {
                        anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large: {}", mb)
                    })?),
                }
            }
            None => defaults.max_upload_size_bytes,
        };

        let http_concurrency_limit = match lookup("HTTP_CONCURRENCY_LIMIT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be a whole number")
            })?,
            None => defaults.http_concurrency_limit,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => LogFormat::parse(&raw)?,
            None => defaults.log_format,
        };

        Ok(Config {
            upload_dir,
            sweep_interval_secs,
            ttl_limit_secs,
            server_port,
            environment,
            max_upload_size_bytes,
            http_concurrency_limit,
            log_format,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!("SWEEP_INTERVAL must be at least 1 second"));
        }

        if self.ttl_limit_secs < 1 {
            return Err(anyhow::anyhow!("TTL_LIMIT must be at least 1 second"));
        }

        if self.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be at least 1"));
        }

        if self.upload_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("UPLOAD_DIR must not be empty"));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
