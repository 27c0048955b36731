//! Configuration validation
//!
//! Validates critical configuration values at startup to catch misconfigurations early.

use anyhow::Result;
use ephemera_core::Config;

/// Validate critical configuration values
///
/// Hard errors come from [`Config::validate`]; questionable but workable settings are
/// logged as warnings.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() && config.max_upload_size_bytes.is_none() {
        tracing::warn!(
            "MAX_UPLOAD_SIZE_MB not set in production - request bodies are unbounded"
        );
    }

    if config.sweep_interval_secs as i64 > config.ttl_limit_secs {
        tracing::warn!(
            sweep_interval_secs = config.sweep_interval_secs,
            ttl_limit_secs = config.ttl_limit_secs,
            "SWEEP_INTERVAL exceeds TTL_LIMIT - unfetched images may outlive their expiry by a full interval"
        );
    }

    Ok(())
}
