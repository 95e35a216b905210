//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;

/// Validates the configuration settings after loading and potential overrides.
/// Mutates the config to clamp values where a sane fallback exists.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.max_workers == 0 {
        tracing::warn!("Max workers was set to 0. Setting to 1.");
        config.max_workers = 1;
    }
    if config.catch_all_attempts == 0 {
        tracing::warn!("Catch-all attempts was set to 0. Setting to 1.");
        config.catch_all_attempts = 1;
    }
    if config.probe_attempts == 0 {
        tracing::warn!("Probe attempts was set to 0. Setting to 1.");
        config.probe_attempts = 1;
    }
    if config.hostname.trim().is_empty() {
        return Err(AppError::Config(
            "Local hostname used in the EHLO greeting cannot be empty.".to_string(),
        ));
    }
    match config.source_address.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => {
            return Err(AppError::Config(format!(
                "Invalid source address format: {}",
                config.source_address
            )));
        }
    }
    if config.dns_servers.is_empty() {
        tracing::warn!("DNS servers list is empty. Resolver will use system defaults.");
    }
    if let Some(ref url) = config.disposable_list_url {
        if url::Url::parse(url).is_err() {
            return Err(AppError::Config(format!(
                "Invalid disposable list URL: {}",
                url
            )));
        }
    }
    Ok(())
}
