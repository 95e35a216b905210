//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
/// Returns the parsed `ConfigFile` content.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

/// Applies settings from a parsed `ConfigFile` onto a mutable `Config` instance.
/// Only fields present in `file_config` are overwritten.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        if !servers.is_empty() {
            config.dns_servers = servers.clone();
        }
    }

    // SMTP
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref hostname) = file_config.smtp.hostname {
        config.hostname = hostname.trim().to_string();
    }
    if let Some(ref source) = file_config.smtp.source_address {
        config.source_address = source.trim().to_string();
    }
    if let Some(attempts) = file_config.smtp.catch_all_attempts {
        config.catch_all_attempts = attempts;
    }
    if let Some(attempts) = file_config.smtp.probe_attempts {
        config.probe_attempts = attempts;
    }

    // Verification
    if let Some(workers) = file_config.verification.max_workers {
        config.max_workers = workers;
    }
    if let Some(enable) = file_config.verification.enable_avatar_check {
        config.enable_avatar_check = enable;
    }

    // Disposable list
    if let Some(ref url) = file_config.disposable.list_url {
        if !url.trim().is_empty() {
            config.disposable_list_url = Some(url.trim().to_string());
        } else {
            config.disposable_list_url = None;
        }
    }
}
