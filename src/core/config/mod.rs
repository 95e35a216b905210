//! Defines the core runtime `Config` struct, its defaults, and related utilities.
//! Submodules handle loading, building, and validation.

pub(crate) mod builder;
pub(crate) mod file;
pub(crate) mod loading;
pub(crate) mod validation;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::core::error::Result;
use std::time::Duration;

/// Default public list of disposable mail provider domains, one per line.
pub const DEFAULT_DISPOSABLE_LIST_URL: &str =
    "https://raw.githubusercontent.com/disposable-email-domains/disposable-email-domains/main/disposable_email_blocklist.conf";

/// Runtime configuration settings used by the verifier.
#[derive(Clone, Debug)]
pub struct Config {
    pub request_timeout: Duration,
    pub user_agent: String,

    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    /// Per-operation timeout for opening a session and for each probe.
    pub smtp_timeout: Duration,
    /// Name announced in the EHLO greeting.
    pub hostname: String,
    /// Envelope sender used in `MAIL FROM`.
    pub source_address: String,
    pub catch_all_attempts: u32,
    pub probe_attempts: u32,

    /// Upper bound on concurrently probed domains.
    pub max_workers: usize,
    pub enable_avatar_check: bool,

    pub disposable_list_url: Option<String>,

    pub loaded_config_path: Option<String>,
}

impl Config {
    fn build_default() -> Self {
        let dns_servers = vec![
            "8.8.8.8".to_string(),
            "8.8.4.4".to_string(),
            "1.1.1.1".to_string(),
            "1.0.0.1".to_string(),
        ];

        Config {
            request_timeout: Duration::from_secs(10),
            user_agent: format!("email-verifier/{}", env!("CARGO_PKG_VERSION")),
            dns_timeout: Duration::from_secs(5),
            dns_servers,
            smtp_timeout: Duration::from_secs(10),
            hostname: "localhost".to_string(),
            source_address: "verify-probe@example.com".to_string(),
            catch_all_attempts: 5,
            probe_attempts: 3,
            max_workers: std::thread::available_parallelism()
                .map_or(1, |n| n.get())
                .max(1),
            enable_avatar_check: true,
            disposable_list_url: None,
            loaded_config_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::build_default()
    }
}

/// Builds the shared HTTP client used by the avatar and disposable-list
/// collaborators. Its timeout bounds every individual request.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| {
            crate::core::error::AppError::Initialization(format!(
                "Failed to build HTTP client: {}",
                e
            ))
        })
}
