//! Avatar existence check against Gravatar.

use crate::core::models::Address;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use url::Url;

const GRAVATAR_BASE: &str = "https://www.gravatar.com/avatar/";

/// Existence test for a publicly hosted avatar of an address.
///
/// Implementations never fail: any error counts as "no avatar".
#[async_trait]
pub trait AvatarChecker: Send + Sync {
    async fn exists(&self, address: &Address) -> bool;
}

/// Hex encoded SHA-256 of the trimmed, lowercased address.
pub fn avatar_hash(address: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.trim().to_lowercase().as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Builds the avatar URL; `d=404` makes Gravatar answer 404 instead of a
/// placeholder image when nothing is registered.
pub(crate) fn avatar_url(address: &str) -> Option<Url> {
    let mut url = Url::parse(GRAVATAR_BASE).ok()?.join(&avatar_hash(address)).ok()?;
    url.query_pairs_mut().append_pair("d", "404");
    Some(url)
}

/// [`AvatarChecker`] issuing `HEAD` requests to Gravatar.
#[derive(Clone)]
pub struct GravatarChecker {
    http_client: Client,
}

impl GravatarChecker {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl AvatarChecker for GravatarChecker {
    async fn exists(&self, address: &Address) -> bool {
        let task_label = format!("[Gravatar Check: {}]", address.address);
        let Some(url) = avatar_url(&address.address) else {
            tracing::error!(target: "verification_api", "{} Failed to build avatar URL", task_label);
            return false;
        };

        match self.http_client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                tracing::debug!(target: "verification_api", "{} Received status: {}", task_label, status);
                status == StatusCode::OK
            }
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!(target: "verification_api", "{} Request timed out: {}", task_label, e);
                } else {
                    tracing::warn!(target: "verification_api", "{} Request failed: {}", task_label, e);
                }
                false
            }
        }
    }
}

/// [`AvatarChecker`] used when avatar checks are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAvatarCheck;

#[async_trait]
impl AvatarChecker for NoAvatarCheck {
    async fn exists(&self, _address: &Address) -> bool {
        false
    }
}
