//! Disposable mail provider detection.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashSet;

/// Membership test against a list of disposable mail providers.
pub trait DisposableChecker: Send + Sync {
    fn is_disposable(&self, domain: &str) -> bool;
}

/// Providers recognised even when no remote list could be loaded.
static BUILTIN_DOMAINS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "0-mail.com",
        "10minutemail.com",
        "10minutemail.net",
        "20minutemail.com",
        "33mail.com",
        "dispostable.com",
        "dropmail.me",
        "emailondeck.com",
        "fakeinbox.com",
        "getairmail.com",
        "getnada.com",
        "guerrillamail.com",
        "guerrillamail.net",
        "guerrillamail.org",
        "guerrillamailblock.com",
        "harakirimail.com",
        "incognitomail.org",
        "mailcatch.com",
        "maildrop.cc",
        "mailinator.com",
        "mailinator.net",
        "mailnesia.com",
        "mintemail.com",
        "mohmal.com",
        "mytemp.email",
        "sharklasers.com",
        "spamgourmet.com",
        "temp-mail.org",
        "tempail.com",
        "tempmail.dev",
        "tempmailo.com",
        "tempr.email",
        "throwawaymail.com",
        "trashmail.com",
        "trashmail.de",
        "yopmail.com",
        "yopmail.fr",
        "yopmail.net",
    ]
});

/// In-memory disposable domain list, seeded with built-in providers and
/// optionally extended from a remote newline separated list.
pub struct DisposableList {
    domains: RwLock<HashSet<String>>,
}

impl Default for DisposableList {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DisposableList {
    /// A list holding only the built-in providers.
    pub fn builtin() -> Self {
        let domains = BUILTIN_DOMAINS.iter().map(|d| d.to_string()).collect();
        Self {
            domains: RwLock::new(domains),
        }
    }

    /// Adds every domain found in `text` (one per line, `#` comments allowed).
    /// Returns how many new domains were added.
    pub fn extend_from_text(&self, text: &str) -> usize {
        let mut domains = self.domains.write();
        let before = domains.len();
        for line in text.lines() {
            let entry = line.split('#').next().unwrap_or("").trim();
            if entry.is_empty() {
                continue;
            }
            domains.insert(entry.trim_end_matches('.').to_lowercase());
        }
        domains.len() - before
    }

    /// Fetches `url` and merges its contents into the list.
    ///
    /// Failures are logged; the list keeps whatever it already held.
    pub async fn refresh(&self, client: &Client, url: &str) {
        tracing::debug!(target: "verification_api", "Fetching disposable domain list from {}", url);
        let response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "verification_api", "Could not fetch disposable list {}: {}", url, e);
                return;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(target: "verification_api",
                "Disposable list {} returned status {}", url, response.status());
            return;
        }
        match response.text().await {
            Ok(body) => {
                let added = self.extend_from_text(&body);
                tracing::info!(target: "verification_api",
                    "Loaded {} additional disposable domains ({} total)", added, self.len());
            }
            Err(e) => {
                tracing::warn!(target: "verification_api", "Could not read disposable list {}: {}", url, e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.domains.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.read().is_empty()
    }
}

impl DisposableChecker for DisposableList {
    /// Matches the domain itself and any parent domain on the list.
    fn is_disposable(&self, domain: &str) -> bool {
        let domain = domain.trim_end_matches('.').to_lowercase();
        let domains = self.domains.read();
        let mut candidate = domain.as_str();
        loop {
            if domains.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return false,
            }
        }
    }
}
