//! # Email Verifier Core Library
//!
//! Checks whether email addresses can receive mail by probing the SMTP
//! servers of their domains, without sending any message.
//!
//! Addresses are grouped by domain and each domain is handled by one worker
//! over a single SMTP session. Catch-all and disposable detection run once
//! per domain; the SMTP probe and the avatar check run concurrently for each
//! address. The crate backs the `email-verifier` command-line tool.

mod core;
pub mod output;
mod utils;
mod verification;

pub use crate::core::classify::{
    classify_connect_error, classify_probe_error, ConnectClassification, ErrorPair,
    ProbeClassification,
};
pub use crate::core::config::{Config, ConfigBuilder, ConfigFile, DEFAULT_DISPOSABLE_LIST_URL};
pub use crate::core::error::{AppError, Result};
pub use crate::core::grouping::{group_by_domain, DomainBatch};
pub use crate::core::models::{Address, Lookup};
pub use crate::core::verifier::Verifier;
pub use crate::utils::address::parse_address;
pub use crate::utils::smtp::{
    DomainSession, FailureKind, SessionError, SessionFactory, SmtpDomainSession,
    SmtpSessionFactory,
};
pub use crate::verification::{
    AvatarChecker, DisposableChecker, DisposableList, GravatarChecker, NoAvatarCheck,
};

/// Builds a [`Verifier`] with the default SMTP, disposable-list and Gravatar
/// collaborators.
pub async fn initialize_verifier(config: &Config) -> Result<Verifier> {
    Verifier::new(config).await
}
