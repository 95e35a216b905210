//! Contract between the verifier and a per-domain probing connection.

use super::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;

/// Opens probing sessions against a domain's mail exchange.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Connects to the mail exchange of `domain`, greets it as
    /// `local_hostname` and opens an envelope from `source_address`.
    ///
    /// `timeout` bounds this call and every later operation on the session.
    async fn open(
        &self,
        domain: &str,
        local_hostname: &str,
        source_address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn DomainSession>, SessionError>;
}

/// A live connection to one domain's mail exchange.
///
/// The verifier calls [`DomainSession::close`] exactly once per opened
/// session, after which the session is dropped.
#[async_trait]
pub trait DomainSession: Send {
    /// Whether the domain accepts mail for arbitrary local parts.
    async fn detect_catch_all(&mut self, domain: &str, attempts: u32) -> bool;

    /// Checks whether `address` would be accepted for delivery.
    async fn probe(&mut self, address: &str, attempts: u32) -> Result<(), SessionError>;

    async fn close(&mut self);
}
