//! Failure taxonomy for session collaborators and its mapping from SMTP replies.

use lettre::transport::smtp::Error as SmtpError;
use std::fmt;
use thiserror::Error;

/// Closed set of failure conditions a session collaborator can report.
///
/// The verifier matches on this discriminant; the free-form text travels
/// alongside in [`SessionError::detail`] and is never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The domain has no mail exchange (NXDOMAIN, no MX/A records).
    HostAbsent,
    /// The mailbox exists but cannot accept mail right now (452/552).
    MailboxFull,
    Timeout,
    ServerUnavailable,
    Blocked,
    TryAgainLater,
    MailboxBusy,
    NeedMailBeforeRcpt,
    MailboxUnavailable,
    RecipientMoved,
    NotAllowed,
    Rejected,
    Protocol,
}

impl FailureKind {
    /// Stable, human readable summary used as the error summary of a lookup.
    pub fn summary(self) -> &'static str {
        match self {
            FailureKind::HostAbsent => "Mail server does not exist",
            FailureKind::MailboxFull => "Recipient out of disk space",
            FailureKind::Timeout => "The connection to the mail server has timed out",
            FailureKind::ServerUnavailable => "Mail server is unavailable",
            FailureKind::Blocked => "Blocked by mail server",
            FailureKind::TryAgainLater => "Try again later",
            FailureKind::MailboxBusy => "Mailbox busy",
            FailureKind::NeedMailBeforeRcpt => "Need MAIL before RCPT",
            FailureKind::MailboxUnavailable => "Mailbox unavailable",
            FailureKind::RecipientMoved => "Recipient has moved",
            FailureKind::NotAllowed => "Not allowed",
            FailureKind::Rejected => "Rejected by mail server",
            FailureKind::Protocol => "Unexpected response from mail server",
        }
    }

    /// Whether a later attempt against the same session may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::TryAgainLater | FailureKind::MailboxBusy
        )
    }

    /// Maps an SMTP reply code onto a failure kind.
    pub fn from_reply_code(code: u16) -> Self {
        match code {
            421 => FailureKind::TryAgainLater,
            450 => FailureKind::MailboxBusy,
            451 => FailureKind::ServerUnavailable,
            452 | 552 => FailureKind::MailboxFull,
            503 => FailureKind::NeedMailBeforeRcpt,
            530 | 535 | 554 => FailureKind::Blocked,
            550 => FailureKind::MailboxUnavailable,
            551 => FailureKind::RecipientMoved,
            553 => FailureKind::NotAllowed,
            400..=499 => FailureKind::TryAgainLater,
            500..=599 => FailureKind::Rejected,
            _ => FailureKind::Protocol,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

/// Failure reported by a [`super::SessionFactory`] or [`super::DomainSession`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct SessionError {
    pub kind: FailureKind,
    /// Raw description of the underlying failure.
    pub detail: String,
}

impl SessionError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn host_absent(domain: &str) -> Self {
        Self::new(
            FailureKind::HostAbsent,
            format!("no mail exchange found for {}", domain),
        )
    }

    pub fn timeout(operation: &str) -> Self {
        Self::new(FailureKind::Timeout, format!("{} timed out", operation))
    }
}

/// Converts a lettre SMTP error into a [`SessionError`], keyed on the reply
/// code when the server sent one.
pub(crate) fn from_smtp_error(error: &SmtpError, server: &str) -> SessionError {
    if error.is_timeout() {
        tracing::warn!(target: "smtp_task", "SMTP operation against {} timed out: {}", server, error);
        return SessionError::new(FailureKind::Timeout, error.to_string());
    }

    if let Some(numeric) = error
        .status()
        .and_then(|code| code.to_string().parse::<u16>().ok())
    {
        let kind = FailureKind::from_reply_code(numeric);
        tracing::debug!(target: "smtp_task", "SMTP reply {} from {} mapped to {:?}", numeric, server, kind);
        return SessionError::new(kind, error.to_string());
    }

    if error.is_client() || error.is_response() {
        tracing::warn!(target: "smtp_task", "SMTP protocol error with {}: {}", server, error);
        return SessionError::new(FailureKind::Protocol, error.to_string());
    }

    tracing::warn!(target: "smtp_task", "SMTP transport error with {}: {}", server, error);
    SessionError::new(FailureKind::ServerUnavailable, error.to_string())
}
