//! Classification of collaborator failures into the flags and error pairs
//! carried by a [`crate::Lookup`].

use crate::utils::smtp::{FailureKind, SessionError};

/// Error summary and detail attached to a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPair {
    /// Stable description of the failure kind.
    pub summary: String,
    /// Raw text of the underlying failure, when there is any.
    pub detail: Option<String>,
}

impl From<&SessionError> for ErrorPair {
    fn from(err: &SessionError) -> Self {
        let detail = err.detail.trim();
        Self {
            summary: err.kind.summary().to_string(),
            detail: (!detail.is_empty()).then(|| detail.to_string()),
        }
    }
}

/// Outcome of classifying a failure to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectClassification {
    /// The domain has no mail exchange; reported as `hostExists = false`.
    HostAbsent,
    /// Applies to every address of the domain batch.
    Failure(ErrorPair),
}

/// Outcome of classifying a failed probe of one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeClassification {
    /// Reported as `hostExists = false` from this address onwards.
    HostAbsent,
    /// Reported as `fullInbox = true`.
    FullInbox,
    /// Applies to the probed address only.
    Failure(ErrorPair),
}

/// Classifies a failure raised while opening a session (DNS, connect,
/// greeting, envelope sender).
///
/// A mailbox-full reply at this stage cannot be tied to any address and is
/// reported as a regular failure.
pub fn classify_connect_error(err: &SessionError) -> ConnectClassification {
    match err.kind {
        FailureKind::HostAbsent => ConnectClassification::HostAbsent,
        _ => ConnectClassification::Failure(ErrorPair::from(err)),
    }
}

/// Classifies a failure raised while probing a single address.
pub fn classify_probe_error(err: &SessionError) -> ProbeClassification {
    match err.kind {
        FailureKind::HostAbsent => ProbeClassification::HostAbsent,
        FailureKind::MailboxFull => ProbeClassification::FullInbox,
        _ => ProbeClassification::Failure(ErrorPair::from(err)),
    }
}
