//! Error type of the email-verifier library.

use thiserror::Error;

/// Errors surfaced by setup and by the parsing entry points.
///
/// Verifying parsed addresses never fails: collaborator failures are folded
/// into the error fields of each [`crate::Lookup`] instead.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid or unreadable configuration.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// A collaborator (HTTP client, resolver) could not be built.
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// The input is not a `local@domain` address.
    #[error("Failed to parse email address: {0}")]
    AddressParse(String),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML Error: {0}")]
    Xml(String),

    /// A verification run ended without producing the expected lookup.
    #[error("Task Execution Error: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
