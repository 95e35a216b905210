//! SMTP probing: the session contract the verifier depends on and its
//! lettre-backed implementation.

mod client;
mod error;
mod session;

pub use client::{SmtpDomainSession, SmtpSessionFactory};
pub use error::{FailureKind, SessionError};
pub use session::{DomainSession, SessionFactory};
