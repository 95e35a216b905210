//! Data structures shared between the verifier, its collaborators and the output layer.

use serde::{Deserialize, Serialize};

/// A parsed email address. Produced by [`crate::parse_address`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    /// The full address as `username@domain`.
    pub address: String,
    /// The local part.
    pub username: String,
    /// The lowercased domain.
    pub domain: String,
}

/// Output record of a verification: one per input [`Address`].
///
/// String fields are omitted from the serialized forms when empty; booleans
/// are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lookup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    pub host_exists: bool,
    pub deliverable: bool,
    pub full_inbox: bool,
    pub catch_all: bool,
    pub disposable: bool,
    pub avatar_exists: bool,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
    #[serde(rename = "errorDetails", default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl Lookup {
    /// Starts a record for `address` with every flag cleared.
    pub(crate) fn for_address(address: &Address) -> Self {
        Self {
            address: address.address.clone(),
            username: address.username.clone(),
            domain: address.domain.clone(),
            ..Self::default()
        }
    }

    /// Checks the relations that must hold between the flags of a record.
    ///
    /// Returns a description of the first violated relation, if any.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.catch_all && !self.deliverable {
            return Err(format!("{}: catch-all but not deliverable", self.address));
        }
        if !self.host_exists {
            if self.deliverable || self.full_inbox || self.catch_all {
                return Err(format!(
                    "{}: host absent but deliverable/fullInbox/catchAll set",
                    self.address
                ));
            }
            if self.error_summary.is_some() || self.error_detail.is_some() {
                return Err(format!("{}: host absent but error fields set", self.address));
            }
        }
        Ok(())
    }
}
