//! Parsing of raw input strings into [`Address`] values.

use crate::core::error::{AppError, Result};
use crate::core::models::Address;
use once_cell::sync::Lazy;
use regex::Regex;

static DOMAIN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .expect("Domain label pattern failed to compile. This is a bug.")
});

/// Parses `input` as `local@domain`.
///
/// Surrounding whitespace and a trailing dot on the domain are ignored, and
/// the domain is lowercased. The local part is kept verbatim.
pub fn parse_address(input: &str) -> Result<Address> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::AddressParse("input is empty".to_string()));
    }
    if trimmed.len() > 254 {
        return Err(AppError::AddressParse(format!(
            "'{}' is longer than 254 characters",
            trimmed
        )));
    }

    let (username, domain) = match trimmed.split_once('@') {
        Some((local, domain)) if !domain.contains('@') => (local, domain),
        _ => {
            return Err(AppError::AddressParse(format!(
                "'{}' must contain exactly one '@'",
                trimmed
            )))
        }
    };

    if username.is_empty() || username.len() > 64 {
        return Err(AppError::AddressParse(format!(
            "local part of '{}' must be 1 to 64 characters",
            trimmed
        )));
    }
    if username.starts_with('.') || username.ends_with('.') || username.contains("..") {
        return Err(AppError::AddressParse(format!(
            "local part of '{}' has misplaced dots",
            trimmed
        )));
    }
    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::AddressParse(format!(
            "local part of '{}' contains whitespace",
            trimmed
        )));
    }

    let domain = domain.trim_end_matches('.').to_lowercase();
    if !domain.contains('.') {
        return Err(AppError::AddressParse(format!(
            "domain of '{}' must contain at least one dot",
            trimmed
        )));
    }
    if let Some(label) = domain.split('.').find(|l| !DOMAIN_LABEL.is_match(l)) {
        return Err(AppError::AddressParse(format!(
            "domain label '{}' of '{}' is invalid",
            label, trimmed
        )));
    }

    Ok(Address {
        address: format!("{}@{}", username, domain),
        username: username.to_string(),
        domain,
    })
}
