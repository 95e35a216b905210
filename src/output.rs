//! JSON and XML renderings of lookups.
//!
//! Both forms use the same camelCase field names. Empty string fields and
//! absent error fields are omitted; flags are always written.

use crate::core::error::{AppError, Result};
use crate::core::models::Lookup;
use serde::Serialize;

#[derive(Serialize)]
struct LookupList<'a> {
    lookup: &'a [Lookup],
}

/// Renders one lookup as a JSON object.
pub fn to_json(lookup: &Lookup) -> Result<String> {
    Ok(serde_json::to_string(lookup)?)
}

/// Renders lookups as a pretty-printed JSON array.
pub fn to_json_list(lookups: &[Lookup]) -> Result<String> {
    Ok(serde_json::to_string_pretty(lookups)?)
}

/// Renders one lookup as a `<lookup>` element.
pub fn to_xml(lookup: &Lookup) -> Result<String> {
    quick_xml::se::to_string_with_root("lookup", lookup).map_err(|e| AppError::Xml(e.to_string()))
}

/// Renders lookups as `<lookups>` holding one `<lookup>` element each.
pub fn to_xml_list(lookups: &[Lookup]) -> Result<String> {
    quick_xml::se::to_string_with_root("lookups", &LookupList { lookup: lookups })
        .map_err(|e| AppError::Xml(e.to_string()))
}
