//! The validity contract for documents crossing the sync boundary.
//!
//! Checks run against the untyped JSON value. Deserializing straight into
//! [`AppDocument`] would hide some violations behind serde defaults, and a
//! missing flag must be rejected, not assumed `false`.

use crate::document::{AppDocument, TRASH_ID};
use serde_json::Value;
use thiserror::Error;

/// Reasons a candidate document is refused.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The payload is not JSON at all.
    #[error("document is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),

    /// The payload is JSON but not an object.
    #[error("document is not a JSON object")]
    NotAnObject,

    /// A display flag is missing or not a boolean.
    #[error("document field `{0}` is missing or not a boolean")]
    InvalidFlag(&'static str),

    /// `items` is missing or not an array.
    #[error("document field `items` is missing or not an array")]
    InvalidItems,

    /// No top-level node carries the trash id.
    #[error("document has no top-level `trash` node")]
    MissingTrash,

    /// The contract holds but a node does not have the expected shape.
    #[error("malformed task node: {0}")]
    MalformedNode(#[source] serde_json::Error),
}

/// Returns true iff the candidate satisfies the validity contract.
///
/// Pure and total: any JSON value is accepted as input.
pub fn validate(candidate: &Value) -> bool {
    check_document(candidate).is_ok()
}

/// Parses raw bytes into a document, enforcing the validity contract.
pub fn parse_document(bytes: &[u8]) -> crate::Result<AppDocument> {
    let value: Value = serde_json::from_slice(bytes).map_err(ValidationError::NotJson)?;
    check_document(&value)?;
    serde_json::from_value(value).map_err(ValidationError::MalformedNode)
}

/// Like [`validate`], but reports the first rule the candidate breaks.
pub fn check_document(candidate: &Value) -> crate::Result<()> {
    let object = candidate.as_object().ok_or(ValidationError::NotAnObject)?;

    for flag in ["hideDoneItems", "darkMode"] {
        if !object.get(flag).is_some_and(Value::is_boolean) {
            return Err(ValidationError::InvalidFlag(flag));
        }
    }

    let items = object
        .get("items")
        .and_then(Value::as_array)
        .ok_or(ValidationError::InvalidItems)?;

    let has_trash = items
        .iter()
        .any(|item| item.get("id").and_then(Value::as_str) == Some(TRASH_ID));
    if !has_trash {
        return Err(ValidationError::MissingTrash);
    }

    Ok(())
}
