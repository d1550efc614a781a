//! Core type definitions for TaskTree.
//!
//! This crate defines the synchronized unit and the rules that decide whether
//! a candidate value may replace local state:
//! - The task tree ([`TaskNode`]) and the document wrapping it ([`AppDocument`])
//! - The validity contract ([`validate`], [`parse_document`])
//! - The remote-timestamp watermark used by the sync engine ([`Watermark`])
//!
//! Nothing here performs I/O.

mod document;
mod validate;
mod watermark;

pub use document::{AppDocument, TaskNode, TRASH_ID};
pub use validate::{check_document, parse_document, validate, ValidationError};
pub use watermark::Watermark;

/// Result type alias for document validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
