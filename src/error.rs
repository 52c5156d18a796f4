//! Fatal parse errors
//!
//! Only structurally unusable input is an error. Absent or malformed
//! individual fields are normalized to zero-equivalents by the parsers and
//! never surface here.

use thiserror::Error;

/// Errors raised when an input document or resource log cannot be used at all
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid metadata document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Metadata document must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Resource log has no header row")]
    MissingHeader,

    #[error("Resource log header is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("Resource log contains no valid data points")]
    NoDataPoints,

    #[error("Resource log could not be decoded: {0}")]
    InvalidLog(#[from] csv::Error),
}

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
