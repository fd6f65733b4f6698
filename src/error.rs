//! This module defines the single, unified error type for the entire colwire library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Note that "not enough bytes yet" is deliberately NOT an error: the resumable
//! readers report it through [`crate::columns::DecodeProgress`] so the caller can
//! retry the same call once more bytes have arrived.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    // =========================================================================
    // === Registry errors
    // =========================================================================
    #[error("Unsupported wire type '{spec}' for column '{column}'")]
    UnsupportedType { spec: String, column: String },

    // =========================================================================
    // === Decode errors (malformed payload; fatal for the whole column)
    // =========================================================================
    #[error("Malformed column payload: {0}")]
    MalformedPayload(String),

    // =========================================================================
    // === Encode errors (illegal writes; fatal for the whole write)
    // =========================================================================
    #[error("NULL value in non-nullable column '{column}' at row {row}")]
    IllegalNull { column: String, row: usize },

    #[error("Illegal value for column '{column}' at row {row}: {reason}")]
    IllegalValue {
        column: String,
        row: usize,
        reason: String,
    },

    // =========================================================================
    // === Internal invariant violations (these are bugs)
    // =========================================================================
    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error from the Serde JSON library, raised while loading configuration.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl CodecError {
    /// Shorthand for the common "decoded count exceeds the representable range"
    /// failure shared by the array and low-cardinality readers.
    pub(crate) fn size_too_big(what: &str, got: u64, max: u64) -> Self {
        CodecError::MalformedPayload(format!("{} is too big ({}), max {}", what, got, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = CodecError::UnsupportedType {
            spec: "Ring(Int8)".to_string(),
            column: "geo".to_string(),
        };
        assert!(err.to_string().contains("Ring(Int8)"));
        assert!(err.to_string().contains("geo"));

        let err = CodecError::IllegalNull {
            column: "id".to_string(),
            row: 3,
        };
        assert!(err.to_string().contains("id"));
        assert!(err.to_string().contains("3"));
    }

    #[test]
    fn test_size_too_big_mentions_bounds() {
        let err = CodecError::size_too_big("nested size", 5_000_000_000, i32::MAX as u64);
        assert!(err.to_string().contains("5000000000"));
        assert!(err.to_string().contains("2147483647"));
    }
}
