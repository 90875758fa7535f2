//! Error types for protocol decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while reading rows or protocol values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A required column is absent or null.
    #[error("missing column `{column}`")]
    MissingColumn {
        /// Column name.
        column: String,
    },

    /// A column holds a value of the wrong type.
    #[error("column `{column}` has invalid value: expected {expected}")]
    InvalidColumn {
        /// Column name.
        column: String,
        /// Description of the expected type.
        expected: &'static str,
    },

    /// A timestamp could not be parsed.
    #[error("invalid timestamp `{value}`: {source}")]
    InvalidTimestamp {
        /// Raw value.
        value: String,
        /// Parse failure.
        #[source]
        source: chrono::ParseError,
    },

    /// Unknown conflict resolution name.
    #[error("unknown conflict resolution `{0}`")]
    UnknownResolution(String),

    /// A JSON value could not be converted.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates a missing-column error.
    pub fn missing(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Creates an invalid-column error.
    pub fn invalid(column: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidColumn {
            column: column.into(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            ProtocolError::missing("updated_at").to_string(),
            "missing column `updated_at`"
        );
        assert!(ProtocolError::invalid("rate", "number")
            .to_string()
            .contains("expected number"));
    }
}
