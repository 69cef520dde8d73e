//! Error types for the pattern model.

/// Errors raised by model-level operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Serialization of a model element failed while hashing.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An identifier does not name an entity in this model.
    #[error("no {kind} with identifier {index}")]
    UnknownId { kind: &'static str, index: u32 },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::UnknownId {
            kind: "table",
            index: 7,
        };
        assert_eq!(err.to_string(), "no table with identifier 7");
    }
}
