//! Error types for document loading.

use ttp_core::FindingSet;

/// Errors raised before a document can be interpreted at all.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The bytes are not valid text in the detected encoding.
    #[error("invalid {encoding} text: {detail}")]
    Decode {
        encoding: &'static str,
        detail: String,
    },

    /// The byte length does not fit the detected code unit size.
    #[error("{encoding} input length {len} is not a multiple of {unit}")]
    Truncated {
        encoding: &'static str,
        len: usize,
        unit: usize,
    },
}

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// A document that could not be turned into a model. Always carries at
/// least one error-severity finding.
#[derive(Debug, Clone, thiserror::Error)]
#[error("document failed to load: {} structural error(s)", findings.error_count())]
pub struct LoadFailure {
    pub findings: FindingSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttp_core::{Finding, FindingCode, Location};

    #[test]
    fn error_display() {
        let err = LoadError::Truncated {
            encoding: "UTF-16LE",
            len: 5,
            unit: 2,
        };
        assert_eq!(err.to_string(), "UTF-16LE input length 5 is not a multiple of 2");
    }

    #[test]
    fn failure_display_counts_errors() {
        let mut findings = FindingSet::new();
        findings.push(Finding::error(
            FindingCode::StructuralError,
            Location::section("tables"),
            "missing",
        ));
        let failure = LoadFailure { findings };
        assert_eq!(
            failure.to_string(),
            "document failed to load: 1 structural error(s)"
        );
    }
}
