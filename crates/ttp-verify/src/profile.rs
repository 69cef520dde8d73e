//! Validation profiles controlling depth and strictness of checking.

use serde::{Deserialize, Serialize};
use ttp_core::ExpressionPolicy;

use crate::error::{Result, VerifyError};

/// The level of validation rigor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileLevel {
    /// Quick feedback while editing: structure, references and tables only.
    Lenient,
    /// Every check; warnings stay warnings.
    Standard,
    /// Publication: literal values only, and warnings fail the run.
    Strict,
}

/// Configuration controlling validation behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProfile {
    pub level: ProfileLevel,
    pub expressions: ExpressionPolicy,
    pub warnings_as_errors: bool,
    pub check_security: bool,
    pub check_groups: bool,
    /// Widest field a document may declare, in bits.
    pub max_field_width: u32,
}

impl ValidationProfile {
    pub fn lenient() -> Self {
        Self {
            level: ProfileLevel::Lenient,
            expressions: ExpressionPolicy::Evaluate,
            warnings_as_errors: false,
            check_security: false,
            check_groups: false,
            max_field_width: 128,
        }
    }

    pub fn standard() -> Self {
        Self {
            level: ProfileLevel::Standard,
            expressions: ExpressionPolicy::Evaluate,
            warnings_as_errors: false,
            check_security: true,
            check_groups: true,
            max_field_width: 128,
        }
    }

    /// Rejects arithmetic in values and promotes warnings to errors.
    pub fn strict() -> Self {
        Self {
            level: ProfileLevel::Strict,
            expressions: ExpressionPolicy::Reject,
            warnings_as_errors: true,
            check_security: true,
            check_groups: true,
            max_field_width: 128,
        }
    }

    /// Look up a preset by name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::lenient()),
            "standard" | "default" => Ok(Self::standard()),
            "strict" => Ok(Self::strict()),
            _ => Err(VerifyError::UnknownProfile(name.to_string())),
        }
    }
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self::standard()
    }
}
