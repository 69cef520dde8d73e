use std::fmt;

use serde::{Deserialize, Serialize};

/// What an extension identifier names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Field,
    Instruction,
    Action,
    Error,
}

impl ExtensionKind {
    pub fn parse_keyword(word: &str) -> Option<ExtensionKind> {
        let kind = match word.trim().to_ascii_lowercase().as_str() {
            "field" => ExtensionKind::Field,
            "instruction" | "inst" => ExtensionKind::Instruction,
            "action" => ExtensionKind::Action,
            "error" => ExtensionKind::Error,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            ExtensionKind::Field => "field",
            ExtensionKind::Instruction => "instruction",
            ExtensionKind::Action => "action",
            ExtensionKind::Error => "error",
        };
        f.write_str(word)
    }
}

/// A vendor-qualified identifier for a non-standard element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionIdentifier {
    pub namespace: String,
    pub id: String,
    pub kind: ExtensionKind,
    /// Experimenter id (32-bit).
    pub exp_id: Option<u32>,
    pub exp_code: Option<u32>,
    pub doc: Option<String>,
}

impl ExtensionIdentifier {
    /// `namespace:id`.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.namespace, self.id)
    }
}
