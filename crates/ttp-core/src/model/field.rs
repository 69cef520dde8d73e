use serde::{Deserialize, Serialize};

use super::{Bounds, ExtensionId, FieldId, Link, MatchTypeSet, ValueExpr};

/// Where a field declaration comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOrigin {
    /// Built-in OpenFlow 1.3 OXM field.
    Standard,
    /// Declared in the document's `fields` section.
    Declared,
    /// Declared field backed by an experimenter extension.
    Extension(Link<ExtensionId>),
}

/// A field is only meaningful when another field matches one of `values`.
/// An empty `values` list means any exact match of `field` satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub field: Link<FieldId>,
    pub values: Vec<ValueExpr>,
}

/// A matchable packet attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub origin: FieldOrigin,
    pub width: ValueExpr,
    pub match_types: MatchTypeSet,
    pub prerequisite: Option<Prerequisite>,
    pub domain: Option<Bounds>,
    pub doc: Option<String>,
}

impl Field {
    /// Evaluated bit width, when it is a single value.
    pub fn width_bits(&self) -> Option<u32> {
        self.width.point().and_then(|w| u32::try_from(w).ok())
    }

    pub fn is_standard(&self) -> bool {
        self.origin == FieldOrigin::Standard
    }
}
