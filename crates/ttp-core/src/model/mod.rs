//! The in-memory pattern model.
//!
//! Entities are stored in per-kind arenas on [`PatternModel`] and addressed
//! by typed indices. The loader fills the arenas and leaves every
//! cross-reference as a pending [`Link`]; the resolver then fills each
//! link's target. After resolution the model is only read.

mod extension;
mod field;
mod group;
mod instruction;
mod security;
mod table;
mod variable;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::error::Result;
use crate::expr::Expr;
use crate::hash::{content_hash, hash_hex};
use crate::interval::ValueRange;

pub use extension::{ExtensionIdentifier, ExtensionKind};
pub use field::{Field, FieldOrigin, Prerequisite};
pub use group::{Bucket, Group, GroupType};
pub use instruction::{ActionKind, ActionSpec, InstructionKind, InstructionSpec};
pub use security::{SecurityPolicy, SecurityRule, SecurityScope, DEFAULT_CLASS};
pub use table::{Capability, MatchType, MatchTypeSet, MissBehavior, NextTable, Table};
pub use variable::{lookup_range, Variable, VariableDomain, VariableScope, VariableState};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// The id of the arena slot at `index`.
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

arena_id!(
    /// Position of a table in [`PatternModel::tables`] (declaration order,
    /// not the pipeline index).
    TableId,
    "table"
);
arena_id!(
    /// Position of a field in [`PatternModel::fields`].
    FieldId,
    "field"
);
arena_id!(
    /// Position of a group in [`PatternModel::groups`].
    GroupId,
    "group"
);
arena_id!(
    /// Position of a variable in [`PatternModel::variables`].
    VariableId,
    "variable"
);
arena_id!(
    /// Position of an extension in [`PatternModel::extensions`].
    ExtensionId,
    "extension"
);

/// State of a symbolic reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution<T> {
    /// Not yet visited by the resolver.
    Pending,
    Resolved(T),
    /// Visited; the target is missing, ambiguous, or cyclic.
    Unresolved,
}

impl<T> Resolution<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Resolution::Pending)
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolution::Resolved(t) => Some(t),
            _ => None,
        }
    }
}

/// A reference by name to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link<I> {
    pub name: String,
    pub target: Resolution<I>,
}

impl<I: Copy> Link<I> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: Resolution::Pending,
        }
    }

    /// A link that is already bound.
    pub fn resolved(name: impl Into<String>, id: I) -> Self {
        Self {
            name: name.into(),
            target: Resolution::Resolved(id),
        }
    }

    pub fn id(&self) -> Option<I> {
        self.target.resolved().copied()
    }

    pub fn is_pending(&self) -> bool {
        self.target.is_pending()
    }
}

/// A numeric quantity as written, its parsed expression, and the range
/// the resolver evaluated it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueExpr {
    pub text: String,
    pub expr: Expr,
    pub value: Resolution<ValueRange>,
}

impl ValueExpr {
    pub fn new(text: impl Into<String>, expr: Expr) -> Self {
        Self {
            text: text.into(),
            expr,
            value: Resolution::Pending,
        }
    }

    /// A literal that needs no evaluation.
    pub fn literal(v: u128) -> Self {
        Self {
            text: v.to_string(),
            expr: Expr::Lit(v),
            value: Resolution::Resolved(ValueRange::point(v)),
        }
    }

    pub fn range(&self) -> Option<ValueRange> {
        self.value.resolved().copied()
    }

    /// The evaluated value when it is a single point.
    pub fn point(&self) -> Option<u128> {
        self.range().and_then(|r| r.as_point())
    }
}

/// An inclusive `lo..hi` domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub lo: ValueExpr,
    pub hi: ValueExpr,
}

impl Bounds {
    /// A single-value domain.
    pub fn single(value: ValueExpr) -> Self {
        Self {
            lo: value.clone(),
            hi: value,
        }
    }

    /// Evaluated extent: lowest possible `lo` to highest possible `hi`.
    pub fn range(&self) -> Option<ValueRange> {
        let lo = self.lo.range()?;
        let hi = self.hi.range()?;
        Some(ValueRange { lo: lo.lo, hi: hi.hi })
    }
}

/// Document metadata from `ttp_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtpInfo {
    pub name: String,
    pub authority: Option<String>,
    pub version: Option<String>,
    pub of_version: Option<String>,
    pub doc: Option<String>,
}

/// A loaded Table Type Pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternModel {
    pub info: Option<TtpInfo>,
    pub tables: Vec<Table>,
    pub fields: Vec<Field>,
    pub groups: Vec<Group>,
    pub variables: Vec<Variable>,
    pub extensions: Vec<ExtensionIdentifier>,
    pub security: SecurityPolicy,
    /// Global action vocabulary, when the document restricts it.
    pub action_vocabulary: Option<Vec<ActionKind>>,
    /// Top-level keys the loader does not interpret.
    pub extras: BTreeMap<String, serde_json::Value>,
    /// Set once the resolver has run.
    pub resolved: bool,
}

impl PatternModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.index())
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.index())
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.index())
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn extension(&self, id: ExtensionId) -> Option<&ExtensionIdentifier> {
        self.extensions.get(id.index())
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables
            .iter()
            .position(|t| t.name == name)
            .map(TableId::from_index)
    }

    /// Find a table by its pipeline index.
    pub fn table_at(&self, index: u32) -> Option<TableId> {
        self.tables
            .iter()
            .position(|t| t.index == index)
            .map(TableId::from_index)
    }

    /// Look up a field; spelling is normalized through the catalogue.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        let canonical = catalog::canonical_name(name);
        self.fields
            .iter()
            .position(|f| f.name == canonical)
            .map(FieldId::from_index)
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g.name == name)
            .map(GroupId::from_index)
    }

    /// All table ids, ordered by pipeline index then declaration order.
    pub fn tables_by_index(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = (0..self.tables.len()).map(TableId::from_index).collect();
        ids.sort_by_key(|id| (self.tables[id.index()].index, *id));
        ids
    }

    /// Display name of a field link, falling back to the name as written.
    pub fn field_name<'a>(&'a self, link: &'a Link<FieldId>) -> &'a str {
        link.id()
            .and_then(|id| self.field(id))
            .map_or(link.name.as_str(), |f| f.name.as_str())
    }

    /// Evaluate an expression against the model's variable states.
    pub fn eval(&self, expr: &Expr) -> std::result::Result<ValueRange, crate::expr::EvalError> {
        expr.eval(&|link: &Link<VariableId>| lookup_range(&self.variables, link))
    }

    /// SHA-256 over the serialized model, as hex.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(hash_hex(&content_hash(self)?))
    }
}
