use serde::{Deserialize, Serialize};

use super::{FieldId, InstructionKind, Link, TableId};

/// Where a security rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityScope {
    Global,
    Table(Link<TableId>),
}

impl SecurityScope {
    /// Depth in the scope hierarchy; narrower scopes are deeper.
    pub fn depth(&self) -> u8 {
        match self {
            SecurityScope::Global => 0,
            SecurityScope::Table(_) => 1,
        }
    }

    /// True when this scope covers `table`.
    pub fn covers(&self, table: TableId) -> bool {
        match self {
            SecurityScope::Global => true,
            SecurityScope::Table(link) => link.id() == Some(table),
        }
    }
}

/// Access constraints for one security class in one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    pub class: String,
    pub scope: SecurityScope,
    pub permit: Vec<InstructionKind>,
    pub forbid: Vec<InstructionKind>,
    pub read_only_fields: Vec<Link<FieldId>>,
}

/// The document's `security` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub doc: Option<String>,
    pub classes: Vec<String>,
    pub rules: Vec<SecurityRule>,
}

/// Class name used when a rule names none.
pub const DEFAULT_CLASS: &str = "default";

impl SecurityPolicy {
    /// Rules for `class` that cover `table`, broadest scope first.
    pub fn rules_for(&self, class: &str, table: TableId) -> Vec<&SecurityRule> {
        let mut rules: Vec<&SecurityRule> = self
            .rules
            .iter()
            .filter(|r| r.class == class && r.scope.covers(table))
            .collect();
        rules.sort_by_key(|r| r.scope.depth());
        rules
    }

    /// Whether `kind` is forbidden for `class` at `table`. The narrowest
    /// scope that mentions the instruction decides.
    pub fn forbids(&self, class: &str, table: TableId, kind: &InstructionKind) -> bool {
        let mut verdict = false;
        for rule in self.rules_for(class, table) {
            if rule.forbid.iter().any(|k| k.same_kind(kind)) {
                verdict = true;
            } else if rule.permit.iter().any(|k| k.same_kind(kind)) {
                verdict = false;
            }
        }
        verdict
    }

    /// Whether `field` is read-only for `class` at `table`.
    pub fn read_only(&self, class: &str, table: TableId, field: FieldId) -> bool {
        self.rules_for(class, table)
            .iter()
            .any(|r| r.read_only_fields.iter().any(|l| l.id() == Some(field)))
    }
}
