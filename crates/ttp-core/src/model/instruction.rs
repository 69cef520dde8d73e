use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ExtensionId, FieldId, GroupId, Link, TableId, ValueExpr};

fn normalize_keyword(word: &str, prefix: &str) -> String {
    let lower = word.trim().to_ascii_lowercase().replace('_', "-");
    match lower.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// An instruction a flow entry may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    Meter,
    ApplyActions,
    ClearActions,
    WriteActions,
    WriteMetadata,
    GotoTable,
    /// Experimenter instruction named by an extension reference.
    Experimenter(Link<ExtensionId>),
}

impl InstructionKind {
    /// Parse a standard instruction keyword. Accepts `apply-actions`,
    /// `APPLY_ACTIONS` and `OFPIT_APPLY_ACTIONS`.
    pub fn parse_keyword(word: &str) -> Option<InstructionKind> {
        let kind = match normalize_keyword(word, "ofpit-").as_str() {
            "meter" => InstructionKind::Meter,
            "apply-actions" => InstructionKind::ApplyActions,
            "clear-actions" => InstructionKind::ClearActions,
            "write-actions" => InstructionKind::WriteActions,
            "write-metadata" => InstructionKind::WriteMetadata,
            "goto-table" => InstructionKind::GotoTable,
            _ => return None,
        };
        Some(kind)
    }

    /// Same instruction, comparing extensions by reference name.
    pub fn same_kind(&self, other: &InstructionKind) -> bool {
        match (self, other) {
            (InstructionKind::Experimenter(a), InstructionKind::Experimenter(b)) => {
                match (a.id(), b.id()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.name == b.name,
                }
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// Whether the instruction carries an action list.
    pub fn takes_actions(&self) -> bool {
        matches!(
            self,
            InstructionKind::ApplyActions | InstructionKind::WriteActions
        )
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionKind::Meter => f.write_str("meter"),
            InstructionKind::ApplyActions => f.write_str("apply-actions"),
            InstructionKind::ClearActions => f.write_str("clear-actions"),
            InstructionKind::WriteActions => f.write_str("write-actions"),
            InstructionKind::WriteMetadata => f.write_str("write-metadata"),
            InstructionKind::GotoTable => f.write_str("goto-table"),
            InstructionKind::Experimenter(link) => write!(f, "${}", link.name),
        }
    }
}

/// An instruction a table allows, with its parameter constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSpec {
    pub kind: InstructionKind,
    /// Actions allowed inside an apply/write-actions instruction.
    /// `None` means any action in the global vocabulary.
    pub actions: Option<Vec<ActionSpec>>,
    /// Largest metadata mask a write-metadata instruction may use.
    pub mask: Option<ValueExpr>,
    /// Goto-table targets.
    pub tables: Vec<Link<TableId>>,
}

impl InstructionSpec {
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            actions: None,
            mask: None,
            tables: Vec::new(),
        }
    }
}

/// An action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Output,
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl,
    DecMplsTtl,
    PushVlan,
    PopVlan,
    PushMpls,
    PopMpls,
    SetQueue,
    Group,
    SetNwTtl,
    DecNwTtl,
    SetField,
    PushPbb,
    PopPbb,
    Experimenter(Link<ExtensionId>),
}

const ACTION_KEYWORDS: &[(&str, ActionKind)] = &[
    ("output", ActionKind::Output),
    ("copy-ttl-out", ActionKind::CopyTtlOut),
    ("copy-ttl-in", ActionKind::CopyTtlIn),
    ("set-mpls-ttl", ActionKind::SetMplsTtl),
    ("dec-mpls-ttl", ActionKind::DecMplsTtl),
    ("push-vlan", ActionKind::PushVlan),
    ("pop-vlan", ActionKind::PopVlan),
    ("push-mpls", ActionKind::PushMpls),
    ("pop-mpls", ActionKind::PopMpls),
    ("set-queue", ActionKind::SetQueue),
    ("group", ActionKind::Group),
    ("set-nw-ttl", ActionKind::SetNwTtl),
    ("dec-nw-ttl", ActionKind::DecNwTtl),
    ("set-field", ActionKind::SetField),
    ("push-pbb", ActionKind::PushPbb),
    ("pop-pbb", ActionKind::PopPbb),
];

impl ActionKind {
    /// Parse a standard action keyword (`push-vlan`, `PUSH_VLAN`,
    /// `OFPAT_PUSH_VLAN`).
    pub fn parse_keyword(word: &str) -> Option<ActionKind> {
        let word = normalize_keyword(word, "ofpat-");
        ACTION_KEYWORDS
            .iter()
            .find(|(k, _)| *k == word)
            .map(|(_, kind)| kind.clone())
    }

    /// Same action, comparing extensions by reference name.
    pub fn same_kind(&self, other: &ActionKind) -> bool {
        match (self, other) {
            (ActionKind::Experimenter(a), ActionKind::Experimenter(b)) => {
                match (a.id(), b.id()) {
                    (Some(x), Some(y)) => x == y,
                    _ => a.name == b.name,
                }
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let ActionKind::Experimenter(link) = self {
            return write!(f, "${}", link.name);
        }
        let word = ACTION_KEYWORDS
            .iter()
            .find(|(_, kind)| kind == self)
            .map_or("?", |(k, _)| k);
        f.write_str(word)
    }
}

/// An action together with its operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub kind: ActionKind,
    /// Target field of a set-field action.
    pub field: Option<Link<FieldId>>,
    /// Target group of a group action.
    pub group: Option<Link<GroupId>>,
    /// Port, queue, TTL or field value operand.
    pub value: Option<ValueExpr>,
}

impl ActionSpec {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            field: None,
            group: None,
            value: None,
        }
    }

    /// True when `self` is an allowed form of `candidate`: same kind and,
    /// for set-field, the same field.
    pub fn permits(&self, candidate: &ActionSpec) -> bool {
        if !self.kind.same_kind(&candidate.kind) {
            return false;
        }
        match (&self.field, &candidate.field) {
            (Some(allowed), Some(used)) => match (allowed.id(), used.id()) {
                (Some(a), Some(b)) => a == b,
                _ => allowed.name == used.name,
            },
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_spellings() {
        for word in ["apply-actions", "APPLY_ACTIONS", "OFPIT_APPLY_ACTIONS"] {
            assert_eq!(
                InstructionKind::parse_keyword(word),
                Some(InstructionKind::ApplyActions),
                "{word}"
            );
        }
        assert_eq!(InstructionKind::parse_keyword("jump"), None);
    }

    #[test]
    fn action_spellings_and_display() {
        assert_eq!(ActionKind::parse_keyword("OFPAT_PUSH_VLAN"), Some(ActionKind::PushVlan));
        assert_eq!(ActionKind::PushVlan.to_string(), "push-vlan");
        let ext = ActionKind::Experimenter(Link::new("acme:flood_all"));
        assert_eq!(ext.to_string(), "$acme:flood_all");
    }

    #[test]
    fn set_field_permits_same_field() {
        let mut allowed = ActionSpec::new(ActionKind::SetField);
        allowed.field = Some(Link::resolved("vlan_vid", FieldId(4)));
        let mut used = ActionSpec::new(ActionKind::SetField);
        used.field = Some(Link::resolved("vlan_vid", FieldId(4)));
        assert!(allowed.permits(&used));
        used.field = Some(Link::resolved("eth_dst", FieldId(2)));
        assert!(!allowed.permits(&used));
    }

    #[test]
    fn experimenter_kinds_compare_by_target() {
        let a = InstructionKind::Experimenter(Link::resolved("acme:x", ExtensionId(0)));
        let b = InstructionKind::Experimenter(Link::resolved("x", ExtensionId(0)));
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&InstructionKind::Meter));
    }
}
