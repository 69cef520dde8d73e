use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Bounds, FieldId, GroupId, InstructionSpec, Link, TableId, VariableId};

/// How a field may be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Mask,
    Prefix,
    Range,
    Wildcard,
}

/// A set of match types, ordered for stable output.
pub type MatchTypeSet = BTreeSet<MatchType>;

impl MatchType {
    pub const ALL: [MatchType; 5] = [
        MatchType::Exact,
        MatchType::Mask,
        MatchType::Prefix,
        MatchType::Range,
        MatchType::Wildcard,
    ];

    /// Parse a match-type keyword. `all_or_exact` expands to exact plus
    /// wildcard.
    pub fn parse_keyword(word: &str) -> Option<Vec<MatchType>> {
        let word = word.trim().to_ascii_lowercase().replace('-', "_");
        let parsed = match word.as_str() {
            "exact" => vec![MatchType::Exact],
            "mask" | "masked" => vec![MatchType::Mask],
            "prefix" => vec![MatchType::Prefix],
            "range" => vec![MatchType::Range],
            "wildcard" | "any" => vec![MatchType::Wildcard],
            "all_or_exact" => vec![MatchType::Exact, MatchType::Wildcard],
            _ => return None,
        };
        Some(parsed)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Mask => "mask",
            MatchType::Prefix => "prefix",
            MatchType::Range => "range",
            MatchType::Wildcard => "wildcard",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Match support for one field at one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub field: Link<FieldId>,
    pub match_types: MatchTypeSet,
    /// Values rules at this table may use for the field.
    pub domain: Option<Bounds>,
}

/// A legal successor of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextTable {
    Table(Link<TableId>),
    Terminal,
}

/// What happens to a packet that matches no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissBehavior {
    Drop,
    Controller,
    Goto(Link<TableId>),
}

/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Pipeline position; unique within a model.
    pub index: u32,
    pub doc: Option<String>,
    pub capabilities: Vec<Capability>,
    pub instructions: Vec<InstructionSpec>,
    pub next_tables: Vec<NextTable>,
    pub miss: Option<MissBehavior>,
    pub groups: Vec<Link<GroupId>>,
    /// Variables declared in this table's scope.
    pub variables: Vec<VariableId>,
}

impl Table {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            doc: None,
            capabilities: Vec::new(),
            instructions: Vec::new(),
            next_tables: Vec::new(),
            miss: None,
            groups: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// The capability declared for a resolved field.
    pub fn capability(&self, field: FieldId) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.field.id() == Some(field))
    }

    /// Resolved goto targets: `next_tables` plus a goto miss behavior.
    pub fn successors(&self) -> Vec<TableId> {
        let mut out: Vec<TableId> = self
            .next_tables
            .iter()
            .filter_map(|n| match n {
                NextTable::Table(link) => link.id(),
                NextTable::Terminal => None,
            })
            .collect();
        if let Some(MissBehavior::Goto(link)) = &self.miss {
            if let Some(id) = link.id() {
                out.push(id);
            }
        }
        out.sort();
        out.dedup();
        out
    }

    pub fn allows_terminal(&self) -> bool {
        self.next_tables.contains(&NextTable::Terminal)
    }
}
