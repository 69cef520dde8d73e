use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ActionSpec, GroupId, Link, ValueExpr};

/// OpenFlow group type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupType {
    All,
    Select,
    Indirect,
    FastFailover,
}

impl GroupType {
    /// Parse `select`, `SELECT`, `OFPGT_SELECT`, `fast_failover`, `ff`.
    pub fn parse_keyword(word: &str) -> Option<GroupType> {
        let lower = word.trim().to_ascii_lowercase().replace('_', "-");
        let bare = lower.strip_prefix("ofpgt-").unwrap_or(&lower);
        let kind = match bare {
            "all" => GroupType::All,
            "select" => GroupType::Select,
            "indirect" => GroupType::Indirect,
            "fast-failover" | "ff" => GroupType::FastFailover,
            _ => return None,
        };
        Some(kind)
    }

    /// Inclusive bucket-count limits for this type.
    pub fn bucket_limits(self) -> (usize, Option<usize>) {
        match self {
            GroupType::Indirect => (1, Some(1)),
            GroupType::All | GroupType::Select | GroupType::FastFailover => (1, None),
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            GroupType::All => "all",
            GroupType::Select => "select",
            GroupType::Indirect => "indirect",
            GroupType::FastFailover => "fast-failover",
        };
        f.write_str(word)
    }
}

/// One bucket of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: Option<String>,
    pub actions: Vec<ActionSpec>,
    pub weight: Option<u32>,
    pub watch_port: Option<ValueExpr>,
    pub watch_group: Option<Link<GroupId>>,
}

impl Bucket {
    pub fn new(actions: Vec<ActionSpec>) -> Self {
        Self {
            name: None,
            actions,
            weight: None,
            watch_port: None,
            watch_group: None,
        }
    }

    pub fn has_watch(&self) -> bool {
        self.watch_port.is_some() || self.watch_group.is_some()
    }
}

/// A named collection of action buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub group_type: GroupType,
    pub buckets: Vec<Bucket>,
    pub doc: Option<String>,
}

impl Group {
    /// Groups referenced from bucket actions or watch slots.
    pub fn referenced_groups(&self) -> Vec<GroupId> {
        let mut out = Vec::new();
        for bucket in &self.buckets {
            for action in &bucket.actions {
                if let Some(id) = action.group.as_ref().and_then(|l| l.id()) {
                    out.push(id);
                }
            }
            if let Some(id) = bucket.watch_group.as_ref().and_then(|l| l.id()) {
                out.push(id);
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Every distinct action used across buckets, in first-use order.
    pub fn action_set(&self) -> Vec<&ActionSpec> {
        let mut out: Vec<&ActionSpec> = Vec::new();
        for action in self.buckets.iter().flat_map(|b| b.actions.iter()) {
            if !out.iter().any(|a| a.permits(action) && action.permits(a)) {
                out.push(action);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionKind;

    #[test]
    fn group_type_spellings() {
        assert_eq!(GroupType::parse_keyword("OFPGT_FF"), Some(GroupType::FastFailover));
        assert_eq!(GroupType::parse_keyword("fast_failover"), Some(GroupType::FastFailover));
        assert_eq!(GroupType::parse_keyword("Indirect"), Some(GroupType::Indirect));
        assert_eq!(GroupType::parse_keyword("random"), None);
    }

    #[test]
    fn indirect_has_exactly_one_bucket() {
        assert_eq!(GroupType::Indirect.bucket_limits(), (1, Some(1)));
        assert_eq!(GroupType::Select.bucket_limits(), (1, None));
    }

    #[test]
    fn action_set_dedups() {
        let group = Group {
            name: "flood".into(),
            group_type: GroupType::All,
            buckets: vec![
                Bucket::new(vec![ActionSpec::new(ActionKind::Output)]),
                Bucket::new(vec![
                    ActionSpec::new(ActionKind::PopVlan),
                    ActionSpec::new(ActionKind::Output),
                ]),
            ],
            doc: None,
        };
        assert_eq!(group.action_set().len(), 2);
    }
}
