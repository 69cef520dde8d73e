//! Candidate rules: concrete flow entries to fit against a pattern.
//!
//! Decoded from JSON. Every value in a candidate is a constant; the
//! value forms are the ones patterns accept (integers, addresses,
//! reserved names, constant expressions).

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use ttp_core::{catalog, value, ActionKind, ActionSpec, InstructionKind, Link, MatchType, ValueExpr};

use crate::error::{FitError, Result};

/// Target table, by name or pipeline index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TableRef {
    Name(String),
    Index(u32),
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::Name(name) => f.write_str(name),
            TableRef::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// How a candidate matches one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSpec {
    Exact(u128),
    Masked { value: u128, mask: u128 },
    Prefix { value: u128, len: u32 },
    Range { lo: u128, hi: u128 },
    Wildcard,
}

impl MatchSpec {
    /// The match type this match needs, given the field width. A full mask
    /// or prefix is an exact match; an empty one is a wildcard.
    pub fn match_type(&self, width: u32) -> MatchType {
        let full = ttp_core::interval::width_max(width);
        match *self {
            MatchSpec::Exact(_) => MatchType::Exact,
            MatchSpec::Masked { mask: 0, .. } | MatchSpec::Prefix { len: 0, .. } => {
                MatchType::Wildcard
            }
            MatchSpec::Masked { mask, .. } if mask == full => MatchType::Exact,
            MatchSpec::Masked { .. } => MatchType::Mask,
            MatchSpec::Prefix { len, .. } if len == width => MatchType::Exact,
            MatchSpec::Prefix { .. } => MatchType::Prefix,
            MatchSpec::Range { lo, hi } if lo == hi => MatchType::Exact,
            MatchSpec::Range { .. } => MatchType::Range,
            MatchSpec::Wildcard => MatchType::Wildcard,
        }
    }

    /// Values this match pins down, for width and domain checks.
    pub fn values(&self) -> Vec<u128> {
        match *self {
            MatchSpec::Exact(v) => vec![v],
            MatchSpec::Masked { value, mask } => vec![value, mask],
            MatchSpec::Prefix { value, .. } => vec![value],
            MatchSpec::Range { lo, hi } => vec![lo, hi],
            MatchSpec::Wildcard => Vec::new(),
        }
    }

    /// The single matched value, for prerequisite checks.
    pub fn exact_value(&self, width: u32) -> Option<u128> {
        match *self {
            MatchSpec::Exact(v) => Some(v),
            MatchSpec::Range { lo, hi } if lo == hi => Some(lo),
            MatchSpec::Masked { value, .. } | MatchSpec::Prefix { value, .. }
                if self.match_type(width) == MatchType::Exact =>
            {
                Some(value)
            }
            _ => None,
        }
    }
}

/// One field match of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    pub field: String,
    pub spec: MatchSpec,
}

/// An action of a candidate; a group action may list the bucket actions
/// the rule relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateAction {
    pub action: ActionSpec,
    pub bucket_actions: Vec<ActionSpec>,
}

/// An instruction of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateInstruction {
    pub kind: InstructionKind,
    pub actions: Vec<CandidateAction>,
    /// Target of goto-table.
    pub table: Option<String>,
    /// Metadata value and mask of write-metadata.
    pub metadata: Option<u128>,
    pub mask: Option<u128>,
}

impl CandidateInstruction {
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            actions: Vec::new(),
            table: None,
            metadata: None,
            mask: None,
        }
    }
}

/// A concrete rule to place into a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRule {
    pub table: TableRef,
    pub matches: Vec<FieldMatch>,
    pub instructions: Vec<CandidateInstruction>,
    pub security_class: Option<String>,
}

impl CandidateRule {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            matches: Vec::new(),
            instructions: Vec::new(),
            security_class: None,
        }
    }

    /// Add a field match.
    pub fn with_match(mut self, field: &str, spec: MatchSpec) -> Self {
        self.matches.push(FieldMatch {
            field: catalog::canonical_name(field),
            spec,
        });
        self
    }

    fn with_unique_match(self, field: &str, spec: MatchSpec, path: &str) -> Result<Self> {
        let name = catalog::canonical_name(field);
        if self.matches.iter().any(|m| m.field == name) {
            return Err(FitError::shape(
                path,
                format!("field '{name}' is matched more than once"),
            ));
        }
        Ok(self.with_match(&name, spec))
    }

    /// Add an instruction.
    pub fn with_instruction(mut self, instruction: CandidateInstruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Decode `{table, match, instructions, security_class?}`.
    pub fn from_json(value: &Value) -> Result<CandidateRule> {
        let obj = object(value, "rule")?;
        let table = match obj.get("table") {
            Some(Value::String(name)) => TableRef::Name(name.clone()),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(TableRef::Index)
                .ok_or_else(|| FitError::shape("table", format!("invalid table index {n}")))?,
            Some(_) => return Err(FitError::shape("table", "expected a table name or index")),
            None => return Err(FitError::shape("rule", "missing required key 'table'")),
        };
        let mut rule = CandidateRule::new(table);
        rule.security_class = match obj.get("security_class") {
            Some(Value::String(class)) => Some(class.clone()),
            Some(_) => return Err(FitError::shape("security_class", "expected a string")),
            None => None,
        };

        match obj.get("match") {
            Some(Value::Object(map)) => {
                for (field, spec) in map {
                    let path = format!("match/{field}");
                    rule = rule.with_unique_match(field, match_spec(spec, &path)?, &path)?;
                }
            }
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let path = format!("match/{i}");
                    let entry = object(item, &path)?;
                    let field = string(entry, "field", &path)?;
                    rule = rule.with_unique_match(&field, match_spec(item, &path)?, &path)?;
                }
            }
            Some(_) => return Err(FitError::shape("match", "expected an object or array")),
            None => {}
        }

        if let Some(v) = obj.get("instructions") {
            let items = v
                .as_array()
                .ok_or_else(|| FitError::shape("instructions", "expected an array"))?;
            for (i, item) in items.iter().enumerate() {
                rule = rule.with_instruction(instruction(item, &format!("instructions/{i}"))?);
            }
        }
        Ok(rule)
    }

    /// Decode a single rule object or an array of them.
    pub fn list_from_json(value: &Value) -> Result<Vec<CandidateRule>> {
        match value {
            Value::Array(items) => items.iter().map(CandidateRule::from_json).collect(),
            other => Ok(vec![CandidateRule::from_json(other)?]),
        }
    }

    /// Decode from JSON text.
    pub fn list_from_str(text: &str) -> Result<Vec<CandidateRule>> {
        let value: Value = serde_json::from_str(text)?;
        CandidateRule::list_from_json(&value)
    }
}

fn object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| FitError::shape(path, "expected an object"))
}

fn string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(FitError::shape(&format!("{path}/{key}"), "expected a string")),
        None => Err(FitError::shape(path, format!("missing required key '{key}'"))),
    }
}

/// A constant value: a JSON integer or value text.
fn constant(value: &Value, path: &str) -> Result<u128> {
    let text = match value {
        Value::Number(n) => {
            return n
                .as_u64()
                .map(u128::from)
                .ok_or_else(|| FitError::shape(path, format!("expected a non-negative integer, found {n}")));
        }
        Value::String(s) => s.trim(),
        _ => return Err(FitError::shape(path, "expected a number or value text")),
    };
    let expr = value::parse_value_text(text).map_err(|source| FitError::Value {
        path: path.to_string(),
        text: text.to_string(),
        source,
    })?;
    expr.eval_constant()
        .ok()
        .and_then(|r| r.as_point())
        .ok_or_else(|| FitError::NotConstant {
            path: path.to_string(),
            text: text.to_string(),
        })
}

fn match_spec(value: &Value, path: &str) -> Result<MatchSpec> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s == "*" {
                return Ok(MatchSpec::Wildcard);
            }
            if let Some((lo, hi)) = s.split_once("..") {
                return range(&Value::from(lo.trim()), &Value::from(hi.trim()), path);
            }
            if let Some((v, len)) = s.rsplit_once('/') {
                return prefix(&Value::from(v.trim()), &Value::from(len.trim()), path);
            }
            Ok(MatchSpec::Exact(constant(value, path)?))
        }
        Value::Number(_) => Ok(MatchSpec::Exact(constant(value, path)?)),
        Value::Object(obj) => {
            if obj.get("wildcard") == Some(&Value::Bool(true)) {
                return Ok(MatchSpec::Wildcard);
            }
            if let Some(r) = obj.get("range") {
                return match r {
                    Value::Array(ends) if ends.len() == 2 => range(&ends[0], &ends[1], path),
                    Value::String(_) => match_spec(r, path).and_then(|spec| match spec {
                        MatchSpec::Range { .. } => Ok(spec),
                        _ => Err(FitError::shape(path, "range must be written 'lo..hi'")),
                    }),
                    _ => Err(FitError::shape(path, "range must be 'lo..hi' or [lo, hi]")),
                };
            }
            if let (Some(lo), Some(hi)) = (obj.get("lo"), obj.get("hi")) {
                return range(lo, hi, path);
            }
            let Some(v) = obj.get("value") else {
                return Err(FitError::shape(path, "expected 'value', 'range' or 'wildcard'"));
            };
            if let Some(mask) = obj.get("mask") {
                let value = constant(v, &format!("{path}/value"))?;
                let mask = constant(mask, &format!("{path}/mask"))?;
                return Ok(MatchSpec::Masked { value, mask });
            }
            if let Some(len) = obj.get("prefix") {
                return prefix(v, len, path);
            }
            Ok(MatchSpec::Exact(constant(v, &format!("{path}/value"))?))
        }
        _ => Err(FitError::shape(path, "expected a value, range or match object")),
    }
}

fn range(lo: &Value, hi: &Value, path: &str) -> Result<MatchSpec> {
    let lo = constant(lo, path)?;
    let hi = constant(hi, path)?;
    if lo > hi {
        return Err(FitError::shape(
            path,
            format!("range {lo:#x}..{hi:#x} has its lower bound above its upper bound"),
        ));
    }
    Ok(MatchSpec::Range { lo, hi })
}

fn prefix(value: &Value, len: &Value, path: &str) -> Result<MatchSpec> {
    let value = constant(value, path)?;
    let len = u32::try_from(constant(len, path)?)
        .map_err(|_| FitError::shape(path, "prefix length out of range"))?;
    Ok(MatchSpec::Prefix { value, len })
}

fn instruction_kind(word: &str, path: &str) -> Result<InstructionKind> {
    if let Some(name) = word.trim().strip_prefix('$') {
        return Ok(InstructionKind::Experimenter(Link::new(name.trim())));
    }
    InstructionKind::parse_keyword(word)
        .ok_or_else(|| FitError::shape(path, format!("unknown instruction '{word}'")))
}

fn instruction(value: &Value, path: &str) -> Result<CandidateInstruction> {
    if let Value::String(word) = value {
        return Ok(CandidateInstruction::new(instruction_kind(word, path)?));
    }
    let obj = object(value, path)?;
    let word = string(obj, "instruction", path)?;
    let mut out = CandidateInstruction::new(instruction_kind(&word, path)?);
    if let Some(v) = obj.get("actions") {
        let items = v
            .as_array()
            .ok_or_else(|| FitError::shape(path, "'actions' must be an array"))?;
        for (i, item) in items.iter().enumerate() {
            out.actions.push(candidate_action(item, &format!("{path}/actions/{i}"))?);
        }
    }
    if let Some(v) = obj.get("table") {
        out.table = Some(match v {
            Value::String(name) => name.clone(),
            _ => return Err(FitError::shape(path, "'table' must be a table name")),
        });
    }
    if let Some(v) = obj.get("value").or_else(|| obj.get("metadata")) {
        out.metadata = Some(constant(v, &format!("{path}/value"))?);
    }
    if let Some(v) = obj.get("mask") {
        out.mask = Some(constant(v, &format!("{path}/mask"))?);
    }
    Ok(out)
}

fn action_spec(value: &Value, path: &str) -> Result<ActionSpec> {
    let (word, obj) = match value {
        Value::String(word) => (word.clone(), None),
        other => {
            let obj = object(other, path)?;
            (string(obj, "action", path)?, Some(obj))
        }
    };
    let kind = match word.trim().strip_prefix('$') {
        Some(name) => ActionKind::Experimenter(Link::new(name.trim())),
        None => ActionKind::parse_keyword(&word)
            .ok_or_else(|| FitError::shape(path, format!("unknown action '{word}'")))?,
    };
    let mut spec = ActionSpec::new(kind);
    let Some(obj) = obj else {
        return Ok(spec);
    };
    if let Some(field) = obj.get("field") {
        let name = field
            .as_str()
            .ok_or_else(|| FitError::shape(path, "'field' must be a string"))?;
        spec.field = Some(Link::new(catalog::canonical_name(name)));
    }
    if let Some(group) = obj.get("group") {
        let name = group
            .as_str()
            .ok_or_else(|| FitError::shape(path, "'group' must be a string"))?;
        spec.group = Some(Link::new(name));
    }
    if let Some(v) = obj.get("port").or_else(|| obj.get("value")) {
        spec.value = Some(ValueExpr::literal(constant(v, &format!("{path}/value"))?));
    }
    Ok(spec)
}

fn candidate_action(value: &Value, path: &str) -> Result<CandidateAction> {
    let action = action_spec(value, path)?;
    let mut bucket_actions = Vec::new();
    if let Some(items) = value.get("actions") {
        let items = items
            .as_array()
            .ok_or_else(|| FitError::shape(path, "'actions' must be an array"))?;
        for (i, item) in items.iter().enumerate() {
            bucket_actions.push(action_spec(item, &format!("{path}/actions/{i}"))?);
        }
    }
    Ok(CandidateAction {
        action,
        bucket_actions,
    })
}
