//! Fit candidate rules against a resolved pattern.
//!
//! Every failing check is collected. Only an unknown target table stops
//! the fit early, since every later check is relative to that table.

use std::collections::HashSet;
use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use ttp_core::interval::width_max;
use ttp_core::{
    ActionKind, ActionSpec, ExtensionId, InstructionKind, InstructionSpec, Link,
    MatchType, PatternModel, Table, TableId, ValueRange, DEFAULT_CLASS,
};

use crate::rule::{CandidateAction, CandidateInstruction, CandidateRule, FieldMatch, MatchSpec, TableRef};

const METADATA_BITS: u32 = 64;

/// Why a candidate does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnknownTable,
    UnknownField,
    FieldNotMatched,
    UnsupportedMatch,
    OutOfRange,
    OutsideDomain,
    PrerequisiteUnmet,
    InstructionNotAllowed,
    GotoNotAllowed,
    MetadataMask,
    ActionNotAllowed,
    UnknownGroup,
    GroupNotAllowed,
    GroupActionNotAllowed,
    SecurityForbidden,
    ReadOnlyField,
    DuplicateMatch,
}

/// One reason a candidate does not fit, naming the offending field,
/// instruction, action, table or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FitViolation {
    pub subject: String,
    pub kind: ViolationKind,
    pub detail: String,
}

impl FitViolation {
    fn new(subject: impl Into<String>, kind: ViolationKind, detail: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.detail)
    }
}

/// Outcome of fitting one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "violations", rename_all = "snake_case")]
pub enum FitResult {
    Fits,
    DoesNotFit(Vec<FitViolation>),
}

impl FitResult {
    fn from_violations(violations: Vec<FitViolation>) -> Self {
        if violations.is_empty() {
            FitResult::Fits
        } else {
            FitResult::DoesNotFit(violations)
        }
    }

    pub fn fits(&self) -> bool {
        matches!(self, FitResult::Fits)
    }

    pub fn violations(&self) -> &[FitViolation] {
        match self {
            FitResult::Fits => &[],
            FitResult::DoesNotFit(v) => v,
        }
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitResult::Fits => f.write_str("fits"),
            FitResult::DoesNotFit(violations) => {
                write!(f, "does not fit")?;
                for v in violations {
                    write!(f, "\n  - {v}")?;
                }
                Ok(())
            }
        }
    }
}

/// Fit one candidate rule. `model` must already be resolved.
pub fn fit(model: &PatternModel, rule: &CandidateRule) -> FitResult {
    let mut out = Vec::new();

    // 1. Target table.
    let table_id = match &rule.table {
        TableRef::Name(name) => model.table_id(name),
        TableRef::Index(index) => model.table_at(*index),
    };
    let Some((table_id, table)) = table_id.and_then(|id| model.table(id).map(|t| (id, t))) else {
        out.push(FitViolation::new(
            rule.table.to_string(),
            ViolationKind::UnknownTable,
            "table is not declared",
        ));
        debug!(table = %rule.table, "candidate targets an unknown table");
        return FitResult::DoesNotFit(out);
    };

    let fitter = Fitter {
        model,
        table_id,
        table,
        class: rule.security_class.as_deref().unwrap_or(DEFAULT_CLASS),
    };

    // 2. Field matches, each field at most once.
    let mut matched = HashSet::new();
    for m in &rule.matches {
        if !matched.insert(m.field.as_str()) {
            out.push(FitViolation::new(
                &m.field,
                ViolationKind::DuplicateMatch,
                "field is matched more than once",
            ));
            continue;
        }
        fitter.check_match(m, &rule.matches, &mut out);
    }

    // 3-4. Instructions, their actions and groups.
    for instruction in &rule.instructions {
        fitter.check_instruction(instruction, &mut out);
    }

    debug!(table = %table.name, violations = out.len(), "fitted candidate rule");
    FitResult::from_violations(out)
}

/// Fit many candidates against one model in parallel. Results keep the
/// order of `rules`.
pub fn fit_batch(model: &PatternModel, rules: &[CandidateRule]) -> Vec<FitResult> {
    let results: Vec<FitResult> = rules.par_iter().map(|rule| fit(model, rule)).collect();
    info!(
        rules = rules.len(),
        fitting = results.iter().filter(|r| r.fits()).count(),
        "fitted candidate batch"
    );
    results
}

struct Fitter<'a> {
    model: &'a PatternModel,
    table_id: TableId,
    table: &'a Table,
    class: &'a str,
}

impl Fitter<'_> {
    fn check_match(&self, m: &FieldMatch, all: &[FieldMatch], out: &mut Vec<FitViolation>) {
        let Some((field_id, field)) = self
            .model
            .field_id(&m.field)
            .and_then(|id| self.model.field(id).map(|f| (id, f)))
        else {
            out.push(FitViolation::new(
                &m.field,
                ViolationKind::UnknownField,
                "field is not declared",
            ));
            return;
        };
        let Some(capability) = self.table.capability(field_id) else {
            out.push(FitViolation::new(
                &field.name,
                ViolationKind::FieldNotMatched,
                format!("not matchable at table '{}'", self.table.name),
            ));
            return;
        };
        let width = field.width_bits();
        let needed = m.spec.match_type(width.unwrap_or(128));
        let supported = capability.match_types.contains(&needed)
            || (needed == MatchType::Prefix && capability.match_types.contains(&MatchType::Mask));
        if !supported {
            out.push(FitViolation::new(
                &field.name,
                ViolationKind::UnsupportedMatch,
                format!("{needed} match not supported"),
            ));
            return;
        }

        if let Some(width) = width {
            let mut fits = true;
            for v in m.spec.values() {
                if !ValueRange::point(v).fits_width(width) {
                    out.push(FitViolation::new(
                        &field.name,
                        ViolationKind::OutOfRange,
                        format!("value {v:#x} does not fit the {width}-bit field"),
                    ));
                    fits = false;
                }
            }
            if let MatchSpec::Prefix { len, .. } = m.spec {
                if len > width {
                    out.push(FitViolation::new(
                        &field.name,
                        ViolationKind::OutOfRange,
                        format!("prefix length {len} exceeds the {width}-bit field"),
                    ));
                    fits = false;
                }
            }
            if !fits {
                return;
            }
        }

        let domain = capability
            .domain
            .as_ref()
            .or(field.domain.as_ref())
            .and_then(|d| d.range());
        let span = matched_span(&m.spec, width.unwrap_or(128));
        if let (Some(domain), Some(span)) = (domain, span) {
            if !domain.covers(&span) {
                out.push(FitViolation::new(
                    &field.name,
                    ViolationKind::OutsideDomain,
                    format!("value {span} is outside the domain {domain}"),
                ));
            }
        }

        if let Some(pre) = &field.prerequisite {
            let pre_name = self.model.field_name(&pre.field);
            let Some(allowed) = pre
                .values
                .iter()
                .map(|v| v.range())
                .collect::<Option<Vec<ValueRange>>>()
            else {
                out.push(FitViolation::new(
                    &field.name,
                    ViolationKind::PrerequisiteUnmet,
                    format!("prerequisite values for '{pre_name}' are unresolved"),
                ));
                return;
            };
            let matched = all
                .iter()
                .filter(|other| match pre.field.id() {
                    Some(id) => self.model.field_id(&other.field) == Some(id),
                    None => other.field == pre.field.name,
                })
                .filter_map(|other| {
                    let width = self
                        .model
                        .field_id(&other.field)
                        .and_then(|id| self.model.field(id))
                        .and_then(|f| f.width_bits())
                        .unwrap_or(128);
                    other.spec.exact_value(width)
                })
                .any(|v| {
                    allowed.is_empty() || allowed.iter().any(|r| r.covers(&ValueRange::point(v)))
                });
            if !matched {
                let detail = if allowed.is_empty() {
                    format!("requires an exact match on '{pre_name}'")
                } else {
                    let values: Vec<String> = allowed.iter().map(|r| r.to_string()).collect();
                    format!("requires '{pre_name}' to match {}", values.join(" or "))
                };
                out.push(FitViolation::new(
                    &field.name,
                    ViolationKind::PrerequisiteUnmet,
                    detail,
                ));
            }
        }
    }

    fn check_instruction(&self, instruction: &CandidateInstruction, out: &mut Vec<FitViolation>) {
        let kind = self.bind_instruction(&instruction.kind);
        let subject = kind.to_string();
        let Some(allowed) = self.table.instructions.iter().find(|s| s.kind.same_kind(&kind)) else {
            out.push(FitViolation::new(
                subject,
                ViolationKind::InstructionNotAllowed,
                format!("not allowed at table '{}'", self.table.name),
            ));
            return;
        };
        if self.model.security.forbids(self.class, self.table_id, &kind) {
            out.push(FitViolation::new(
                &subject,
                ViolationKind::SecurityForbidden,
                format!(
                    "forbidden for security class '{}' at table '{}'",
                    self.class, self.table.name
                ),
            ));
        }

        match kind {
            InstructionKind::GotoTable => self.check_goto(instruction, out),
            InstructionKind::WriteMetadata => self.check_metadata(instruction, allowed, out),
            _ => {}
        }

        for action in &instruction.actions {
            self.check_action(action, allowed, &subject, out);
        }
    }

    fn check_goto(&self, instruction: &CandidateInstruction, out: &mut Vec<FitViolation>) {
        let Some(target) = &instruction.table else {
            out.push(FitViolation::new(
                "goto-table",
                ViolationKind::GotoNotAllowed,
                "no target table given",
            ));
            return;
        };
        match self.model.table_id(target) {
            None => out.push(FitViolation::new(
                target,
                ViolationKind::UnknownTable,
                "table is not declared",
            )),
            Some(id) if !self.table.successors().contains(&id) => out.push(FitViolation::new(
                "goto-table",
                ViolationKind::GotoNotAllowed,
                format!(
                    "table '{target}' is not a next table of '{}'",
                    self.table.name
                ),
            )),
            Some(_) => {}
        }
    }

    fn check_metadata(
        &self,
        instruction: &CandidateInstruction,
        allowed: &InstructionSpec,
        out: &mut Vec<FitViolation>,
    ) {
        let full = width_max(METADATA_BITS);
        for v in [instruction.metadata, instruction.mask].into_iter().flatten() {
            if v > full {
                out.push(FitViolation::new(
                    "write-metadata",
                    ViolationKind::OutOfRange,
                    format!("value {v:#x} does not fit {METADATA_BITS}-bit metadata"),
                ));
            }
        }
        let Some(limit) = allowed.mask.as_ref().and_then(|m| m.point()) else {
            return;
        };
        let mask = instruction.mask.unwrap_or(full);
        if mask & !limit != 0 {
            out.push(FitViolation::new(
                "write-metadata",
                ViolationKind::MetadataMask,
                format!("mask {mask:#x} is not within the allowed mask {limit:#x}"),
            ));
        }
    }

    fn check_action(
        &self,
        candidate: &CandidateAction,
        allowed: &InstructionSpec,
        instruction: &str,
        out: &mut Vec<FitViolation>,
    ) {
        let action = self.bind_action(&candidate.action);
        let subject = action.kind.to_string();
        if let Some(list) = &allowed.actions {
            if !list.iter().any(|a| a.permits(&action)) {
                out.push(FitViolation::new(
                    subject,
                    ViolationKind::ActionNotAllowed,
                    format!("not allowed in {instruction} at table '{}'", self.table.name),
                ));
                return;
            }
        }
        if let Some(vocabulary) = &self.model.action_vocabulary {
            if !vocabulary.iter().any(|k| k.same_kind(&action.kind)) {
                out.push(FitViolation::new(
                    subject,
                    ViolationKind::ActionNotAllowed,
                    "not in the action vocabulary",
                ));
                return;
            }
        }

        match &action.kind {
            ActionKind::SetField => self.check_set_field(&action, out),
            ActionKind::Group => self.check_group(&action, &candidate.bucket_actions, out),
            _ => {}
        }
    }

    fn check_set_field(&self, action: &ActionSpec, out: &mut Vec<FitViolation>) {
        let Some(link) = &action.field else {
            out.push(FitViolation::new(
                "set-field",
                ViolationKind::ActionNotAllowed,
                "no target field given",
            ));
            return;
        };
        let Some((id, field)) = link.id().and_then(|id| self.model.field(id).map(|f| (id, f)))
        else {
            out.push(FitViolation::new(
                &link.name,
                ViolationKind::UnknownField,
                "field is not declared",
            ));
            return;
        };
        if let (Some(width), Some(v)) = (field.width_bits(), action.value.as_ref().and_then(|v| v.point())) {
            if !ValueRange::point(v).fits_width(width) {
                out.push(FitViolation::new(
                    &field.name,
                    ViolationKind::OutOfRange,
                    format!("value {v:#x} does not fit the {width}-bit field"),
                ));
            }
        }
        if self.model.security.read_only(self.class, self.table_id, id) {
            out.push(FitViolation::new(
                &field.name,
                ViolationKind::ReadOnlyField,
                format!(
                    "read-only for security class '{}' at table '{}'",
                    self.class, self.table.name
                ),
            ));
        }
    }

    fn check_group(&self, action: &ActionSpec, buckets: &[ActionSpec], out: &mut Vec<FitViolation>) {
        let Some(link) = &action.group else {
            out.push(FitViolation::new(
                "group",
                ViolationKind::UnknownGroup,
                "no target group given",
            ));
            return;
        };
        let Some((id, group)) = link.id().and_then(|id| self.model.group(id).map(|g| (id, g))) else {
            out.push(FitViolation::new(
                &link.name,
                ViolationKind::UnknownGroup,
                "group is not declared",
            ));
            return;
        };
        if !self.table.groups.is_empty() && !self.table.groups.iter().any(|g| g.id() == Some(id)) {
            out.push(FitViolation::new(
                &group.name,
                ViolationKind::GroupNotAllowed,
                format!("not listed at table '{}'", self.table.name),
            ));
        }
        let action_set = group.action_set();
        for bucket_action in buckets {
            let bucket_action = self.bind_action(bucket_action);
            if !action_set.iter().any(|a| a.permits(&bucket_action)) {
                out.push(FitViolation::new(
                    &group.name,
                    ViolationKind::GroupActionNotAllowed,
                    format!("bucket action '{}' is not in the group's action set", bucket_action.kind),
                ));
            }
        }
    }

    fn bind_instruction(&self, kind: &InstructionKind) -> InstructionKind {
        match kind {
            InstructionKind::Experimenter(link) => {
                InstructionKind::Experimenter(self.bind_extension(link))
            }
            other => other.clone(),
        }
    }

    /// Bind the candidate's references the way the resolver binds the
    /// model's, so `permits` compares by id.
    fn bind_action(&self, action: &ActionSpec) -> ActionSpec {
        let mut bound = action.clone();
        if let ActionKind::Experimenter(link) = &action.kind {
            bound.kind = ActionKind::Experimenter(self.bind_extension(link));
        }
        if let Some(link) = &action.field {
            bound.field = Some(bind(link, self.model.field_id(&link.name)));
        }
        if let Some(link) = &action.group {
            bound.group = Some(bind(link, self.model.group_id(&link.name)));
        }
        bound
    }

    /// `ns:id` matches exactly; a bare `id` only when it is unique.
    fn bind_extension(&self, link: &Link<ExtensionId>) -> Link<ExtensionId> {
        let name = link.name.as_str();
        let mut hits = self
            .model
            .extensions
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                if name.contains(':') {
                    e.qualified_name() == name
                } else {
                    e.id == name
                }
            })
            .map(|(i, _)| ExtensionId::from_index(i));
        match (hits.next(), hits.next()) {
            (Some(id), None) => Link::resolved(name, id),
            _ => link.clone(),
        }
    }
}

fn bind<I: Copy>(link: &Link<I>, id: Option<I>) -> Link<I> {
    match id {
        Some(id) => Link::resolved(link.name.clone(), id),
        None => link.clone(),
    }
}

/// The smallest span holding every value a match selects in a
/// `width`-bit field. Bits outside the mask may take any value.
fn matched_span(spec: &MatchSpec, width: u32) -> Option<ValueRange> {
    let full = width_max(width);
    let masked = |value: u128, mask: u128| {
        let mask = mask & full;
        ValueRange::bounded(value & mask, (value | !mask) & full)
    };
    match *spec {
        MatchSpec::Exact(v) => Some(ValueRange::point(v)),
        MatchSpec::Range { lo, hi } => Some(ValueRange::bounded(lo, hi)),
        MatchSpec::Masked { value, mask } => Some(masked(value, mask)),
        MatchSpec::Prefix { value, len } => {
            Some(masked(value, full ^ width_max(width.saturating_sub(len))))
        }
        MatchSpec::Wildcard => None,
    }
}
