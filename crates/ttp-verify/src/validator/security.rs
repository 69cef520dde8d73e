//! Security policy consistency.
//!
//! Rules of one class form a two-level hierarchy: global rules, then
//! rules for a single table. A narrower forbid of something a global rule
//! permits is an explicit override (warning); a narrower permit of
//! something a global rule forbids escalates privilege (error); permit
//! and forbid of one instruction in the same scope contradict (error).

use ttp_core::{
    Finding, FindingCode, FindingSet, InstructionKind, Location, PatternModel, SecurityRule,
    SecurityScope, TableId,
};

/// Scope identity; `None` while the table link is unresolved.
fn scope_key(scope: &SecurityScope) -> Option<Option<TableId>> {
    match scope {
        SecurityScope::Global => Some(None),
        SecurityScope::Table(link) => link.id().map(Some),
    }
}

fn mentions(list: &[InstructionKind], kind: &InstructionKind) -> bool {
    list.iter().any(|k| k.same_kind(kind))
}

fn scope_name(rule: &SecurityRule) -> String {
    match &rule.scope {
        SecurityScope::Global => "global scope".to_string(),
        SecurityScope::Table(link) => format!("table '{}'", link.name),
    }
}

pub(crate) fn check_policy(model: &PatternModel, out: &mut FindingSet) {
    let policy = &model.security;
    let undocumented = policy.doc.as_deref().map_or(true, |d| d.trim().is_empty());
    if undocumented {
        out.push(
            Finding::warning(
                FindingCode::SecurityUndocumented,
                Location::section("security"),
                "the security section has no 'doc'",
            )
            .with_suggestion("describe the security considerations of this pattern"),
        );
    }

    for (i, rule) in policy.rules.iter().enumerate() {
        let loc = Location::section("security").child("rules").child(i);
        let Some(key) = scope_key(&rule.scope) else {
            continue;
        };
        let same_class = policy.rules[..=i]
            .iter()
            .enumerate()
            .filter(|(_, other)| other.class == rule.class);

        for (j, other) in same_class {
            let other_key = scope_key(&other.scope);
            if other_key == Some(key) {
                check_contradiction(rule, other, i == j, &loc, out);
            }
        }

        if key.is_some() {
            let globals = policy
                .rules
                .iter()
                .filter(|g| g.class == rule.class && g.scope == SecurityScope::Global);
            for global in globals {
                check_hierarchy(rule, global, &loc, out);
            }
        }
    }
}

/// Permit and forbid of the same instruction within one scope.
fn check_contradiction(
    rule: &SecurityRule,
    other: &SecurityRule,
    same_rule: bool,
    loc: &Location,
    out: &mut FindingSet,
) {
    let mut conflicts: Vec<&InstructionKind> = rule
        .permit
        .iter()
        .filter(|k| mentions(&other.forbid, k))
        .collect();
    if !same_rule {
        conflicts.extend(rule.forbid.iter().filter(|k| mentions(&other.permit, k)));
    }
    for kind in conflicts {
        out.push(
            Finding::error(
                FindingCode::SecurityContradiction,
                loc.clone(),
                format!(
                    "class '{}' both permits and forbids '{kind}' in {}",
                    rule.class,
                    scope_name(rule)
                ),
            )
            .with_suggestion("keep either the permit or the forbid"),
        );
    }
}

/// A table rule against a global rule of the same class.
fn check_hierarchy(rule: &SecurityRule, global: &SecurityRule, loc: &Location, out: &mut FindingSet) {
    for kind in rule.forbid.iter().filter(|k| mentions(&global.permit, k)) {
        out.push(Finding::warning(
            FindingCode::SecurityOverride,
            loc.clone(),
            format!(
                "{} forbids '{kind}' for class '{}', overriding the global permit",
                scope_name(rule),
                rule.class
            ),
        ));
    }
    for kind in rule.permit.iter().filter(|k| mentions(&global.forbid, k)) {
        out.push(
            Finding::error(
                FindingCode::SecurityEscalation,
                loc.clone(),
                format!(
                    "{} permits '{kind}' for class '{}', which a global rule forbids",
                    scope_name(rule),
                    rule.class
                ),
            )
            .with_suggestion("a table rule may only narrow what the global rules allow"),
        );
    }
}
