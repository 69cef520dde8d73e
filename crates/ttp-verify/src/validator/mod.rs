//! Constraint validator.
//!
//! Walks a resolved [`PatternModel`] and reports every broken invariant.
//! The model is only read; findings go into a [`FindingSet`] passed by
//! reference through each pass. Traversal order is fixed (tables by
//! index, and within a table fields, then groups, then instructions), so
//! an unchanged model always yields the same sequence.

mod fields;
mod graph;
mod groups;
mod security;
mod tables;

use tracing::{debug, info};
use ttp_core::{
    ActionKind, EvalError, Finding, FindingCode, FindingSet, Location, PatternModel, Resolution,
    ValueExpr, ValueRange,
};

use crate::profile::ValidationProfile;

/// Read-only constraint checker.
pub struct Validator;

impl Validator {
    /// Run every check enabled by `profile` and return the findings.
    pub fn validate(model: &PatternModel, profile: &ValidationProfile) -> FindingSet {
        debug!(level = ?profile.level, tables = model.tables.len(), "validating model");
        let mut out = FindingSet::new();

        // 1. Document metadata
        check_version(model, &mut out);

        // 2. Variables and declared fields
        fields::check_variables(model, &mut out);
        fields::check_declared(model, profile, &mut out);

        // 3. Tables in pipeline order
        for id in model.tables_by_index() {
            tables::check_table(model, id, &mut out);
        }

        // 4. Table graph
        graph::check_cycles(model, &mut out);

        // 5. Groups
        if profile.check_groups {
            groups::check_groups(model, &mut out);
        }

        // 6. Security policy
        if profile.check_security {
            security::check_policy(model, &mut out);
        }

        if profile.warnings_as_errors {
            out.promote_warnings();
        }
        info!(
            errors = out.error_count(),
            warnings = out.warning_count(),
            "validation complete"
        );
        out
    }
}

fn check_version(model: &PatternModel, out: &mut FindingSet) {
    let Some(version) = model.info.as_ref().and_then(|i| i.version.as_deref()) else {
        return;
    };
    if let Err(e) = semver::Version::parse(version.trim()) {
        out.push(
            Finding::warning(
                FindingCode::VersionFormat,
                Location::section("ttp_info").child("version"),
                format!("version '{version}' is not major.minor.patch: {e}"),
            )
            .with_suggestion("write the version as e.g. '1.0.0'"),
        );
    }
}

/// The evaluated range of `value`, reporting arithmetic failures.
///
/// Failures caused by a missing, cyclic or symbolic variable were
/// reported during resolution and are skipped here.
pub(crate) fn evaluated(
    model: &PatternModel,
    value: &ValueExpr,
    loc: &Location,
    out: &mut FindingSet,
) -> Option<ValueRange> {
    match &value.value {
        Resolution::Resolved(range) => Some(*range),
        Resolution::Pending => None,
        Resolution::Unresolved => {
            if let Err(e @ (EvalError::Overflow | EvalError::Negative | EvalError::DivideByZero)) =
                model.eval(&value.expr)
            {
                out.push(Finding::error(
                    FindingCode::ArithmeticError,
                    loc.clone(),
                    format!("cannot evaluate '{}': {e}", value.text),
                ));
            }
            None
        }
    }
}

/// Whether `kind` is in the document's global action vocabulary.
pub(crate) fn in_vocabulary(model: &PatternModel, kind: &ActionKind) -> bool {
    model
        .action_vocabulary
        .as_ref()
        .map_or(true, |vocabulary| vocabulary.iter().any(|k| k.same_kind(kind)))
}

pub(crate) fn outside_vocabulary(kind: &ActionKind, loc: Location) -> Finding {
    Finding::error(
        FindingCode::ActionOutsideVocabulary,
        loc,
        format!("action '{kind}' is not in the document's action_vocabulary"),
    )
    .with_suggestion(format!("add '{kind}' to action_vocabulary or remove the action"))
}

/// Render a name path as `a -> b -> a`.
pub(crate) fn show_path(path: &[String]) -> String {
    path.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ttp_core::TtpInfo;

    use crate::resolver::Resolver;

    fn checked(doc: serde_json::Value) -> FindingSet {
        let mut model = ttp_load::load_value(doc, &Default::default())
            .expect("fixture should load")
            .model;
        assert!(Resolver::resolve(&mut model).is_empty());
        Validator::validate(&model, &ValidationProfile::standard())
    }

    #[test]
    fn version_must_be_semver() {
        let mut model = PatternModel::new();
        model.info = Some(TtpInfo {
            name: "t".into(),
            version: Some("1.0".into()),
            ..Default::default()
        });
        let mut out = FindingSet::new();
        check_version(&model, &mut out);
        assert_eq!(out.with_code(FindingCode::VersionFormat).len(), 1);
        assert!(!out.has_errors());

        model.info.as_mut().unwrap().version = Some("1.0.2".into());
        let mut out = FindingSet::new();
        check_version(&model, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn arithmetic_failures_are_findings() {
        let out = checked(json!({
            "ttp_info": {"name": "t", "version": "1.0.0"},
            "variables": [{"name": "n", "value": "1 - 2"}],
            "tables": [],
            "security": {"doc": "none"}
        }));
        let errors = out.with_code(FindingCode::ArithmeticError);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("result may be negative"));
        assert_eq!(errors[0].location.to_string(), "variables/n");
    }

    #[test]
    fn warnings_promoted_under_strict_profile() {
        let mut model = ttp_load::load_value(
            json!({"ttp_info": {"name": "t", "version": "1"}, "tables": [], "security": {"doc": "x"}}),
            &Default::default(),
        )
        .unwrap()
        .model;
        Resolver::resolve(&mut model);
        let standard = Validator::validate(&model, &ValidationProfile::standard());
        assert_eq!(standard.warning_count(), 1);
        let strict = Validator::validate(&model, &ValidationProfile::strict());
        assert_eq!(strict.warning_count(), 0);
        assert_eq!(strict.error_count(), 1);
    }

    #[test]
    fn vocabulary_defaults_to_everything() {
        let mut model = PatternModel::new();
        assert!(in_vocabulary(&model, &ActionKind::PushVlan));
        model.action_vocabulary = Some(vec![ActionKind::Output]);
        assert!(!in_vocabulary(&model, &ActionKind::PushVlan));
        assert!(in_vocabulary(&model, &ActionKind::Output));
    }
}
