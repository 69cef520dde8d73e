//! `ttpcheck fit`: check candidate rules against a pattern.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ttp_fit::{fit_batch, CandidateRule, FitResult};

use super::{emit, resolve_format, resolve_profile, verify_document, OutputFormat};
use crate::manifest::CheckManifest;

/// Fit every rule in `rules` (a JSON rule object or array of them).
pub fn run(
    document: &Path,
    rules: &Path,
    manifest: Option<&CheckManifest>,
    format: Option<&str>,
) -> Result<()> {
    let format = resolve_format(format, manifest)?;
    let profile = resolve_profile(None, manifest)?;
    let verified = verify_document(document, profile, format)?;
    if !verified.report.passed() {
        eprintln!(
            "warning: pattern has {} error finding(s); run 'ttpcheck validate' for details",
            verified.report.summary.errors
        );
    }

    let text = fs::read_to_string(rules).with_context(|| format!("reading {}", rules.display()))?;
    let candidates =
        CandidateRule::list_from_str(&text).with_context(|| format!("parsing {}", rules.display()))?;
    let results = fit_batch(&verified.model, &candidates);

    let out = match format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = candidates
                .iter()
                .zip(&results)
                .enumerate()
                .map(|(i, (rule, result))| {
                    serde_json::json!({
                        "rule": i,
                        "table": rule.table,
                        "fit": result,
                    })
                })
                .collect();
            let doc = serde_json::json!({
                "pattern": verified.report.name,
                "results": entries,
            });
            format!("{}\n", serde_json::to_string_pretty(&doc)?)
        }
        OutputFormat::Human => render(verified.report.name.as_deref(), &candidates, &results),
    };
    emit(&out, None)?;

    let failed = results.iter().filter(|r| !r.fits()).count();
    if failed > 0 {
        bail!("{failed} of {} rule(s) do not fit", results.len());
    }
    Ok(())
}

fn render(pattern: Option<&str>, rules: &[CandidateRule], results: &[FitResult]) -> String {
    let mut out = String::new();
    let fitting = results.iter().filter(|r| r.fits()).count();
    let _ = writeln!(out, "=== Fit Report ({}) ===", pattern.unwrap_or("unnamed"));
    let _ = writeln!(
        out,
        "Rules: {} ({fitting} fit, {} do not fit)",
        results.len(),
        results.len() - fitting
    );
    let _ = writeln!(out);
    for (i, (rule, result)) in rules.iter().zip(results).enumerate() {
        let _ = writeln!(out, "[{i}] table {}: {result}", rule.table);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATTERN: &str = r#"{
        "ttp_info": {"name": "one", "version": "1.0.0"},
        "tables": [{"name": "t0", "index": 0,
                    "fields": [{"field": "eth_type", "match_types": ["exact"]}],
                    "instructions": ["apply-actions"]}],
        "security": {"doc": "none"}
    }"#;

    fn setup(rules: &str) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("one.json");
        let rules_path = dir.path().join("rules.json");
        fs::write(&doc, PATTERN).unwrap();
        fs::write(&rules_path, rules).unwrap();
        (dir, doc, rules_path)
    }

    #[test]
    fn fitting_rules_succeed() {
        let (_dir, doc, rules) = setup(
            r#"[{"table": "t0", "match": {"eth_type": "0x0800"}, "instructions": ["apply-actions"]}]"#,
        );
        run(&doc, &rules, None, None).unwrap();
        run(&doc, &rules, None, Some("json")).unwrap();
    }

    #[test]
    fn non_fitting_rule_fails_the_command() {
        let (_dir, doc, rules) = setup(
            r#"[{"table": "t0", "match": {"eth_type": "0x0800"}},
                {"table": "t0", "match": {"eth_type": "0x0800..0x08ff"}}]"#,
        );
        let err = run(&doc, &rules, None, None).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 rule(s) do not fit");
    }

    #[test]
    fn malformed_rules_are_an_error() {
        let (_dir, doc, rules) = setup(r#"{"match": {}}"#);
        let err = run(&doc, &rules, None, None).unwrap_err();
        assert!(format!("{err:#}").contains("missing required key 'table'"));
    }

    #[test]
    fn human_rendering() {
        let rules = vec![
            CandidateRule::list_from_str(r#"{"table": "t0"}"#).unwrap().remove(0),
        ];
        let text = render(Some("one"), &rules, &[FitResult::Fits]);
        assert!(text.starts_with("=== Fit Report (one) ==="));
        assert!(text.contains("Rules: 1 (1 fit, 0 do not fit)"));
        assert!(text.contains("[0] table t0: fits"));
    }
}
