//! `ttpcheck validate`: load, resolve and validate a pattern.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::debug;

use super::{emit, resolve_format, resolve_profile, verify_document, OutputFormat};
use crate::manifest::CheckManifest;

/// Validate one document and print its report.
pub fn run(
    document: &Path,
    manifest: Option<&CheckManifest>,
    profile: Option<&str>,
    format: Option<&str>,
    output: Option<&Path>,
    warnings_as_errors: bool,
) -> Result<()> {
    let format = resolve_format(format, manifest)?;
    let mut vprofile = resolve_profile(profile, manifest)?;
    if warnings_as_errors || manifest.is_some_and(|m| m.warnings_as_errors()) {
        vprofile.warnings_as_errors = true;
    }
    debug!(profile = ?vprofile.level, document = %document.display(), "validating");

    let verified = verify_document(document, vprofile, format)?;
    let report = verified.report;

    let text = match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => report.to_string(),
    };
    emit(&text, output)?;

    if !report.passed() {
        bail!(
            "validation failed: {} error(s), {} warning(s)",
            report.summary.errors,
            report.summary.warnings
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"{
        "ttp_info": {"name": "l2", "version": "1.0.0"},
        "tables": [{"name": "bridge", "index": 0,
                    "fields": ["eth_dst"], "instructions": ["apply-actions"]}],
        "security": {"doc": "single tenant"}
    }"#;

    fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn clean_document_passes() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(dir.path(), "l2.json", CLEAN);
        run(&doc, None, None, None, None, false).unwrap();
    }

    #[test]
    fn json_report_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(dir.path(), "l2.json", CLEAN);
        let out = dir.path().join("report.json");
        run(&doc, None, Some("strict"), Some("json"), Some(&out), false).unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(report["name"], "l2");
        assert_eq!(report["profile"], "strict");
        assert_eq!(report["summary"]["errors"], 0);
    }

    #[test]
    fn errors_fail_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(
            dir.path(),
            "loop.json",
            r#"{
                "ttp_info": {"name": "loop", "version": "1.0.0"},
                "tables": [
                    {"name": "a", "index": 0, "fields": [],
                     "instructions": [{"instruction": "goto-table", "tables": ["b"]}]},
                    {"name": "b", "index": 1, "fields": [],
                     "instructions": [{"instruction": "goto-table", "tables": ["a"]}]}
                ],
                "security": {"doc": "none"}
            }"#,
        );
        let err = run(&doc, None, None, None, Some(&dir.path().join("r.txt")), false).unwrap_err();
        assert!(err.to_string().starts_with("validation failed"));
    }

    #[test]
    fn warnings_can_fail_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(
            dir.path(),
            "bare.json",
            r#"{"ttp_info": {"name": "bare", "version": "1.0"}, "tables": [], "security": {"doc": "none"}}"#,
        );
        let out = dir.path().join("r.txt");
        run(&doc, None, None, None, Some(&out), false).unwrap();
        assert!(run(&doc, None, None, None, Some(&out), true).is_err());
    }

    #[test]
    fn structural_failure_fails_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let doc = write(dir.path(), "broken.json", r#"{"ttp_info": {"name": "x"}}"#);
        let err = run(&doc, None, None, Some("json"), None, false).unwrap_err();
        assert!(err.to_string().contains("failed to load"));
    }
}
