//! CLI command implementations.

pub mod fit;
pub mod inspect;
pub mod validate;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ttp_load::LoadFailure;
use ttp_verify::{ValidationProfile, VerificationEngine, Verified, VerifyError};

use crate::manifest::CheckManifest;

/// How a command prints its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Flag first, then `ttpcheck.toml`, then human-readable.
pub fn resolve_format(flag: Option<&str>, manifest: Option<&CheckManifest>) -> Result<OutputFormat> {
    match flag.or_else(|| manifest.and_then(|m| m.output_format())) {
        Some("human") | Some("text") | None => Ok(OutputFormat::Human),
        Some("json") => Ok(OutputFormat::Json),
        Some(other) => bail!("unknown output format: '{other}'. Choose: human, json"),
    }
}

/// Flag first, then `ttpcheck.toml`, then the standard profile.
pub fn resolve_profile(flag: Option<&str>, manifest: Option<&CheckManifest>) -> Result<ValidationProfile> {
    match flag.or_else(|| manifest.and_then(|m| m.default_profile())) {
        None => Ok(ValidationProfile::standard()),
        Some(name) => ValidationProfile::from_name(name)
            .context("choose one of: lenient, standard, strict"),
    }
}

/// Load, resolve and validate a document. A document that cannot be
/// loaded is printed as its structural findings and turned into an error.
pub fn verify_document(
    path: &Path,
    profile: ValidationProfile,
    format: OutputFormat,
) -> Result<Verified> {
    if !path.exists() {
        bail!("pattern file not found: {}", path.display());
    }
    let engine = VerificationEngine::new(profile);
    match engine.verify_file(path) {
        Ok(verified) => Ok(verified),
        Err(VerifyError::Load(failure)) => {
            println!("{}", render_failure(path, &failure, format)?);
            bail!("{}: {failure}", path.display());
        }
        Err(e) => Err(e).with_context(|| format!("checking {}", path.display())),
    }
}

fn render_failure(path: &Path, failure: &LoadFailure, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "document": path.display().to_string(),
            "loaded": false,
            "findings": failure.findings,
        }))?,
        OutputFormat::Human => {
            let mut out = format!("=== Load Failed ({}) ===\n", path.display());
            for finding in failure.findings.iter() {
                out.push_str(&format!("  {finding}\n"));
            }
            out
        }
    })
}

/// Print to stdout, or write to `output` when given.
pub fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats() {
        assert_eq!(resolve_format(None, None).unwrap(), OutputFormat::Human);
        assert_eq!(resolve_format(Some("json"), None).unwrap(), OutputFormat::Json);
        assert!(resolve_format(Some("yaml"), None).is_err());

        let manifest = CheckManifest::from_str("[output]\nformat = \"json\"").unwrap();
        assert_eq!(resolve_format(None, Some(&manifest)).unwrap(), OutputFormat::Json);
        assert_eq!(
            resolve_format(Some("human"), Some(&manifest)).unwrap(),
            OutputFormat::Human
        );
    }

    #[test]
    fn profiles() {
        assert!(resolve_profile(None, None).is_ok());
        assert!(resolve_profile(Some("lenient"), None).is_ok());
        assert!(resolve_profile(Some("strict"), None).unwrap().warnings_as_errors);
        assert!(resolve_profile(Some("paranoid"), None).is_err());

        let manifest = CheckManifest::from_str("[validation]\nprofile = \"strict\"").unwrap();
        let profile = resolve_profile(None, Some(&manifest)).unwrap();
        assert!(profile.warnings_as_errors);
    }

    #[test]
    fn missing_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_document(
            &dir.path().join("absent.json"),
            ValidationProfile::standard(),
            OutputFormat::Human,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
