//! Verification engine orchestrator.
//!
//! Ties together loading, reference resolution and constraint
//! validation into a single pipeline per document.

use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};
use ttp_core::{FindingSet, PatternModel};
use ttp_load::{LoadFailure, LoadOptions, Loaded};

use crate::error::{Result, VerifyError};
use crate::profile::ValidationProfile;
use crate::report::VerificationReport;
use crate::resolver::Resolver;
use crate::validator::Validator;

/// A resolved model together with its report.
#[derive(Debug, Clone)]
pub struct Verified {
    pub model: PatternModel,
    pub report: VerificationReport,
}

/// The main verification engine.
pub struct VerificationEngine {
    profile: ValidationProfile,
}

impl VerificationEngine {
    /// Create a new engine with the given profile.
    pub fn new(profile: ValidationProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ValidationProfile {
        &self.profile
    }

    fn options(&self) -> LoadOptions {
        LoadOptions {
            expressions: self.profile.expressions,
        }
    }

    /// Load, resolve and validate JSON text, keeping the model.
    pub fn verify_str(&self, text: &str) -> std::result::Result<Verified, LoadFailure> {
        ttp_load::load_str(text, &self.options()).map(|loaded| self.run(loaded))
    }

    /// Load, resolve and validate raw bytes in any supported encoding.
    pub fn verify_bytes(&self, bytes: &[u8]) -> std::result::Result<Verified, LoadFailure> {
        ttp_load::load_bytes(bytes, &self.options()).map(|loaded| self.run(loaded))
    }

    pub fn verify_value(&self, value: serde_json::Value) -> std::result::Result<Verified, LoadFailure> {
        ttp_load::load_value(value, &self.options()).map(|loaded| self.run(loaded))
    }

    /// Read and verify a document from disk.
    pub fn verify_file(&self, path: &Path) -> Result<Verified> {
        let bytes = fs::read(path).map_err(|source| VerifyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.verify_bytes(&bytes)?)
    }

    pub fn check_str(&self, text: &str) -> std::result::Result<VerificationReport, LoadFailure> {
        self.verify_str(text).map(|v| v.report)
    }

    pub fn check_value(
        &self,
        value: serde_json::Value,
    ) -> std::result::Result<VerificationReport, LoadFailure> {
        self.verify_value(value).map(|v| v.report)
    }

    fn run(&self, loaded: Loaded) -> Verified {
        let Loaded {
            mut model,
            findings: load_findings,
        } = loaded;

        // 1. Resolve references
        let resolve_findings = Resolver::resolve(&mut model);

        // 2. Validate constraints
        let validate_findings = Validator::validate(&model, &self.profile);

        // 3. Merge in pipeline order
        let mut findings = FindingSet::new();
        findings.extend(load_findings);
        findings.extend(resolve_findings);
        findings.extend(validate_findings);
        if self.profile.warnings_as_errors {
            findings.promote_warnings();
        }
        debug!(findings = findings.len(), "pipeline finished");

        // 4. Build report
        let report = VerificationReport::build(&model, findings, self.profile.level);
        info!(
            errors = report.summary.errors,
            warnings = report.summary.warnings,
            "verification complete"
        );
        Verified { model, report }
    }
}

/// Verify independent documents in parallel, one result per input in
/// input order.
pub fn check_documents(
    documents: &[&str],
    profile: &ValidationProfile,
) -> Vec<std::result::Result<VerificationReport, LoadFailure>> {
    documents
        .par_iter()
        .map(|text| VerificationEngine::new(profile.clone()).check_str(text))
        .collect()
}
