//! Verification report with summary statistics and findings.

use std::fmt;

use serde::Serialize;
use ttp_core::{FindingSet, PatternModel};

use crate::profile::ProfileLevel;

/// Summary statistics for a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub errors: usize,
    pub warnings: usize,
    pub tables: usize,
    pub groups: usize,
    pub variables: usize,
}

/// The complete verification report.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub name: Option<String>,
    pub profile: ProfileLevel,
    pub summary: ReportSummary,
    /// SHA-256 of the resolved model.
    pub fingerprint: Option<String>,
    pub findings: FindingSet,
}

impl VerificationReport {
    /// Build a report over a resolved model and its findings.
    pub fn build(model: &PatternModel, findings: FindingSet, profile: ProfileLevel) -> Self {
        let summary = ReportSummary {
            errors: findings.error_count(),
            warnings: findings.warning_count(),
            tables: model.tables.len(),
            groups: model.groups.len(),
            variables: model.variables.len(),
        };
        Self {
            name: model.info.as_ref().map(|i| i.name.clone()),
            profile,
            summary,
            fingerprint: model.fingerprint().ok(),
            findings,
        }
    }

    /// True when no error-severity finding was produced.
    pub fn passed(&self) -> bool {
        self.summary.errors == 0
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Verification Report ({:?}) ===", self.profile)?;
        if let Some(name) = &self.name {
            writeln!(f, "Pattern: {name}")?;
        }
        writeln!(
            f,
            "Errors: {} | Warnings: {} | Tables: {} | Groups: {} | Variables: {}",
            self.summary.errors,
            self.summary.warnings,
            self.summary.tables,
            self.summary.groups,
            self.summary.variables,
        )?;
        if let Some(fingerprint) = &self.fingerprint {
            writeln!(f, "Fingerprint: {fingerprint}")?;
        }

        if self.findings.is_empty() {
            writeln!(f, "No findings.")?;
        } else {
            writeln!(f, "--- Findings ---")?;
            for finding in &self.findings {
                writeln!(f, "{finding}")?;
                if let Some(cycle) = &finding.cycle {
                    writeln!(f, "  Cycle: {}", cycle.join(" -> "))?;
                }
                if let Some(s) = &finding.suggestion {
                    writeln!(f, "  Suggestion: {s}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttp_core::{Finding, FindingCode, Location, Table};

    fn model() -> PatternModel {
        let mut model = PatternModel::new();
        model.tables.push(Table::new("ingress", 0));
        model
    }

    #[test]
    fn summary_statistics_correct() {
        let mut findings = FindingSet::new();
        findings.push(Finding::error(
            FindingCode::TableCycle,
            Location::section("tables").child("ingress"),
            "loop",
        ));
        findings.push(Finding::warning(
            FindingCode::SecurityUndocumented,
            Location::section("security"),
            "no doc",
        ));
        let report = VerificationReport::build(&model(), findings, ProfileLevel::Standard);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.tables, 1);
        assert!(!report.passed());
        assert!(report.fingerprint.is_some());
    }

    #[test]
    fn display_lists_findings() {
        let mut findings = FindingSet::new();
        findings.push(
            Finding::error(
                FindingCode::TableCycle,
                Location::section("tables").child("a"),
                "tables form a goto cycle: a -> b -> a",
            )
            .with_cycle(vec!["a".into(), "b".into(), "a".into()])
            .with_suggestion("break the loop"),
        );
        let text = VerificationReport::build(&model(), findings, ProfileLevel::Strict).to_string();
        assert!(text.starts_with("=== Verification Report (Strict) ==="));
        assert!(text.contains("--- Findings ---"));
        assert!(text.contains("[ERROR] TableCycle at tables/a: tables form a goto cycle"));
        assert!(text.contains("  Cycle: a -> b -> a"));
        assert!(text.contains("  Suggestion: break the loop"));
    }

    #[test]
    fn clean_report() {
        let report = VerificationReport::build(&model(), FindingSet::new(), ProfileLevel::Lenient);
        assert!(report.passed());
        assert!(report.to_string().contains("No findings."));
    }
}
