//! Findings: structured diagnostics produced while loading, resolving
//! and validating a pattern.
//!
//! A [`Finding`] is immutable once built. Passes push findings into a
//! [`FindingSet`] handed to them by the caller; the set keeps traversal
//! order so two runs over the same model yield identical sequences.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::{content_hash, hash_hex};

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARN"),
        }
    }
}

/// Broad error taxonomy a finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    StructuralError,
    UnresolvedReference,
    CyclicVariable,
    ConstraintViolation,
}

/// Specific finding code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingCode {
    // Loader
    StructuralError,
    ReservedName,
    ExpressionRejected,
    MissingInfo,
    // Resolver
    UnresolvedReference,
    AmbiguousReference,
    ExtensionKindMismatch,
    CyclicVariable,
    DuplicateIdentifier,
    // Validator
    TableCycle,
    GotoNotForward,
    InvalidWidth,
    MatchTypeUnsupported,
    InvalidRange,
    ValueOutOfRange,
    ArithmeticError,
    PrerequisiteMissing,
    MetadataMask,
    ActionOutsideVocabulary,
    GroupBucketCount,
    GroupWeights,
    GroupWatch,
    GroupCycle,
    GroupNotListed,
    SecurityOverride,
    SecurityContradiction,
    SecurityEscalation,
    SecurityUndocumented,
    VersionFormat,
}

impl FindingCode {
    /// The taxonomy bucket of this code.
    pub fn category(self) -> Category {
        use FindingCode::*;
        match self {
            StructuralError | ReservedName | ExpressionRejected | MissingInfo => {
                Category::StructuralError
            }
            UnresolvedReference | AmbiguousReference | ExtensionKindMismatch => {
                Category::UnresolvedReference
            }
            CyclicVariable => Category::CyclicVariable,
            _ => Category::ConstraintViolation,
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Path to the model element a finding is about, e.g.
/// `tables/acl/fields/eth_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location {
    segments: Vec<String>,
}

impl Location {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// A top-level section.
    pub fn section(name: &str) -> Self {
        Self {
            segments: vec![name.to_string()],
        }
    }

    /// Extend this path by one segment.
    pub fn child(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    pub message: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Element names along a reported cycle, first name repeated last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<String>>,
}

impl Finding {
    pub fn error(code: FindingCode, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, location, message)
    }

    pub fn warning(code: FindingCode, location: Location, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, location, message)
    }

    fn new(
        severity: Severity,
        code: FindingCode,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location,
            suggestion: None,
            cycle: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_cycle(mut self, cycle: Vec<String>) -> Self {
        self.cycle = Some(cycle);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn category(&self) -> Category {
        self.code.category()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}: {}",
            self.severity, self.code, self.location, self.message
        )
    }
}

/// Ordered collection of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingSet {
    findings: Vec<Finding>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Finding> {
        self.findings.iter()
    }

    pub fn as_slice(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Findings carrying `code`, in order.
    pub fn with_code(&self, code: FindingCode) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.code == code).collect()
    }

    /// Raise every warning to an error.
    pub fn promote_warnings(&mut self) {
        for finding in &mut self.findings {
            finding.severity = Severity::Error;
        }
    }

    /// SHA-256 over the serialized sequence, as hex.
    pub fn digest(&self) -> Result<String> {
        Ok(hash_hex(&content_hash(&self.findings)?))
    }
}

impl Extend<Finding> for FindingSet {
    fn extend<T: IntoIterator<Item = Finding>>(&mut self, iter: T) {
        self.findings.extend(iter);
    }
}

impl From<Vec<Finding>> for FindingSet {
    fn from(findings: Vec<Finding>) -> Self {
        Self { findings }
    }
}

impl IntoIterator for FindingSet {
    type Item = Finding;
    type IntoIter = std::vec::IntoIter<Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.into_iter()
    }
}

impl<'a> IntoIterator for &'a FindingSet {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.findings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let loc = Location::section("tables").child("acl").child("eth_type");
        assert_eq!(loc.to_string(), "tables/acl/eth_type");
        assert_eq!(Location::root().to_string(), "/");
    }

    #[test]
    fn finding_display() {
        let f = Finding::error(
            FindingCode::TableCycle,
            Location::section("tables").child("A"),
            "goto-table cycle A -> B -> A",
        );
        assert_eq!(
            f.to_string(),
            "[ERROR] TableCycle at tables/A: goto-table cycle A -> B -> A"
        );
    }

    #[test]
    fn categories() {
        assert_eq!(FindingCode::MissingInfo.category(), Category::StructuralError);
        assert_eq!(
            FindingCode::AmbiguousReference.category(),
            Category::UnresolvedReference
        );
        assert_eq!(FindingCode::CyclicVariable.category(), Category::CyclicVariable);
        assert_eq!(FindingCode::GroupWatch.category(), Category::ConstraintViolation);
    }

    #[test]
    fn counts_and_promotion() {
        let mut set = FindingSet::new();
        set.push(Finding::warning(
            FindingCode::SecurityOverride,
            Location::section("security"),
            "override",
        ));
        set.push(Finding::error(
            FindingCode::InvalidWidth,
            Location::section("fields"),
            "zero width",
        ));
        assert_eq!(set.error_count(), 1);
        assert_eq!(set.warning_count(), 1);
        set.promote_warnings();
        assert_eq!(set.error_count(), 2);
    }

    #[test]
    fn digest_tracks_content() {
        let mut a = FindingSet::new();
        a.push(Finding::error(
            FindingCode::GroupWeights,
            Location::section("groups").child("ecmp"),
            "mixed weights",
        ));
        let b = a.clone();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        a.push(Finding::warning(
            FindingCode::MissingInfo,
            Location::root(),
            "no ttp_info",
        ));
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    #[test]
    fn serializes_location_as_segments() {
        let f = Finding::warning(
            FindingCode::VersionFormat,
            Location::section("ttp_info").child("version"),
            "not semver",
        )
        .with_suggestion("use major.minor.patch");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["location"], serde_json::json!(["ttp_info", "version"]));
        assert_eq!(json["code"], "VersionFormat");
        assert_eq!(json["severity"], "warning");
        assert!(json.get("cycle").is_none());
    }
}
