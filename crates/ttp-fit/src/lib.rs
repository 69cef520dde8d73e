//! Fit concrete flow rules against a Table Type Pattern.
//!
//! A [`CandidateRule`] names a target table, field matches and
//! instructions. [`fit`] checks it against a resolved
//! [`ttp_core::PatternModel`] and returns every reason it does not fit;
//! [`fit_batch`] does the same for many rules in parallel.

pub mod error;
pub mod fitter;
pub mod rule;

pub use error::{FitError, Result};
pub use fitter::{fit, fit_batch, FitResult, FitViolation, ViolationKind};
pub use rule::{CandidateAction, CandidateInstruction, CandidateRule, FieldMatch, MatchSpec, TableRef};
