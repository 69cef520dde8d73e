//! Reference resolution and constraint validation for Table Type
//! Patterns.
//!
//! The [`Resolver`] binds every symbolic reference in a loaded
//! [`ttp_core::PatternModel`]; the [`Validator`] then checks the resolved
//! model read-only. [`VerificationEngine`] runs load → resolve → validate
//! under a [`ValidationProfile`] and produces a [`VerificationReport`].

pub mod engine;
pub mod error;
pub mod profile;
pub mod report;
pub mod resolver;
pub mod suggest;
pub mod validator;

pub use engine::{check_documents, VerificationEngine, Verified};
pub use error::{Result, VerifyError};
pub use profile::{ProfileLevel, ValidationProfile};
pub use report::{ReportSummary, VerificationReport};
pub use resolver::Resolver;
pub use validator::Validator;
