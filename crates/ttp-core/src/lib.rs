//! Core model for Table Type Patterns.
//!
//! A Table Type Pattern (TTP) describes the flow tables, match fields,
//! instructions, groups, and security restrictions a switch pipeline
//! supports. This crate holds the in-memory [`PatternModel`] that the
//! loader builds, the resolver links, and the validator and fitter read.
//!
//! Entities live in arenas indexed by typed identifiers ([`TableId`],
//! [`FieldId`], ...). Cross references are [`Link`]s carrying the name as
//! written plus a [`Resolution`] slot filled in by the resolver.

pub mod catalog;
pub mod error;
pub mod expr;
pub mod finding;
pub mod hash;
pub mod interval;
pub mod model;
pub mod value;

pub use error::{CoreError, Result};
pub use expr::{BinaryOp, EvalError, Expr, ExprError, ExpressionPolicy};
pub use finding::{Category, Finding, FindingCode, FindingSet, Location, Severity};
pub use hash::{content_hash, hash_hex, ContentHash};
pub use interval::ValueRange;
pub use model::{
    ActionKind, ActionSpec, Bounds, Bucket, Capability, ExtensionId, ExtensionIdentifier,
    ExtensionKind, Field, FieldId, FieldOrigin, Group, GroupId, GroupType, InstructionKind,
    InstructionSpec, Link, MatchType, MatchTypeSet, MissBehavior, NextTable, PatternModel,
    Prerequisite, Resolution, SecurityPolicy, SecurityRule, SecurityScope, Table, TableId,
    TtpInfo, ValueExpr, Variable, VariableDomain, VariableId, VariableScope, VariableState,
    lookup_range, DEFAULT_CLASS,
};
