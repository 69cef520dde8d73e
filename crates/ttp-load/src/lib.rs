//! Document loader for Table Type Patterns.
//!
//! Turns a JSON document into a [`ttp_core::PatternModel`] whose
//! references are still unresolved. Malformed input never panics or
//! returns early on the first problem: every structural issue becomes a
//! finding, and if any of them is an error the load fails as a whole
//! with a [`LoadFailure`].

mod extensions;
mod fields;
mod groups;
mod info;
mod instructions;
mod reader;
mod security;
mod tables;
mod variables;

pub mod decode;
pub mod error;
pub mod loader;

pub use decode::decode_text;
pub use error::{LoadError, LoadFailure, Result};
pub use loader::{load_bytes, load_str, load_value, LoadOptions, Loaded};
pub use tables::{MAX_TABLE_INDEX, TERMINAL};
