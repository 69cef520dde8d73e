//! Document → [`PatternModel`].

use serde_json::Value;
use tracing::{debug, info};
use ttp_core::{
    catalog, ExpressionPolicy, Finding, FindingCode, FindingSet, Location, PatternModel,
    VariableScope,
};

use crate::decode::decode_text;
use crate::error::LoadFailure;
use crate::extensions::load_extensions;
use crate::fields::load_fields;
use crate::groups::load_groups;
use crate::info::load_info;
use crate::instructions::action_kind;
use crate::reader::DocReader;
use crate::security::load_security;
use crate::tables::load_tables;
use crate::variables::load_variables;

/// Sections the loader interprets. Everything else is pass-through.
const SECTIONS: &[&str] = &[
    "ttp_info",
    "NDM_metadata",
    "tables",
    "security",
    "variables",
    "extension_identifiers",
    "fields",
    "groups",
    "action_vocabulary",
];

const REQUIRED: &[&str] = &["tables", "security"];

/// Loader settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub expressions: ExpressionPolicy,
}

/// A successfully built model plus any warnings found on the way.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub model: PatternModel,
    pub findings: FindingSet,
}

fn failure(loc: Location, message: impl Into<String>) -> LoadFailure {
    let mut findings = FindingSet::new();
    findings.push(Finding::error(FindingCode::StructuralError, loc, message));
    LoadFailure { findings }
}

/// Load a document from raw bytes in any supported encoding.
pub fn load_bytes(bytes: &[u8], options: &LoadOptions) -> Result<Loaded, LoadFailure> {
    let text = decode_text(bytes).map_err(|e| failure(Location::root(), e.to_string()))?;
    load_str(&text, options)
}

/// Load a document from JSON text.
pub fn load_str(text: &str, options: &LoadOptions) -> Result<Loaded, LoadFailure> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| failure(Location::root(), format!("document is not valid JSON: {e}")))?;
    load_value(value, options)
}

/// Load a document from a parsed JSON tree.
pub fn load_value(value: Value, options: &LoadOptions) -> Result<Loaded, LoadFailure> {
    debug!(policy = ?options.expressions, "loading pattern document");
    let mut reader = DocReader::new(options.expressions);
    let Some(root) = reader.object(&value, &Location::root()) else {
        return Err(LoadFailure {
            findings: reader.findings,
        });
    };

    let mut model = PatternModel::new();
    model.fields = catalog::standard_fields();

    // 1. Required sections
    for key in REQUIRED {
        if !root.contains_key(*key) {
            reader.structural(
                &Location::section(key),
                format!("missing required section '{key}'"),
            );
        }
    }

    // 2. Metadata
    load_info(&mut reader, root, &mut model);

    // 3. Extensions and global variables
    if let Some(v) = root.get("extension_identifiers") {
        load_extensions(&mut reader, v, &mut model);
    }
    if let Some(v) = root.get("variables") {
        load_variables(
            &mut reader,
            v,
            &Location::section("variables"),
            VariableScope::Global,
            &mut model,
        );
    }

    // 4. Custom fields
    if let Some(v) = root.get("fields") {
        load_fields(&mut reader, v, &mut model);
    }

    // 5. Tables and groups
    if let Some(v) = root.get("tables") {
        load_tables(&mut reader, v, &mut model);
    }
    if let Some(v) = root.get("groups") {
        load_groups(&mut reader, v, &mut model);
    }

    // 6. Security
    if let Some(v) = root.get("security") {
        load_security(&mut reader, v, &mut model);
    }

    // 7. Action vocabulary
    if let Some(v) = root.get("action_vocabulary") {
        let loc = Location::section("action_vocabulary");
        if let Some(items) = reader.array(v, &loc) {
            let mut vocabulary = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let item_loc = loc.child(i);
                if let Some(word) = reader.string(item, &item_loc) {
                    vocabulary.extend(action_kind(&mut reader, word, &item_loc));
                }
            }
            model.action_vocabulary = Some(vocabulary);
        }
    }

    // 8. Pass-through
    for (key, v) in root {
        if SECTIONS.contains(&key.as_str()) {
            continue;
        }
        if key.starts_with('$') {
            reader.push(Finding::error(
                FindingCode::ReservedName,
                Location::section(key),
                format!("top-level key '{key}' uses the reserved '$' prefix"),
            ));
            continue;
        }
        model.extras.insert(key.clone(), v.clone());
    }

    if reader.findings.has_errors() {
        debug!(
            errors = reader.findings.error_count(),
            "pattern document rejected"
        );
        return Err(LoadFailure {
            findings: reader.findings,
        });
    }
    info!(
        tables = model.tables.len(),
        groups = model.groups.len(),
        variables = model.variables.len(),
        warnings = reader.findings.warning_count(),
        "pattern document loaded"
    );
    Ok(Loaded {
        model,
        findings: reader.findings,
    })
}
