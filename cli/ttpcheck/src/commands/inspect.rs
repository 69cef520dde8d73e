//! `ttpcheck inspect`: textual summary of a resolved pattern.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use ttp_core::{
    ExtensionIdentifier, Group, MissBehavior, NextTable, PatternModel, Table, Variable,
    VariableDomain, VariableScope, VariableState,
};

use super::{emit, resolve_format, resolve_profile, verify_document, OutputFormat};
use crate::manifest::CheckManifest;

#[derive(Debug, Serialize)]
struct PatternView {
    name: Option<String>,
    version: Option<String>,
    fingerprint: Option<String>,
    tables: Vec<TableView>,
    groups: Vec<GroupView>,
    variables: Vec<VariableView>,
    extensions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TableView {
    name: String,
    index: u32,
    fields: Vec<FieldView>,
    instructions: Vec<String>,
    next_tables: Vec<String>,
    miss: Option<String>,
    groups: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FieldView {
    field: String,
    match_types: Vec<String>,
    domain: Option<String>,
}

#[derive(Debug, Serialize)]
struct GroupView {
    name: String,
    group_type: String,
    buckets: usize,
    actions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VariableView {
    name: String,
    /// Owning table for table-local variables.
    table: Option<String>,
    value: String,
}

/// Print the resolved model of `document`.
pub fn run(document: &Path, manifest: Option<&CheckManifest>, format: Option<&str>) -> Result<()> {
    let format = resolve_format(format, manifest)?;
    let profile = resolve_profile(None, manifest)?;
    let verified = verify_document(document, profile, format)?;
    let view = PatternView::build(&verified.model, verified.report.fingerprint.clone());
    let text = match format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&view)?),
        OutputFormat::Human => view.to_string(),
    };
    emit(&text, None)
}

impl PatternView {
    fn build(model: &PatternModel, fingerprint: Option<String>) -> Self {
        let info = model.info.as_ref();
        Self {
            name: info.map(|i| i.name.clone()),
            version: info.and_then(|i| i.version.clone()),
            fingerprint,
            tables: model
                .tables_by_index()
                .into_iter()
                .filter_map(|id| model.table(id))
                .map(|t| TableView::build(model, t))
                .collect(),
            groups: model.groups.iter().map(GroupView::build).collect(),
            variables: model
                .variables
                .iter()
                .map(|v| VariableView::build(model, v))
                .collect(),
            extensions: model.extensions.iter().map(extension_line).collect(),
        }
    }
}

impl TableView {
    fn build(model: &PatternModel, table: &Table) -> Self {
        let fields = table
            .capabilities
            .iter()
            .map(|cap| FieldView {
                field: model.field_name(&cap.field).to_string(),
                match_types: cap.match_types.iter().map(|m| m.to_string()).collect(),
                domain: cap.domain.as_ref().and_then(|d| d.range()).map(|r| r.to_string()),
            })
            .collect();
        let next_tables = table
            .next_tables
            .iter()
            .map(|n| match n {
                NextTable::Table(link) => link.name.clone(),
                NextTable::Terminal => "terminal".to_string(),
            })
            .collect();
        let miss = table.miss.as_ref().map(|m| match m {
            MissBehavior::Drop => "drop".to_string(),
            MissBehavior::Controller => "controller".to_string(),
            MissBehavior::Goto(link) => format!("goto {}", link.name),
        });
        Self {
            name: table.name.clone(),
            index: table.index,
            fields,
            instructions: table.instructions.iter().map(|i| i.kind.to_string()).collect(),
            next_tables,
            miss,
            groups: table.groups.iter().map(|g| g.name.clone()).collect(),
        }
    }
}

impl GroupView {
    fn build(group: &Group) -> Self {
        Self {
            name: group.name.clone(),
            group_type: group.group_type.to_string(),
            buckets: group.buckets.len(),
            actions: group.action_set().iter().map(|a| a.kind.to_string()).collect(),
        }
    }
}

impl VariableView {
    fn build(model: &PatternModel, variable: &Variable) -> Self {
        let table = match variable.scope {
            VariableScope::Global => None,
            VariableScope::Table(id) => model.table(id).map(|t| t.name.clone()),
        };
        let value = match (&variable.state, &variable.domain) {
            (VariableState::Resolved(range), _) => range.to_string(),
            (_, VariableDomain::Symbols(symbols)) => format!("one of {}", symbols.join(", ")),
            (VariableState::Cyclic, _) => "cyclic".to_string(),
            (VariableState::Unresolved | VariableState::Pending, _) => "unresolved".to_string(),
            (VariableState::Symbolic, _) => "symbolic".to_string(),
        };
        Self {
            name: variable.name.clone(),
            table,
            value,
        }
    }
}

fn extension_line(ext: &ExtensionIdentifier) -> String {
    format!("${} ({})", ext.qualified_name(), ext.kind)
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

impl fmt::Display for PatternView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "=== Pattern: {}", self.name.as_deref().unwrap_or("unnamed"))?;
        if let Some(version) = &self.version {
            write!(f, " {version}")?;
        }
        writeln!(f, " ===")?;
        if let Some(fp) = &self.fingerprint {
            writeln!(f, "Fingerprint: {fp}")?;
        }

        writeln!(f)?;
        writeln!(f, "--- Tables ---")?;
        for table in &self.tables {
            writeln!(f, "[{}] {}", table.index, table.name)?;
            for field in &table.fields {
                write!(f, "  match {} ({})", field.field, field.match_types.join(", "))?;
                if let Some(domain) = &field.domain {
                    write!(f, " in {domain}")?;
                }
                writeln!(f)?;
            }
            writeln!(f, "  instructions: {}", list(&table.instructions))?;
            writeln!(f, "  next: {}", list(&table.next_tables))?;
            if let Some(miss) = &table.miss {
                writeln!(f, "  miss: {miss}")?;
            }
            if !table.groups.is_empty() {
                writeln!(f, "  groups: {}", table.groups.join(", "))?;
            }
        }

        if !self.groups.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Groups ---")?;
            for group in &self.groups {
                writeln!(
                    f,
                    "{} ({}): {} bucket(s), actions {}",
                    group.name,
                    group.group_type,
                    group.buckets,
                    list(&group.actions)
                )?;
            }
        }

        if !self.variables.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Variables ---")?;
            for var in &self.variables {
                match &var.table {
                    Some(table) => writeln!(f, "{}.{} = {}", table, var.name, var.value)?,
                    None => writeln!(f, "{} = {}", var.name, var.value)?,
                }
            }
        }

        if !self.extensions.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Extensions ---")?;
            for ext in &self.extensions {
                writeln!(f, "{ext}")?;
            }
        }
        Ok(())
    }
}
