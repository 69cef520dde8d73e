use std::collections::BTreeMap;

use serde_json::Value;
use ttp_core::{
    catalog, Capability, Finding, FindingCode, InstructionKind, Link, Location, MatchType,
    MatchTypeSet, MissBehavior, NextTable, PatternModel, Table, TableId, VariableScope,
};

use crate::fields::match_types;
use crate::instructions::instruction;
use crate::reader::{DocReader, Object};
use crate::variables::load_variables;

/// Name reserved for "leave the pipeline" in `next_tables`.
pub const TERMINAL: &str = "terminal";

/// Highest table id OpenFlow assigns to a real table.
pub const MAX_TABLE_INDEX: u32 = 254;

pub(crate) fn load_tables(reader: &mut DocReader, value: &Value, model: &mut PatternModel) {
    let loc = Location::section("tables");
    let Some(items) = reader.array(value, &loc) else {
        return;
    };
    let mut names: BTreeMap<String, usize> = BTreeMap::new();
    let mut indices: BTreeMap<u32, String> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        let item_loc = loc.child(i);
        let Some(obj) = reader.object(item, &item_loc) else {
            continue;
        };
        let Some(name) = reader.required_str(obj, "name", &item_loc) else {
            continue;
        };
        let tloc = loc.child(&name);
        if !reader.check_name(&name, &tloc) {
            continue;
        }
        if name == TERMINAL {
            reader.push(Finding::error(
                FindingCode::ReservedName,
                tloc.clone(),
                format!("'{TERMINAL}' is reserved for the end of the pipeline"),
            ));
            continue;
        }
        if let Some(first) = names.get(&name) {
            reader.structural(
                &tloc,
                format!("duplicate table name '{name}' (first declared at position {first})"),
            );
            continue;
        }
        names.insert(name.clone(), i);

        let Some(index_value) = obj.get("index") else {
            reader.structural(&tloc, "missing required key 'index'");
            continue;
        };
        let Some(index) = reader.integer(index_value, &tloc.child("index")) else {
            continue;
        };
        if index > MAX_TABLE_INDEX {
            reader.structural(
                &tloc.child("index"),
                format!("table index {index} is outside 0..={MAX_TABLE_INDEX}"),
            );
            continue;
        }
        if let Some(other) = indices.get(&index) {
            reader.structural(
                &tloc.child("index"),
                format!("table index {index} is already used by '{other}'"),
            );
            continue;
        }
        indices.insert(index, name.clone());

        let id = TableId::from_index(model.tables.len());
        let mut table = Table::new(name, index);
        table.doc = reader.doc(obj, &tloc);
        if let Some(v) = obj.get("variables") {
            table.variables = load_variables(
                reader,
                v,
                &tloc.child("variables"),
                VariableScope::Table(id),
                model,
            );
        }
        table.capabilities = capabilities(reader, obj, &tloc);
        load_instructions(reader, obj, &tloc, &mut table);
        load_next_tables(reader, obj, &tloc, &mut table);
        if let Some(v) = obj.get("miss") {
            table.miss = miss(reader, v, &tloc.child("miss"));
        }
        table.groups = reader
            .string_list(obj, "groups", &tloc)
            .into_iter()
            .map(Link::new)
            .collect();
        model.tables.push(table);
    }
}

fn capabilities(reader: &mut DocReader, obj: &Object, loc: &Location) -> Vec<Capability> {
    let Some(value) = obj.get("fields") else {
        reader.structural(loc, "missing required key 'fields'");
        return Vec::new();
    };
    let loc = loc.child("fields");
    let mut out = Vec::new();
    match value {
        Value::Object(map) => {
            for (name, spec) in map {
                let cloc = loc.child(name);
                if let Some(cap) = capability_body(reader, name, Some(spec), &cloc) {
                    out.push(cap);
                }
            }
        }
        other => {
            let Some(items) = reader.array(other, &loc) else {
                return out;
            };
            for (i, item) in items.iter().enumerate() {
                let cloc = loc.child(i);
                let cap = match item {
                    Value::String(name) => capability_body(reader, name, None, &cloc),
                    other => reader.object(other, &cloc).and_then(|cobj| {
                        let name = reader.required_str(cobj, "field", &cloc)?;
                        capability_body(reader, &name, Some(other), &cloc)
                    }),
                };
                out.extend(cap);
            }
        }
    }
    out
}

/// Build a capability. `spec` is a match-type list or an object with
/// `match_types` and `domain`/`range`; absent means exact only.
fn capability_body(
    reader: &mut DocReader,
    name: &str,
    spec: Option<&Value>,
    loc: &Location,
) -> Option<Capability> {
    let exact_only = || -> MatchTypeSet { [MatchType::Exact].into_iter().collect() };
    let field = Link::new(catalog::canonical_name(name));
    let Some(spec) = spec else {
        return Some(Capability {
            field,
            match_types: exact_only(),
            domain: None,
        });
    };
    match spec {
        Value::Object(obj) => {
            let types = obj
                .get("match_types")
                .or_else(|| obj.get("match_type"));
            let match_types = match types {
                Some(v) => match_types(reader, v, &loc.child("match_types"))?,
                None => exact_only(),
            };
            let domain = match obj.get("domain").or_else(|| obj.get("range")) {
                Some(v) => Some(reader.bounds(v, &loc.child("domain"))?),
                None => None,
            };
            Some(Capability {
                field,
                match_types,
                domain,
            })
        }
        other => Some(Capability {
            field,
            match_types: match_types(reader, other, loc)?,
            domain: None,
        }),
    }
}

fn load_instructions(reader: &mut DocReader, obj: &Object, loc: &Location, table: &mut Table) {
    let Some(value) = obj.get("instructions") else {
        reader.structural(loc, "missing required key 'instructions'");
        return;
    };
    let loc = loc.child("instructions");
    let Some(items) = reader.array(value, &loc) else {
        return;
    };
    for (i, item) in items.iter().enumerate() {
        if let Some(spec) = instruction(reader, item, &loc.child(i)) {
            table.instructions.push(spec);
        }
    }
}

/// Explicit `next_tables`, then goto-table targets not already listed.
fn load_next_tables(reader: &mut DocReader, obj: &Object, loc: &Location, table: &mut Table) {
    let mut names = reader.string_list(obj, "next_tables", loc);
    for spec in &table.instructions {
        if spec.kind == InstructionKind::GotoTable {
            names.extend(spec.tables.iter().map(|l| l.name.clone()));
        }
    }
    for name in names {
        let next = if name == TERMINAL {
            NextTable::Terminal
        } else {
            NextTable::Table(Link::new(name))
        };
        if !table.next_tables.contains(&next) {
            table.next_tables.push(next);
        }
    }
}

fn miss(reader: &mut DocReader, value: &Value, loc: &Location) -> Option<MissBehavior> {
    match value {
        Value::String(word) => match word.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(MissBehavior::Drop),
            "controller" => Some(MissBehavior::Controller),
            _ => {
                reader.structural(
                    loc,
                    format!("unknown miss behavior '{word}' (expected drop, controller or {{\"goto\": table}})"),
                );
                None
            }
        },
        other => {
            let obj = reader.object(other, loc)?;
            let target = reader.required_str(obj, "goto", loc)?;
            Some(MissBehavior::Goto(Link::new(target)))
        }
    }
}
