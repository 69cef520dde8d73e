use serde_json::Value;
use ttp_core::{
    catalog, Finding, FindingCode, InstructionKind, Link, Location, PatternModel, SecurityRule,
    SecurityScope, DEFAULT_CLASS,
};

use crate::instructions::instruction_kind;
use crate::reader::{DocReader, Object};

/// Class name reserved as a wildcard.
const RESERVED_CLASS: &str = "*";

pub(crate) fn load_security(reader: &mut DocReader, value: &Value, model: &mut PatternModel) {
    let loc = Location::section("security");
    let Some(obj) = reader.object(value, &loc) else {
        return;
    };
    model.security.doc = reader.doc(obj, &loc);
    for class in reader.string_list(obj, "classes", &loc) {
        if check_class(reader, &class, &loc.child("classes")) {
            model.security.classes.push(class);
        }
    }
    let Some(rules) = obj.get("rules") else {
        return;
    };
    let rloc = loc.child("rules");
    let Some(items) = reader.array(rules, &rloc) else {
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let item_loc = rloc.child(i);
        let Some(robj) = reader.object(item, &item_loc) else {
            continue;
        };
        if let Some(rule) = rule(reader, robj, &item_loc) {
            model.security.rules.push(rule);
        }
    }
}

fn check_class(reader: &mut DocReader, class: &str, loc: &Location) -> bool {
    if class == RESERVED_CLASS {
        reader.push(Finding::error(
            FindingCode::ReservedName,
            loc.clone(),
            format!("security class '{RESERVED_CLASS}' is reserved"),
        ));
        return false;
    }
    reader.check_name(class, loc)
}

fn rule(reader: &mut DocReader, obj: &Object, loc: &Location) -> Option<SecurityRule> {
    let class = reader
        .optional_str(obj, "class", loc)
        .unwrap_or_else(|| DEFAULT_CLASS.to_string());
    if !check_class(reader, &class, &loc.child("class")) {
        return None;
    }
    let scope = match obj.get("scope") {
        None => SecurityScope::Global,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("global") => SecurityScope::Global,
        Some(other) => {
            let sloc = loc.child("scope");
            let sobj = reader.object(other, &sloc)?;
            SecurityScope::Table(Link::new(reader.required_str(sobj, "table", &sloc)?))
        }
    };
    let permit = instruction_list(reader, obj, "permit", loc)?;
    let forbid = instruction_list(reader, obj, "forbid", loc)?;
    let read_only_fields = reader
        .string_list(obj, "read_only_fields", loc)
        .into_iter()
        .map(|f| Link::new(catalog::canonical_name(&f)))
        .collect();
    Some(SecurityRule {
        class,
        scope,
        permit,
        forbid,
        read_only_fields,
    })
}

fn instruction_list(
    reader: &mut DocReader,
    obj: &Object,
    key: &str,
    loc: &Location,
) -> Option<Vec<InstructionKind>> {
    let lloc = loc.child(key);
    let words = reader.string_list(obj, key, loc);
    let mut out = Vec::new();
    for (i, word) in words.iter().enumerate() {
        out.push(instruction_kind(reader, word, &lloc.child(i))?);
    }
    Some(out)
}
