use serde_json::Value;
use ttp_core::{
    catalog, Field, FieldOrigin, Link, Location, MatchType, MatchTypeSet, PatternModel,
    Prerequisite,
};

use crate::reader::{extension_ref, DocReader};

/// Parse a match-type keyword or list of keywords.
pub(crate) fn match_types(
    reader: &mut DocReader,
    value: &Value,
    loc: &Location,
) -> Option<MatchTypeSet> {
    let words: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        other => {
            let items = reader.array(other, loc)?;
            let mut words = Vec::new();
            for (i, item) in items.iter().enumerate() {
                words.push(reader.string(item, &loc.child(i))?);
            }
            words
        }
    };
    let mut set = MatchTypeSet::new();
    for word in words {
        match MatchType::parse_keyword(word) {
            Some(types) => set.extend(types),
            None => {
                reader.structural(
                    loc,
                    format!("unknown match type '{word}' (expected exact, mask, prefix, range, wildcard or all_or_exact)"),
                );
                return None;
            }
        }
    }
    Some(set)
}

/// Custom field declarations from the `fields` section. Built-in fields
/// are already in the model.
pub(crate) fn load_fields(reader: &mut DocReader, value: &Value, model: &mut PatternModel) {
    let loc = Location::section("fields");
    let Some(items) = reader.array(value, &loc) else {
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let item_loc = loc.child(i);
        let Some(obj) = reader.object(item, &item_loc) else {
            continue;
        };
        let Some(raw) = reader.required_str(obj, "name", &item_loc) else {
            continue;
        };
        let name = catalog::canonical_name(&raw);
        let item_loc = loc.child(&name);
        if !reader.check_name(&name, &item_loc) {
            continue;
        }
        if catalog::is_standard(&name) {
            reader.structural(
                &item_loc,
                format!("'{name}' is a built-in OpenFlow field and cannot be redeclared"),
            );
            continue;
        }
        let Some(width_value) = obj.get("width") else {
            reader.structural(&item_loc, "missing required key 'width'");
            continue;
        };
        let Some(width) = reader.value_expr(width_value, &item_loc.child("width")) else {
            continue;
        };
        let match_types = match obj.get("match_types") {
            Some(v) => match match_types(reader, v, &item_loc.child("match_types")) {
                Some(set) => set,
                None => continue,
            },
            None => MatchType::ALL.into_iter().collect(),
        };
        let origin = match obj.get("extension") {
            None => FieldOrigin::Declared,
            Some(v) => {
                let ext_loc = item_loc.child("extension");
                let Some(text) = reader.string(v, &ext_loc) else {
                    continue;
                };
                match extension_ref(text) {
                    Some(r) => FieldOrigin::Extension(Link::new(r)),
                    None => {
                        reader.structural(
                            &ext_loc,
                            format!("extension reference '{text}' must start with '$'"),
                        );
                        continue;
                    }
                }
            }
        };
        let prerequisite = match obj.get("prerequisite") {
            None => None,
            Some(v) => match prerequisite(reader, v, &item_loc.child("prerequisite")) {
                Some(p) => Some(p),
                None => continue,
            },
        };
        let domain = match obj.get("domain") {
            None => None,
            Some(v) => match reader.bounds(v, &item_loc.child("domain")) {
                Some(b) => Some(b),
                None => continue,
            },
        };
        model.fields.push(Field {
            name,
            origin,
            width,
            match_types,
            prerequisite,
            domain,
            doc: reader.doc(obj, &item_loc),
        });
    }
}

fn prerequisite(reader: &mut DocReader, value: &Value, loc: &Location) -> Option<Prerequisite> {
    let obj = reader.object(value, loc)?;
    let field = reader.required_str(obj, "field", loc)?;
    let mut values = Vec::new();
    if let Some(v) = obj.get("value") {
        values.push(reader.value_expr(v, &loc.child("value"))?);
    }
    if let Some(v) = obj.get("values") {
        let list_loc = loc.child("values");
        for (i, item) in reader.array(v, &list_loc)?.iter().enumerate() {
            values.push(reader.value_expr(item, &list_loc.child(i))?);
        }
    }
    Some(Prerequisite {
        field: Link::new(catalog::canonical_name(&field)),
        values,
    })
}
