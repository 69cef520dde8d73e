use serde_json::Value;
use ttp_core::{ExtensionIdentifier, ExtensionKind, Location, PatternModel};

use crate::reader::DocReader;

/// `extension_identifiers`: vendor-qualified names for experimenter
/// fields, instructions, actions and errors.
pub(crate) fn load_extensions(reader: &mut DocReader, value: &Value, model: &mut PatternModel) {
    let loc = Location::section("extension_identifiers");
    let Some(items) = reader.array(value, &loc) else {
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let item_loc = loc.child(i);
        let Some(obj) = reader.object(item, &item_loc) else {
            continue;
        };
        let namespace = reader.required_str(obj, "namespace", &item_loc);
        let id = reader.required_str(obj, "id", &item_loc);
        let kind_text = reader.required_str(obj, "type", &item_loc);
        let (Some(namespace), Some(id), Some(kind_text)) = (namespace, id, kind_text) else {
            continue;
        };
        let item_loc = loc.child(format!("{namespace}:{id}"));
        if !reader.check_name(&namespace, &item_loc) || !reader.check_name(&id, &item_loc) {
            continue;
        }
        let Some(kind) = ExtensionKind::parse_keyword(&kind_text) else {
            reader.structural(
                &item_loc.child("type"),
                format!("unknown extension type '{kind_text}' (expected field, instruction, action or error)"),
            );
            continue;
        };
        let exp_id = obj
            .get("exp_id")
            .and_then(|v| reader.integer(v, &item_loc.child("exp_id")));
        let exp_code = obj
            .get("exp_code")
            .and_then(|v| reader.integer(v, &item_loc.child("exp_code")));
        model.extensions.push(ExtensionIdentifier {
            namespace,
            id,
            kind,
            exp_id,
            exp_code,
            doc: reader.doc(obj, &item_loc),
        });
    }
}
