use serde_json::Value;
use ttp_core::{
    Location, PatternModel, Variable, VariableDomain, VariableId, VariableScope,
};

use crate::reader::{variable_name, DocReader};

/// Load a `variables` array into the model, returning the new ids in
/// declaration order.
pub(crate) fn load_variables(
    reader: &mut DocReader,
    value: &Value,
    loc: &Location,
    scope: VariableScope,
    model: &mut PatternModel,
) -> Vec<VariableId> {
    let Some(items) = reader.array(value, loc) else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let item_loc = loc.child(i);
        let variable = match item {
            Value::String(raw) => {
                let name = variable_name(raw);
                if !reader.check_name(&name, &item_loc) {
                    continue;
                }
                Variable::new(name, scope, VariableDomain::Unconstrained)
            }
            other => {
                let Some(obj) = reader.object(other, &item_loc) else {
                    continue;
                };
                let Some(raw) = reader.required_str(obj, "name", &item_loc) else {
                    continue;
                };
                let name = variable_name(&raw);
                let item_loc = loc.child(&name);
                if !reader.check_name(&name, &item_loc) {
                    continue;
                }
                let declared: Vec<&str> = ["range", "value", "symbols"]
                    .into_iter()
                    .filter(|k| obj.contains_key(*k))
                    .collect();
                if declared.len() > 1 {
                    reader.structural(
                        &item_loc,
                        format!("variable declares more than one domain: {}", declared.join(", ")),
                    );
                    continue;
                }
                let domain = if let Some(v) = obj.get("range") {
                    match reader.bounds(v, &item_loc.child("range")) {
                        Some(b) => VariableDomain::Bounds(b),
                        None => continue,
                    }
                } else if let Some(v) = obj.get("value") {
                    match reader.value_expr(v, &item_loc.child("value")) {
                        Some(e) => VariableDomain::Bounds(ttp_core::Bounds::single(e)),
                        None => continue,
                    }
                } else if obj.contains_key("symbols") {
                    VariableDomain::Symbols(reader.string_list(obj, "symbols", &item_loc))
                } else {
                    VariableDomain::Unconstrained
                };
                let mut variable = Variable::new(name, scope, domain);
                variable.doc = reader.doc(obj, &item_loc);
                variable
            }
        };
        ids.push(VariableId::from_index(model.variables.len()));
        model.variables.push(variable);
    }
    ids
}
