use serde_json::Value;
use ttp_core::{
    catalog, ActionKind, ActionSpec, InstructionKind, InstructionSpec, Link, Location,
};

use crate::reader::{extension_ref, DocReader, Object};

/// An instruction keyword or `$extension` reference.
pub(crate) fn instruction_kind(
    reader: &mut DocReader,
    word: &str,
    loc: &Location,
) -> Option<InstructionKind> {
    if let Some(r) = extension_ref(word) {
        return Some(InstructionKind::Experimenter(Link::new(r)));
    }
    let kind = InstructionKind::parse_keyword(word);
    if kind.is_none() {
        reader.structural(loc, format!("unknown instruction '{word}'"));
    }
    kind
}

/// An action keyword or `$extension` reference.
pub(crate) fn action_kind(reader: &mut DocReader, word: &str, loc: &Location) -> Option<ActionKind> {
    if let Some(r) = extension_ref(word) {
        return Some(ActionKind::Experimenter(Link::new(r)));
    }
    let kind = ActionKind::parse_keyword(word);
    if kind.is_none() {
        reader.structural(loc, format!("unknown action '{word}'"));
    }
    kind
}

/// An action written as a keyword or `{action, field?, group?, port?, value?}`.
pub(crate) fn action(reader: &mut DocReader, value: &Value, loc: &Location) -> Option<ActionSpec> {
    if let Value::String(word) = value {
        return action_kind(reader, word, loc).map(ActionSpec::new);
    }
    let obj = reader.object(value, loc)?;
    let word = reader.required_str(obj, "action", loc)?;
    let mut spec = ActionSpec::new(action_kind(reader, &word, &loc.child("action"))?);
    if let Some(field) = reader.optional_str(obj, "field", loc) {
        spec.field = Some(Link::new(catalog::canonical_name(&field)));
    }
    if let Some(group) = reader.optional_str(obj, "group", loc) {
        spec.group = Some(Link::new(group));
    }
    let operand = obj
        .get("port")
        .map(|v| (v, "port"))
        .or_else(|| obj.get("value").map(|v| (v, "value")));
    if let Some((v, key)) = operand {
        spec.value = Some(reader.value_expr(v, &loc.child(key))?);
    }
    if spec.kind == ActionKind::SetField && spec.field.is_none() {
        reader.structural(loc, "set-field action needs a 'field'");
        return None;
    }
    if spec.kind == ActionKind::Group && spec.group.is_none() && spec.value.is_none() {
        reader.structural(loc, "group action needs a 'group'");
        return None;
    }
    Some(spec)
}

/// A list of actions under `key`.
pub(crate) fn action_list(
    reader: &mut DocReader,
    obj: &Object,
    key: &str,
    loc: &Location,
) -> Option<Vec<ActionSpec>> {
    let v = obj.get(key)?;
    let list_loc = loc.child(key);
    let items = reader.array(v, &list_loc)?;
    let mut out = Vec::new();
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        match action(reader, item, &list_loc.child(i)) {
            Some(a) => out.push(a),
            None => ok = false,
        }
    }
    ok.then_some(out)
}

/// A table instruction written as a keyword or
/// `{instruction, actions?, mask?, tables?}`.
pub(crate) fn instruction(
    reader: &mut DocReader,
    value: &Value,
    loc: &Location,
) -> Option<InstructionSpec> {
    if let Value::String(word) = value {
        return instruction_kind(reader, word, loc).map(InstructionSpec::new);
    }
    let obj = reader.object(value, loc)?;
    let word = reader.required_str(obj, "instruction", loc)?;
    let kind = instruction_kind(reader, &word, &loc.child("instruction"))?;
    let mut spec = InstructionSpec::new(kind);
    if obj.contains_key("actions") {
        if !spec.kind.takes_actions() {
            reader.structural(loc, format!("{} does not take an action list", spec.kind));
            return None;
        }
        spec.actions = Some(action_list(reader, obj, "actions", loc)?);
    }
    if let Some(v) = obj.get("mask") {
        if spec.kind != InstructionKind::WriteMetadata {
            reader.structural(loc, format!("{} does not take a mask", spec.kind));
            return None;
        }
        spec.mask = Some(reader.value_expr(v, &loc.child("mask"))?);
    }
    if obj.contains_key("tables") {
        if spec.kind != InstructionKind::GotoTable {
            reader.structural(loc, format!("{} does not take target tables", spec.kind));
            return None;
        }
        spec.tables = reader
            .string_list(obj, "tables", loc)
            .into_iter()
            .map(Link::new)
            .collect();
    }
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ttp_core::ExpressionPolicy;

    fn reader() -> DocReader {
        DocReader::new(ExpressionPolicy::Evaluate)
    }

    #[test]
    fn keyword_instruction() {
        let mut r = reader();
        let spec = instruction(&mut r, &json!("GOTO_TABLE"), &Location::root()).unwrap();
        assert_eq!(spec.kind, InstructionKind::GotoTable);
        assert!(spec.tables.is_empty());
    }

    #[test]
    fn object_instruction_with_actions() {
        let mut r = reader();
        let spec = instruction(
            &mut r,
            &json!({
                "instruction": "apply-actions",
                "actions": ["pop-vlan", {"action": "set-field", "field": "VLAN_VID"}, "$acme:mirror"]
            }),
            &Location::root(),
        )
        .unwrap();
        let actions = spec.actions.unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[1].field.as_ref().unwrap().name, "vlan_vid");
        assert_eq!(
            actions[2].kind,
            ActionKind::Experimenter(Link::new("acme:mirror"))
        );
        assert!(r.findings.is_empty());
    }

    #[test]
    fn mask_only_on_write_metadata() {
        let mut r = reader();
        let bad = instruction(
            &mut r,
            &json!({"instruction": "meter", "mask": "0xff"}),
            &Location::root(),
        );
        assert!(bad.is_none());
        assert_eq!(r.findings.error_count(), 1);
    }

    #[test]
    fn set_field_requires_field() {
        let mut r = reader();
        assert!(action(&mut r, &json!({"action": "set-field"}), &Location::root()).is_none());
        assert!(action(&mut r, &json!("teleport"), &Location::root()).is_none());
        assert_eq!(r.findings.error_count(), 2);
    }
}
