//! Per-table checks: capabilities, group references, instructions and
//! forward-only goto targets.

use ttp_core::{
    ActionSpec, Capability, Finding, FindingCode, FindingSet, InstructionSpec,
    Location, PatternModel, Table, TableId,
};

use super::fields::{check_fits, checked_bounds};
use super::{evaluated, in_vocabulary, outside_vocabulary};

/// Width of the OpenFlow metadata register.
const METADATA_BITS: u32 = 64;

pub(crate) fn check_table(model: &PatternModel, id: TableId, out: &mut FindingSet) {
    let Some(table) = model.table(id) else {
        return;
    };
    let tloc = Location::section("tables").child(&table.name);

    for cap in &table.capabilities {
        check_capability(model, table, cap, &tloc.child("fields").child(&cap.field.name), out);
    }

    check_group_links(model, table, &tloc, out);

    for spec in &table.instructions {
        check_instruction(model, table, spec, &tloc.child("instructions").child(&spec.kind), out);
    }

    check_forward(model, table, &tloc, out);
}

fn check_capability(
    model: &PatternModel,
    table: &Table,
    cap: &Capability,
    loc: &Location,
    out: &mut FindingSet,
) {
    let Some(field) = cap.field.id().and_then(|id| model.field(id)) else {
        return;
    };

    for unsupported in cap.match_types.difference(&field.match_types) {
        out.push(
            Finding::error(
                FindingCode::MatchTypeUnsupported,
                loc.clone(),
                format!(
                    "table '{}' offers {unsupported} match on '{}', which the field does not support",
                    table.name, field.name
                ),
            )
            .with_suggestion(format!(
                "'{}' supports: {}",
                field.name,
                field
                    .match_types
                    .iter()
                    .map(|m| m.keyword())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        );
    }

    if let Some(domain) = &cap.domain {
        let dloc = loc.child("domain");
        if let Some(range) = checked_bounds(model, domain, &dloc, out) {
            let fits = match field.width_bits() {
                Some(width) => check_fits(&range, width, "domain", &field.name, &dloc, out),
                None => true,
            };
            let declared = field.domain.as_ref().and_then(|d| d.range());
            if let Some(declared) = declared.filter(|d| fits && !d.covers(&range)) {
                out.push(Finding::error(
                    FindingCode::ValueOutOfRange,
                    dloc,
                    format!(
                        "domain {range} lies outside {declared}, the declared domain of '{}'",
                        field.name
                    ),
                ));
            }
        }
    }

    if let Some(pre) = &field.prerequisite {
        if let Some(pre_id) = pre.field.id() {
            if table.capability(pre_id).is_none() {
                let pre_name = model.field_name(&pre.field);
                out.push(
                    Finding::warning(
                        FindingCode::PrerequisiteMissing,
                        loc.clone(),
                        format!(
                            "'{}' requires '{pre_name}', which table '{}' does not match",
                            field.name, table.name
                        ),
                    )
                    .with_suggestion(format!("add '{pre_name}' to the table's fields")),
                );
            }
        }
    }
}

/// Groups named by group actions must be among the table's `groups`
/// when the table lists any.
fn check_group_links(model: &PatternModel, table: &Table, tloc: &Location, out: &mut FindingSet) {
    if table.groups.is_empty() {
        return;
    }
    let listed: Vec<_> = table.groups.iter().filter_map(|l| l.id()).collect();
    for spec in &table.instructions {
        let actions = spec.actions.iter().flatten();
        for action in actions {
            let Some(group) = action.group.as_ref() else {
                continue;
            };
            if let Some(id) = group.id().filter(|id| !listed.contains(id)) {
                let name = model.group(id).map_or(group.name.as_str(), |g| g.name.as_str());
                out.push(
                    Finding::warning(
                        FindingCode::GroupNotListed,
                        tloc.child("groups"),
                        format!(
                            "table '{}' uses group '{name}' without listing it in 'groups'",
                            table.name
                        ),
                    )
                    .with_suggestion(format!("add '{name}' to the table's groups")),
                );
            }
        }
    }
}

fn check_instruction(
    model: &PatternModel,
    table: &Table,
    spec: &InstructionSpec,
    loc: &Location,
    out: &mut FindingSet,
) {
    if let Some(mask) = &spec.mask {
        let mloc = loc.child("mask");
        if let Some(range) = evaluated(model, mask, &mloc, out) {
            if !range.fits_width(METADATA_BITS) {
                out.push(Finding::error(
                    FindingCode::MetadataMask,
                    mloc,
                    format!(
                        "write-metadata mask {range} at table '{}' is wider than {METADATA_BITS} bits",
                        table.name
                    ),
                ));
            }
        }
    }

    if let Some(actions) = &spec.actions {
        for (i, action) in actions.iter().enumerate() {
            check_action(model, action, &loc.child("actions").child(i), out);
        }
    }
}

/// Vocabulary membership and operand width of one action.
pub(crate) fn check_action(
    model: &PatternModel,
    action: &ActionSpec,
    loc: &Location,
    out: &mut FindingSet,
) {
    if !in_vocabulary(model, &action.kind) {
        out.push(outside_vocabulary(&action.kind, loc.clone()));
    }
    let Some(value) = &action.value else {
        return;
    };
    let Some(range) = evaluated(model, value, loc, out) else {
        return;
    };
    let target = action
        .field
        .as_ref()
        .and_then(|l| l.id())
        .and_then(|id| model.field(id));
    if let Some(field) = target {
        if let Some(width) = field.width_bits() {
            check_fits(&range, width, "value", &field.name, loc, out);
        }
    }
}

/// Every successor must sit later in the pipeline.
fn check_forward(model: &PatternModel, table: &Table, tloc: &Location, out: &mut FindingSet) {
    for next_id in table.successors() {
        let Some(next) = model.table(next_id) else {
            continue;
        };
        if next.index > table.index {
            continue;
        }
        out.push(
            Finding::error(
                FindingCode::GotoNotForward,
                tloc.child("next_tables").child(&next.name),
                format!(
                    "table '{}' (index {}) goes to '{}' (index {}); goto targets must have a higher index",
                    table.name, table.index, next.name, next.index
                ),
            )
            .with_suggestion("renumber the tables so the pipeline only moves forward"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::resolver::Resolver;

    fn run(tables: serde_json::Value, extra: serde_json::Value) -> FindingSet {
        let mut doc = json!({
            "ttp_info": {"name": "t", "version": "1.0.0"},
            "tables": tables,
            "security": {"doc": "none"}
        });
        if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
            doc.extend(extra.clone());
        }
        let mut model = ttp_load::load_value(doc, &Default::default())
            .expect("fixture should load")
            .model;
        Resolver::resolve(&mut model);
        let mut out = FindingSet::new();
        for id in model.tables_by_index() {
            check_table(&model, id, &mut out);
        }
        out
    }

    fn codes(out: &FindingSet) -> Vec<FindingCode> {
        out.iter().map(|f| f.code).collect()
    }

    #[test]
    fn capability_match_types_must_be_supported_by_field() {
        let out = run(
            json!([{"name": "t0", "index": 0,
                    "fields": {"eth_type": ["exact", "mask"]},
                    "instructions": []}]),
            json!({}),
        );
        assert_eq!(codes(&out), vec![FindingCode::MatchTypeUnsupported]);
        assert!(out.as_slice()[0].message.contains("mask match on 'eth_type'"));
    }

    #[test]
    fn capability_domain_within_width() {
        let out = run(
            json!([{"name": "t0", "index": 0,
                    "fields": ["vlan_vid", {"field": "vlan_pcp", "domain": "0..9"}],
                    "instructions": []}]),
            json!({}),
        );
        assert_eq!(codes(&out), vec![FindingCode::ValueOutOfRange]);
        assert_eq!(
            out.as_slice()[0].location.to_string(),
            "tables/t0/fields/vlan_pcp/domain"
        );
    }

    #[test]
    fn missing_prerequisite_is_a_warning() {
        let out = run(
            json!([{"name": "t0", "index": 0, "fields": ["ipv4_dst"], "instructions": []}]),
            json!({}),
        );
        assert_eq!(codes(&out), vec![FindingCode::PrerequisiteMissing]);
        assert!(!out.has_errors());

        let out = run(
            json!([{"name": "t0", "index": 0, "fields": ["eth_type", "ipv4_dst"], "instructions": []}]),
            json!({}),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn group_actions_use_listed_groups() {
        let out = run(
            json!([{"name": "t0", "index": 0, "fields": [], "groups": ["flood"],
                    "instructions": [{"instruction": "write-actions", "actions": [
                        {"action": "group", "group": "flood"},
                        {"action": "group", "group": "ecmp"}
                    ]}]}]),
            json!({"groups": [
                {"name": "flood", "type": "all", "buckets": [{"actions": ["output"]}]},
                {"name": "ecmp", "type": "select", "buckets": [{"actions": ["output"]}]}
            ]}),
        );
        assert_eq!(codes(&out), vec![FindingCode::GroupNotListed]);
        assert!(out.as_slice()[0].message.contains("'ecmp'"));
    }

    #[test]
    fn goto_must_move_forward() {
        let out = run(
            json!([
                {"name": "acl", "index": 5, "fields": [], "instructions": [
                    {"instruction": "goto-table", "tables": ["vlan"]}
                ]},
                {"name": "vlan", "index": 1, "fields": [], "instructions": []}
            ]),
            json!({}),
        );
        assert_eq!(codes(&out), vec![FindingCode::GotoNotForward]);
        assert_eq!(out.as_slice()[0].location.to_string(), "tables/acl/next_tables/vlan");
    }

    #[test]
    fn metadata_mask_is_64_bits() {
        let out = run(
            json!([{"name": "t0", "index": 0, "fields": [], "instructions": [
                {"instruction": "write-metadata", "mask": "0xffffffffffffffff"},
                {"instruction": "write-metadata", "mask": "1 << 64"}
            ]}]),
            json!({}),
        );
        assert_eq!(codes(&out), vec![FindingCode::MetadataMask]);
    }

    #[test]
    fn actions_restricted_by_vocabulary() {
        let out = run(
            json!([{"name": "t0", "index": 0, "fields": [], "instructions": [
                {"instruction": "apply-actions", "actions": ["output", "push-vlan"]}
            ]}]),
            json!({"action_vocabulary": ["output"]}),
        );
        assert_eq!(codes(&out), vec![FindingCode::ActionOutsideVocabulary]);
        assert_eq!(
            out.as_slice()[0].location.to_string(),
            "tables/t0/instructions/apply-actions/actions/1"
        );
    }

    #[test]
    fn set_field_value_fits_field() {
        let out = run(
            json!([{"name": "t0", "index": 0, "fields": [], "instructions": [
                {"instruction": "apply-actions", "actions": [
                    {"action": "set-field", "field": "vlan_pcp", "value": 8}
                ]}
            ]}]),
            json!({}),
        );
        assert_eq!(codes(&out), vec![FindingCode::ValueOutOfRange]);
    }
}
