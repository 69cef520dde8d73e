use serde_json::json;
use ttp_core::{
    FieldOrigin, FindingCode, InstructionKind, MatchType, MissBehavior, NextTable, Resolution,
    VariableDomain, VariableScope,
};
use ttp_load::{load_bytes, load_str, load_value, LoadOptions};

fn minimal() -> serde_json::Value {
    json!({
        "ttp_info": {"name": "l2-switch", "version": "1.0.0"},
        "tables": [
            {
                "name": "vlan",
                "index": 0,
                "fields": {"in_port": ["exact"], "vlan_vid": ["exact", "mask"]},
                "instructions": [
                    {"instruction": "goto-table", "tables": ["mac"]},
                    "apply-actions"
                ],
                "miss": "drop"
            },
            {
                "name": "mac",
                "index": 10,
                "fields": ["eth_dst"],
                "instructions": ["write-actions"],
                "next_tables": ["terminal"]
            }
        ],
        "security": {"doc": "No tenant isolation."}
    })
}

#[test]
fn minimal_document_loads() {
    let loaded = load_value(minimal(), &LoadOptions::default()).expect("document should load");
    let model = &loaded.model;
    assert!(loaded.findings.is_empty(), "{:?}", loaded.findings);
    assert_eq!(model.tables.len(), 2);
    assert_eq!(model.info.as_ref().unwrap().name, "l2-switch");

    let vlan = &model.tables[0];
    assert_eq!(vlan.capabilities.len(), 2);
    assert_eq!(vlan.instructions[0].kind, InstructionKind::GotoTable);
    assert_eq!(vlan.miss, Some(MissBehavior::Drop));
    // goto-table targets are merged into next_tables
    assert!(matches!(&vlan.next_tables[0], NextTable::Table(l) if l.name == "mac"));

    let mac = &model.tables[1];
    assert_eq!(mac.next_tables, vec![NextTable::Terminal]);
    assert!(mac.capabilities[0].match_types.contains(&MatchType::Exact));
    assert_eq!(mac.capabilities[0].match_types.len(), 1);
    assert!(!model.resolved, "loader must leave references unresolved");
    assert!(mac.capabilities[0].field.target == Resolution::Pending);
}

#[test]
fn missing_required_sections_fail() {
    for section in ["tables", "security"] {
        let mut doc = minimal();
        doc.as_object_mut().unwrap().remove(section);
        let failure = load_value(doc, &LoadOptions::default()).unwrap_err();
        let structural = failure.findings.with_code(FindingCode::StructuralError);
        assert!(
            structural
                .iter()
                .any(|f| f.location.segments() == [section.to_string()]),
            "expected a structural finding at {section}, got {:?}",
            failure.findings
        );
    }
}

#[test]
fn missing_info_is_a_warning() {
    let mut doc = minimal();
    doc.as_object_mut().unwrap().remove("ttp_info");
    let loaded = load_value(doc, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.findings.warning_count(), 1);
    assert_eq!(loaded.findings.as_slice()[0].code, FindingCode::MissingInfo);
}

#[test]
fn extras_are_preserved() {
    let mut doc = minimal();
    doc["vendor_notes"] = json!({"rev": 4});
    let loaded = load_value(doc, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.model.extras["vendor_notes"], json!({"rev": 4}));
}

#[test]
fn reserved_names_rejected() {
    let mut doc = minimal();
    doc["tables"][1]["name"] = json!("terminal");
    let failure = load_value(doc, &LoadOptions::default()).unwrap_err();
    assert_eq!(failure.findings.with_code(FindingCode::ReservedName).len(), 1);

    let mut doc = minimal();
    doc["$private"] = json!(1);
    let failure = load_value(doc, &LoadOptions::default()).unwrap_err();
    assert_eq!(failure.findings.with_code(FindingCode::ReservedName).len(), 1);
}

#[test]
fn duplicate_table_index_is_structural() {
    let mut doc = minimal();
    doc["tables"][1]["index"] = json!(0);
    let failure = load_value(doc, &LoadOptions::default()).unwrap_err();
    let errors: Vec<_> = failure.findings.errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("already used by 'vlan'"));
}

#[test]
fn all_structural_problems_reported_together() {
    let doc = json!({
        "tables": [
            {"name": "a", "fields": [], "instructions": []},
            {"name": "b", "index": "zero", "fields": [], "instructions": ["jump"]}
        ],
        "security": {},
        "groups": [{"name": "g", "type": "random", "buckets": []}]
    });
    let failure = load_value(doc, &LoadOptions::default()).unwrap_err();
    // missing index, bad index, unknown group type
    assert_eq!(failure.findings.error_count(), 3, "{:?}", failure.findings);
}

#[test]
fn variables_are_scoped() {
    let doc = json!({
        "variables": [
            {"name": "<max_ports>", "range": "1..48"},
            {"name": "color", "symbols": ["red", "green"]},
            "unbounded"
        ],
        "tables": [{
            "name": "acl",
            "index": 0,
            "variables": [{"name": "acl_size", "value": "<max_ports> * 4"}],
            "fields": [],
            "instructions": []
        }],
        "security": {"doc": "none"}
    });
    let model = load_value(doc, &LoadOptions::default()).unwrap().model;
    assert_eq!(model.variables.len(), 4);
    assert_eq!(model.variables[0].name, "max_ports");
    assert!(matches!(model.variables[1].domain, VariableDomain::Symbols(ref s) if s.len() == 2));
    assert_eq!(model.variables[2].domain, VariableDomain::Unconstrained);
    assert_eq!(model.variables[3].scope, VariableScope::Table(ttp_core::TableId(0)));
    assert_eq!(model.tables[0].variables, vec![ttp_core::VariableId(3)]);
}

#[test]
fn custom_fields_and_extensions() {
    let doc = json!({
        "extension_identifiers": [
            {"namespace": "acme", "id": "tenant", "type": "field", "exp_id": "0x00abcdef"}
        ],
        "fields": [
            {"name": "tenant_id", "width": 24, "extension": "$acme:tenant",
             "match_types": ["exact"], "prerequisite": {"field": "eth_type", "value": "0x0800"}}
        ],
        "tables": [],
        "security": {"doc": "none"}
    });
    let model = load_value(doc, &LoadOptions::default()).unwrap().model;
    assert_eq!(model.extensions[0].exp_id, Some(0x00ab_cdef));
    let id = model.field_id("tenant_id").unwrap();
    let field = model.field(id).unwrap();
    assert!(matches!(&field.origin, FieldOrigin::Extension(l) if l.name == "acme:tenant"));
    assert_eq!(field.prerequisite.as_ref().unwrap().field.name, "eth_type");
}

#[test]
fn builtin_field_redeclaration_rejected() {
    let doc = json!({
        "fields": [{"name": "ETH_TYPE", "width": 16}],
        "tables": [],
        "security": {"doc": "none"}
    });
    assert!(load_value(doc, &LoadOptions::default()).is_err());
}

#[test]
fn reject_policy_blocks_expressions() {
    let doc = json!({
        "variables": [{"name": "n", "value": "2 * 8"}],
        "tables": [],
        "security": {"doc": "none"}
    });
    let options = LoadOptions {
        expressions: ttp_core::ExpressionPolicy::Reject,
    };
    let failure = load_value(doc.clone(), &options).unwrap_err();
    assert_eq!(
        failure.findings.as_slice()[0].code,
        FindingCode::ExpressionRejected
    );
    assert!(load_value(doc, &LoadOptions::default()).is_ok());
}

#[test]
fn invalid_json_is_structural() {
    let failure = load_str("{\"tables\": [", &LoadOptions::default()).unwrap_err();
    assert!(failure.findings.as_slice()[0]
        .message
        .starts_with("document is not valid JSON"));
}

#[test]
fn utf16_bytes_load() {
    let text = minimal().to_string();
    let mut bytes = vec![0xff, 0xfe];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    let loaded = load_bytes(&bytes, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.model.tables.len(), 2);
}
