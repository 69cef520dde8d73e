use serde_json::{json, Value};
use ttp_core::PatternModel;
use ttp_fit::{fit, fit_batch, CandidateRule, FitResult, MatchSpec, ViolationKind};
use ttp_load::{load_value, LoadOptions};
use ttp_verify::Resolver;

fn resolved(doc: Value) -> PatternModel {
    let mut model = load_value(doc, &LoadOptions::default())
        .expect("fixture loads")
        .model;
    Resolver::resolve(&mut model);
    model
}

fn rule(value: Value) -> CandidateRule {
    CandidateRule::from_json(&value).expect("candidate decodes")
}

fn reasons(result: &FitResult) -> Vec<String> {
    result.violations().iter().map(|v| v.to_string()).collect()
}

fn only_kind(result: &FitResult) -> ViolationKind {
    let violations = result.violations();
    assert_eq!(violations.len(), 1, "{violations:?}");
    violations[0].kind
}

fn pipeline() -> PatternModel {
    resolved(json!({
        "ttp_info": {"name": "fit", "version": "1.0.0"},
        "tables": [
            {"name": "ingress", "index": 0,
             "fields": [
                {"field": "eth_type", "match_types": ["exact"]},
                {"field": "vlan_vid", "match_types": ["exact", "mask"], "domain": "0x1000..0x1fff"},
                {"field": "ipv4_dst", "match_types": ["prefix"]},
                "ip_proto",
                {"field": "tcp_dst", "match_types": ["exact", "range"]}
             ],
             "instructions": [
                "apply-actions",
                {"instruction": "goto-table", "tables": ["acl"]},
                {"instruction": "write-metadata", "mask": "0xff"}
             ]},
            {"name": "acl", "index": 10,
             "fields": ["in_port"],
             "instructions": [
                {"instruction": "write-actions", "actions": [
                    "output", "group", {"action": "set-field", "field": "vlan_vid"}
                ]},
                "meter"
             ],
             "groups": ["ecmp"],
             "next_tables": ["terminal"]}
        ],
        "groups": [
            {"name": "ecmp", "type": "select", "buckets": [
                {"actions": ["output"], "weight": 1},
                {"actions": ["dec-nw-ttl", "output"], "weight": 1}
            ]},
            {"name": "flood", "type": "all", "buckets": [{"actions": ["output"]}]}
        ],
        "security": {"doc": "tenants may not meter or retag", "rules": [
            {"class": "tenant", "scope": {"table": "acl"},
             "forbid": ["meter"], "read_only_fields": ["vlan_vid"]}
        ]}
    }))
}

fn ingress_rule() -> Value {
    json!({
        "table": "ingress",
        "match": {
            "eth_type": "0x0800",
            "vlan_vid": {"value": "0x1005", "mask": "0x1ff0"},
            "ipv4_dst": "10.0.0.0/8",
            "ip_proto": 6,
            "tcp_dst": "1024..2048"
        },
        "instructions": [
            {"instruction": "apply-actions", "actions": ["output"]},
            {"instruction": "write-metadata", "value": "0x1", "mask": "0x0f"},
            {"instruction": "goto-table", "table": "acl"}
        ]
    })
}

#[test]
fn eth_type_exact_fits_and_range_does_not() {
    let model = resolved(json!({
        "ttp_info": {"name": "one", "version": "1.0.0"},
        "tables": [{"name": "t0", "index": 0,
                    "fields": [{"field": "eth_type", "match_types": ["exact"]}],
                    "instructions": ["apply-actions"]}],
        "security": {"doc": "none"}
    }));
    let exact = rule(json!({
        "table": 0, "match": {"eth_type": "0x0800"}, "instructions": ["apply-actions"]
    }));
    assert_eq!(fit(&model, &exact), FitResult::Fits);

    let ranged = rule(json!({
        "table": 0, "match": {"eth_type": "0x0800..0x08FF"}, "instructions": ["apply-actions"]
    }));
    assert_eq!(
        reasons(&fit(&model, &ranged)),
        vec!["eth_type: range match not supported".to_string()]
    );
}

#[test]
fn declared_subset_fits() {
    let model = pipeline();
    let result = fit(&model, &rule(ingress_rule()));
    assert!(result.fits(), "{result}");
}

#[test]
fn each_single_mutation_cites_its_aspect() {
    let model = pipeline();

    let mut doc = ingress_rule();
    doc["match"]["ipv4_src"] = json!("192.168.1.1");
    assert_eq!(only_kind(&fit(&model, &rule(doc))), ViolationKind::FieldNotMatched);

    let mut doc = ingress_rule();
    doc["match"]["bogus"] = json!(1);
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::UnknownField);
    assert_eq!(result.violations()[0].subject, "bogus");

    let mut doc = ingress_rule();
    doc["match"]["vlan_vid"] = json!("0x1000..0x1005");
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::UnsupportedMatch);
    assert_eq!(reasons(&result), vec!["vlan_vid: range match not supported".to_string()]);

    let mut doc = ingress_rule();
    doc["instructions"][0] = json!("meter");
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::InstructionNotAllowed);
    assert_eq!(result.violations()[0].subject, "meter");

    let mut doc = ingress_rule();
    doc["match"]["tcp_dst"] = json!("1024..0x1ffff");
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::OutOfRange);
    assert_eq!(result.violations()[0].subject, "tcp_dst");
}

#[test]
fn prerequisites_need_an_exact_match() {
    let model = pipeline();
    let mut doc = ingress_rule();
    doc["match"]["eth_type"] = json!("0x86dd");
    let result = fit(&model, &rule(doc));
    assert_eq!(
        reasons(&result),
        vec!["ipv4_dst: requires 'eth_type' to match 0x800".to_string()]
    );

    let mut doc = ingress_rule();
    doc["match"].as_object_mut().unwrap().remove("ip_proto");
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::PrerequisiteUnmet);
    assert_eq!(result.violations()[0].subject, "tcp_dst");
}

#[test]
fn unresolved_prerequisite_values_are_unmet() {
    let model = resolved(json!({
        "ttp_info": {"name": "tenant", "version": "1.0.0"},
        "extension_identifiers": [{"namespace": "acme", "id": "tenant", "type": "field"}],
        "fields": [
            {"name": "tenant_id", "width": 24, "extension": "$acme:tenant",
             "prerequisite": {"field": "eth_type", "value": "<tenant_type>"}}
        ],
        "tables": [{"name": "t0", "index": 0,
                    "fields": ["eth_type", "tenant_id"],
                    "instructions": ["apply-actions"]}],
        "security": {"doc": "none"}
    }));
    let candidate = rule(json!({
        "table": "t0",
        "match": {"eth_type": "0x0800", "tenant_id": 7}
    }));
    let result = fit(&model, &candidate);
    assert_eq!(only_kind(&result), ViolationKind::PrerequisiteUnmet);
    assert_eq!(
        reasons(&result),
        ["tenant_id: prerequisite values for 'eth_type' are unresolved"]
    );
}

#[test]
fn values_outside_the_capability_domain() {
    let model = pipeline();
    let mut doc = ingress_rule();
    doc["match"]["vlan_vid"] = json!(5);
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::OutsideDomain);
}

#[test]
fn masked_and_prefix_matches_cover_their_whole_span() {
    let model = resolved(json!({
        "ttp_info": {"name": "subnet", "version": "1.0.0"},
        "tables": [{"name": "route", "index": 0,
                    "fields": [
                        {"field": "eth_type", "match_types": ["exact"]},
                        {"field": "ipv4_dst", "match_types": ["exact", "mask", "prefix"],
                         "domain": "10.0.0.0..10.0.0.255"}
                    ],
                    "instructions": ["apply-actions"]}],
        "security": {"doc": "none"}
    }));
    let candidate = |dst: Value| {
        rule(json!({"table": "route", "match": {"eth_type": "0x0800", "ipv4_dst": dst}}))
    };

    let result = fit(&model, &candidate(json!({"value": "10.0.0.0", "mask": "255.0.0.0"})));
    assert_eq!(only_kind(&result), ViolationKind::OutsideDomain);
    assert_eq!(
        reasons(&result),
        ["ipv4_dst: value 0xa000000..0xaffffff is outside the domain 0xa000000..0xa0000ff"]
    );
    let result = fit(&model, &candidate(json!("10.0.0.0/8")));
    assert_eq!(only_kind(&result), ViolationKind::OutsideDomain);

    assert!(fit(&model, &candidate(json!("10.0.0.0/24"))).fits());
    assert!(fit(&model, &candidate(json!({"value": "10.0.0.0", "mask": "255.255.255.128"}))).fits());
    assert!(fit(&model, &candidate(json!("10.0.0.7"))).fits());
}

#[test]
fn masked_vlan_bits_outside_the_domain() {
    let model = pipeline();
    let mut doc = ingress_rule();
    // leaves the high bit free, so 0x0000..0x0fff is also selected
    doc["match"]["vlan_vid"] = json!({"value": "0x1005", "mask": "0x0ff0"});
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::OutsideDomain);
}

#[test]
fn a_field_matched_twice_does_not_fit() {
    let model = pipeline();
    let candidate = rule(ingress_rule()).with_match("TCP_DST", MatchSpec::Exact(80));
    let result = fit(&model, &candidate);
    assert_eq!(only_kind(&result), ViolationKind::DuplicateMatch);
    assert_eq!(reasons(&result), ["tcp_dst: field is matched more than once"]);
}

#[test]
fn goto_and_metadata_limits() {
    let model = pipeline();
    let mut doc = ingress_rule();
    doc["instructions"][2]["table"] = json!("ingress");
    let result = fit(&model, &rule(doc));
    assert_eq!(only_kind(&result), ViolationKind::GotoNotAllowed);

    let mut doc = ingress_rule();
    doc["instructions"][2]["table"] = json!("egress");
    assert_eq!(only_kind(&fit(&model, &rule(doc))), ViolationKind::UnknownTable);

    let mut doc = ingress_rule();
    doc["instructions"][1]["mask"] = json!("0xfff");
    assert_eq!(only_kind(&fit(&model, &rule(doc))), ViolationKind::MetadataMask);

    let mut doc = ingress_rule();
    doc["instructions"][1] = json!({"instruction": "write-metadata", "value": 1});
    assert_eq!(only_kind(&fit(&model, &rule(doc))), ViolationKind::MetadataMask);
}

#[test]
fn security_class_restrictions() {
    let model = pipeline();
    let acl = |class: Option<&str>| {
        let mut doc = json!({
            "table": "acl",
            "match": {"in_port": 1},
            "instructions": [
                "meter",
                {"instruction": "write-actions", "actions": [
                    {"action": "set-field", "field": "vlan_vid", "value": "OFPVID_PRESENT | 5"}
                ]}
            ]
        });
        if let Some(class) = class {
            doc["security_class"] = json!(class);
        }
        rule(doc)
    };
    assert!(fit(&model, &acl(None)).fits());

    let result = fit(&model, &acl(Some("tenant")));
    let kinds: Vec<ViolationKind> = result.violations().iter().map(|v| v.kind).collect();
    assert_eq!(
        kinds,
        vec![ViolationKind::SecurityForbidden, ViolationKind::ReadOnlyField]
    );
    assert_eq!(
        result.violations()[1].to_string(),
        "vlan_vid: read-only for security class 'tenant' at table 'acl'"
    );
}

#[test]
fn group_usage() {
    let model = pipeline();
    let with_group = |group: &str, buckets: Value| {
        rule(json!({
            "table": "acl",
            "instructions": [{"instruction": "write-actions", "actions": [
                {"action": "group", "group": group, "actions": buckets}
            ]}]
        }))
    };
    assert!(fit(&model, &with_group("ecmp", json!(["dec-nw-ttl", "output"]))).fits());

    let result = fit(&model, &with_group("ecmp", json!(["push-vlan"])));
    assert_eq!(only_kind(&result), ViolationKind::GroupActionNotAllowed);
    assert_eq!(result.violations()[0].subject, "ecmp");

    let result = fit(&model, &with_group("flood", json!([])));
    assert_eq!(only_kind(&result), ViolationKind::GroupNotAllowed);

    let result = fit(&model, &with_group("nope", json!([])));
    assert_eq!(only_kind(&result), ViolationKind::UnknownGroup);

    let result = fit(
        &model,
        &rule(json!({
            "table": "acl",
            "instructions": [{"instruction": "write-actions", "actions": ["pop-vlan"]}]
        })),
    );
    assert_eq!(only_kind(&result), ViolationKind::ActionNotAllowed);
}

#[test]
fn batch_keeps_input_order() {
    let model = pipeline();
    let mut rules = Vec::new();
    for i in 0..32 {
        let doc = if i % 3 == 0 {
            json!({"table": "missing"})
        } else {
            ingress_rule()
        };
        rules.push(rule(doc));
    }
    let results = fit_batch(&model, &rules);
    assert_eq!(results.len(), rules.len());
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.fits(), i % 3 != 0, "rule {i}");
        assert_eq!(*result, fit(&model, &rules[i]));
    }
}
