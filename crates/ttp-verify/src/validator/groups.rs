//! Group legality: bucket counts, weights, liveness watches, nesting
//! cycles and bucket actions.

use std::collections::BTreeMap;

use ttp_core::{Finding, FindingCode, FindingSet, Group, GroupId, GroupType, Location, PatternModel};

use super::graph::find_cycles;
use super::tables::check_action;
use super::{evaluated, show_path};

pub(crate) fn check_groups(model: &PatternModel, out: &mut FindingSet) {
    for group in &model.groups {
        let gloc = Location::section("groups").child(&group.name);
        check_bucket_count(group, &gloc, out);
        match group.group_type {
            GroupType::Select => check_weights(group, &gloc, out),
            GroupType::FastFailover => check_watches(model, group, &gloc, out),
            GroupType::All | GroupType::Indirect => {}
        }
        for (b, bucket) in group.buckets.iter().enumerate() {
            let bloc = gloc.child("buckets").child(b);
            for (i, action) in bucket.actions.iter().enumerate() {
                check_action(model, action, &bloc.child("actions").child(i), out);
            }
        }
    }
    check_group_cycles(model, out);
}

fn check_bucket_count(group: &Group, loc: &Location, out: &mut FindingSet) {
    let (min, max) = group.group_type.bucket_limits();
    let count = group.buckets.len();
    let expected = match max {
        Some(max) if max == min => format!("exactly {min}"),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    };
    if count < min || max.is_some_and(|max| count > max) {
        out.push(Finding::error(
            FindingCode::GroupBucketCount,
            loc.child("buckets"),
            format!(
                "{} group '{}' has {count} bucket(s); it needs {expected}",
                group.group_type, group.name
            ),
        ));
    }
}

/// Select buckets are weighted all together or not at all.
fn check_weights(group: &Group, loc: &Location, out: &mut FindingSet) {
    let weighted = group.buckets.iter().filter(|b| b.weight.is_some()).count();
    if weighted > 0 && weighted < group.buckets.len() {
        out.push(
            Finding::error(
                FindingCode::GroupWeights,
                loc.child("buckets"),
                format!(
                    "select group '{}' weights {weighted} of {} buckets",
                    group.name,
                    group.buckets.len()
                ),
            )
            .with_suggestion("give every bucket a weight, or none"),
        );
    }
    if weighted > 0 && group.buckets.iter().all(|b| b.weight == Some(0)) {
        out.push(Finding::warning(
            FindingCode::GroupWeights,
            loc.child("buckets"),
            format!("every bucket of select group '{}' has weight 0", group.name),
        ));
    }
}

/// Fast-failover buckets each need a distinct liveness watch.
fn check_watches(model: &PatternModel, group: &Group, loc: &Location, out: &mut FindingSet) {
    let mut targets: BTreeMap<String, usize> = BTreeMap::new();
    for (b, bucket) in group.buckets.iter().enumerate() {
        let bloc = loc.child("buckets").child(b);
        if !bucket.has_watch() {
            out.push(
                Finding::error(
                    FindingCode::GroupWatch,
                    bloc,
                    format!(
                        "bucket {b} of fast-failover group '{}' watches no port or group",
                        group.name
                    ),
                )
                .with_suggestion("set watch_port or watch_group"),
            );
            continue;
        }
        let port = bucket
            .watch_port
            .as_ref()
            .and_then(|p| evaluated(model, p, &bloc.child("watch_port"), out))
            .map(|r| r.to_string());
        let watched = bucket.watch_group.as_ref().map(|g| g.name.clone());
        let key = format!("{}|{}", port.unwrap_or_default(), watched.unwrap_or_default());
        if let Some(first) = targets.get(&key) {
            out.push(Finding::error(
                FindingCode::GroupWatch,
                bloc,
                format!(
                    "bucket {b} of fast-failover group '{}' watches the same target as bucket {first}",
                    group.name
                ),
            ));
        } else {
            targets.insert(key, b);
        }
    }
}

fn check_group_cycles(model: &PatternModel, out: &mut FindingSet) {
    let roots: Vec<GroupId> = (0..model.groups.len()).map(GroupId::from_index).collect();
    let successors = |id: GroupId| {
        model
            .group(id)
            .map(|g| g.referenced_groups())
            .unwrap_or_default()
    };
    for cycle in find_cycles(&roots, successors) {
        let mut path: Vec<String> = cycle
            .iter()
            .filter_map(|&id| model.group(id).map(|g| g.name.clone()))
            .collect();
        let Some(first) = path.first().cloned() else {
            continue;
        };
        path.push(first.clone());
        out.push(
            Finding::error(
                FindingCode::GroupCycle,
                Location::section("groups").child(&first),
                format!("groups refer to each other in a cycle: {}", show_path(&path)),
            )
            .with_cycle(path),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::resolver::Resolver;

    fn run(groups: serde_json::Value) -> FindingSet {
        let doc = json!({
            "ttp_info": {"name": "t", "version": "1.0.0"},
            "tables": [],
            "groups": groups,
            "security": {"doc": "none"}
        });
        let mut model = ttp_load::load_value(doc, &Default::default())
            .expect("fixture should load")
            .model;
        Resolver::resolve(&mut model);
        let mut out = FindingSet::new();
        check_groups(&model, &mut out);
        out
    }

    fn codes(out: &FindingSet) -> Vec<FindingCode> {
        out.iter().map(|f| f.code).collect()
    }

    #[test]
    fn indirect_takes_one_bucket() {
        let out = run(json!([
            {"name": "nh", "type": "indirect", "buckets": [
                {"actions": ["output"]}, {"actions": ["output"]}
            ]},
            {"name": "flood", "type": "all", "buckets": []}
        ]));
        assert_eq!(codes(&out), vec![FindingCode::GroupBucketCount; 2]);
        assert!(out.as_slice()[0].message.contains("needs exactly 1"));
        assert!(out.as_slice()[1].message.contains("needs at least 1"));
    }

    #[test]
    fn select_weights_all_or_none() {
        let out = run(json!([
            {"name": "ecmp", "type": "select", "buckets": [
                {"actions": ["output"], "weight": 10},
                {"actions": ["output"]}
            ]},
            {"name": "lag", "type": "select", "buckets": [
                {"actions": ["output"], "weight": 1},
                {"actions": ["output"], "weight": 3}
            ]}
        ]));
        assert_eq!(codes(&out), vec![FindingCode::GroupWeights]);
        assert_eq!(out.as_slice()[0].location.to_string(), "groups/ecmp/buckets");
    }

    #[test]
    fn fast_failover_watches_distinct_targets() {
        let out = run(json!([
            {"name": "protect", "type": "fast-failover", "buckets": [
                {"actions": ["output"], "watch_port": 1},
                {"actions": ["output"], "watch_port": 1},
                {"actions": ["output"]}
            ]}
        ]));
        assert_eq!(codes(&out), vec![FindingCode::GroupWatch; 2]);
        assert!(out.as_slice()[0].message.contains("same target as bucket 0"));
        assert!(out.as_slice()[1].message.contains("watches no port or group"));
    }

    #[test]
    fn chained_groups_must_not_loop() {
        let out = run(json!([
            {"name": "a", "type": "indirect", "buckets": [
                {"actions": [{"action": "group", "group": "b"}]}
            ]},
            {"name": "b", "type": "indirect", "buckets": [
                {"actions": [{"action": "group", "group": "a"}]}
            ]}
        ]));
        let cycles = out.with_code(FindingCode::GroupCycle);
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0].cycle,
            Some(vec!["a".to_string(), "b".to_string(), "a".to_string()])
        );
    }
}
