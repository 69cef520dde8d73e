use serde_json::Value;
use ttp_core::{Bucket, Group, GroupType, Link, Location, PatternModel};

use crate::instructions::action_list;
use crate::reader::DocReader;

pub(crate) fn load_groups(reader: &mut DocReader, value: &Value, model: &mut PatternModel) {
    let loc = Location::section("groups");
    let Some(items) = reader.array(value, &loc) else {
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let item_loc = loc.child(i);
        let Some(obj) = reader.object(item, &item_loc) else {
            continue;
        };
        let Some(name) = reader.required_str(obj, "name", &item_loc) else {
            continue;
        };
        let gloc = loc.child(&name);
        if !reader.check_name(&name, &gloc) {
            continue;
        }
        let Some(type_text) = reader.required_str(obj, "type", &gloc) else {
            continue;
        };
        let Some(group_type) = GroupType::parse_keyword(&type_text) else {
            reader.structural(
                &gloc.child("type"),
                format!("unknown group type '{type_text}' (expected all, select, indirect or fast-failover)"),
            );
            continue;
        };
        let Some(bucket_values) = obj.get("buckets") else {
            reader.structural(&gloc, "missing required key 'buckets'");
            continue;
        };
        let bloc = gloc.child("buckets");
        let Some(bucket_items) = reader.array(bucket_values, &bloc) else {
            continue;
        };
        let mut buckets = Vec::new();
        for (b, bucket_value) in bucket_items.iter().enumerate() {
            if let Some(bucket) = bucket(reader, bucket_value, &bloc.child(b)) {
                buckets.push(bucket);
            }
        }
        model.groups.push(Group {
            name,
            group_type,
            buckets,
            doc: reader.doc(obj, &gloc),
        });
    }
}

fn bucket(reader: &mut DocReader, value: &Value, loc: &Location) -> Option<Bucket> {
    let obj = reader.object(value, loc)?;
    if !obj.contains_key("actions") {
        reader.structural(loc, "missing required key 'actions'");
        return None;
    }
    let mut bucket = Bucket::new(action_list(reader, obj, "actions", loc)?);
    bucket.name = reader.optional_str(obj, "name", loc);
    if let Some(v) = obj.get("weight") {
        bucket.weight = Some(reader.integer(v, &loc.child("weight"))?);
    }
    if let Some(v) = obj.get("watch_port") {
        bucket.watch_port = Some(reader.value_expr(v, &loc.child("watch_port"))?);
    }
    bucket.watch_group = reader.optional_str(obj, "watch_group", loc).map(Link::new);
    Some(bucket)
}
