//! Variable domains and declared field coherence.

use ttp_core::{
    Bounds, Field, Finding, FindingCode, FindingSet, Location, PatternModel, ValueRange,
    VariableDomain, VariableScope,
};

use super::evaluated;
use crate::profile::ValidationProfile;

/// Evaluate both ends of a domain, reporting arithmetic failures and an
/// inverted range. Returns the extent when both ends evaluated.
pub(crate) fn checked_bounds(
    model: &PatternModel,
    bounds: &Bounds,
    loc: &Location,
    out: &mut FindingSet,
) -> Option<ValueRange> {
    let lo = evaluated(model, &bounds.lo, loc, out);
    let hi = if bounds.lo == bounds.hi {
        lo
    } else {
        evaluated(model, &bounds.hi, loc, out)
    };
    let range = ValueRange {
        lo: lo?.lo,
        hi: hi?.hi,
    };
    if range.is_empty() {
        out.push(Finding::error(
            FindingCode::InvalidRange,
            loc.clone(),
            format!(
                "range '{}..{}' has its lower bound above its upper bound",
                bounds.lo.text, bounds.hi.text
            ),
        ));
        return None;
    }
    Some(range)
}

/// Report a range that does not fit `width` bits.
pub(crate) fn check_fits(
    range: &ValueRange,
    width: u32,
    what: &str,
    field: &str,
    loc: &Location,
    out: &mut FindingSet,
) -> bool {
    if range.fits_width(width) {
        return true;
    }
    out.push(Finding::error(
        FindingCode::ValueOutOfRange,
        loc.clone(),
        format!("{what} {range} does not fit the {width}-bit field '{field}'"),
    ));
    false
}

pub(crate) fn check_variables(model: &PatternModel, out: &mut FindingSet) {
    for var in &model.variables {
        let VariableDomain::Bounds(bounds) = &var.domain else {
            continue;
        };
        let loc = match var.scope {
            VariableScope::Global => Location::section("variables").child(&var.name),
            VariableScope::Table(t) => {
                let table = model.table(t).map_or("?", |t| t.name.as_str());
                Location::section("tables")
                    .child(table)
                    .child("variables")
                    .child(&var.name)
            }
        };
        checked_bounds(model, bounds, &loc, out);
    }
}

/// Bit width of a field, reporting a width that is not a usable number.
fn checked_width(
    model: &PatternModel,
    field: &Field,
    profile: &ValidationProfile,
    loc: &Location,
    out: &mut FindingSet,
) -> Option<u32> {
    let loc = loc.child("width");
    let range = evaluated(model, &field.width, &loc, out)?;
    let invalid = |message: String| Finding::error(FindingCode::InvalidWidth, loc.clone(), message);
    let Some(width) = range.as_point() else {
        out.push(invalid(format!(
            "width '{}' evaluates to {range}, not a single value",
            field.width.text
        )));
        return None;
    };
    if width == 0 {
        out.push(invalid(format!("field '{}' has zero width", field.name)));
        return None;
    }
    if width > u128::from(profile.max_field_width) {
        out.push(invalid(format!(
            "field '{}' is {width} bits wide; at most {} are supported",
            field.name, profile.max_field_width
        )));
        return None;
    }
    u32::try_from(width).ok()
}

/// Declared (non-catalogue) fields: width, domain and prerequisite.
pub(crate) fn check_declared(model: &PatternModel, profile: &ValidationProfile, out: &mut FindingSet) {
    for (i, field) in model.fields.iter().enumerate() {
        if field.is_standard() {
            continue;
        }
        let loc = Location::section("fields").child(&field.name);
        let width = checked_width(model, field, profile, &loc, out);

        if let Some(domain) = &field.domain {
            let dloc = loc.child("domain");
            if let (Some(range), Some(width)) = (checked_bounds(model, domain, &dloc, out), width) {
                check_fits(&range, width, "domain", &field.name, &dloc, out);
            }
        }

        let Some(pre) = &field.prerequisite else {
            continue;
        };
        let ploc = loc.child("prerequisite");
        let Some(pre_id) = pre.field.id() else {
            continue;
        };
        if pre_id.index() == i {
            out.push(Finding::error(
                FindingCode::PrerequisiteMissing,
                ploc,
                format!("field '{}' cannot be its own prerequisite", field.name),
            ));
            continue;
        }
        let Some(pre_field) = model.field(pre_id) else {
            continue;
        };
        let pre_width = pre_field
            .width
            .point()
            .and_then(|w| u32::try_from(w).ok());
        for value in &pre.values {
            if let (Some(range), Some(w)) = (evaluated(model, value, &ploc, out), pre_width) {
                check_fits(&range, w, "prerequisite value", &pre_field.name, &ploc, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::resolver::Resolver;

    fn resolved(fields: serde_json::Value) -> PatternModel {
        let doc = json!({
            "ttp_info": {"name": "t", "version": "1.0.0"},
            "variables": [{"name": "w", "range": "8..16"}],
            "fields": fields,
            "tables": [],
            "security": {"doc": "none"}
        });
        let mut model = ttp_load::load_value(doc, &Default::default())
            .expect("fixture should load")
            .model;
        Resolver::resolve(&mut model);
        model
    }

    fn codes(out: &FindingSet) -> Vec<FindingCode> {
        out.iter().map(|f| f.code).collect()
    }

    #[test]
    fn width_must_be_a_positive_point() {
        let model = resolved(json!([
            {"name": "zero", "width": 0},
            {"name": "ranged", "width": "<w>"},
            {"name": "huge", "width": 200},
            {"name": "fine", "width": "4 * 4"}
        ]));
        let mut out = FindingSet::new();
        check_declared(&model, &ValidationProfile::standard(), &mut out);
        assert_eq!(codes(&out), vec![FindingCode::InvalidWidth; 3]);
        assert_eq!(out.as_slice()[0].location.to_string(), "fields/zero/width");
    }

    #[test]
    fn domain_checked_against_width() {
        let model = resolved(json!([
            {"name": "tag", "width": 4, "domain": "0..0x1f"},
            {"name": "prio", "width": 8, "domain": "9..3"}
        ]));
        let mut out = FindingSet::new();
        check_declared(&model, &ValidationProfile::standard(), &mut out);
        assert_eq!(
            codes(&out),
            vec![FindingCode::ValueOutOfRange, FindingCode::InvalidRange]
        );
        assert!(out.as_slice()[0].message.contains("4-bit field 'tag'"));
    }

    #[test]
    fn prerequisite_value_fits_prerequisite_field() {
        let model = resolved(json!([
            {"name": "inner", "width": 8,
             "prerequisite": {"field": "ip_proto", "value": 300}}
        ]));
        let mut out = FindingSet::new();
        check_declared(&model, &ValidationProfile::standard(), &mut out);
        assert_eq!(codes(&out), vec![FindingCode::ValueOutOfRange]);
    }

    #[test]
    fn inverted_variable_range() {
        let mut model = resolved(json!([]));
        let mut out = FindingSet::new();
        check_variables(&model, &mut out);
        assert!(out.is_empty());

        model = ttp_load::load_value(
            json!({"variables": [{"name": "v", "range": "10..2"}], "tables": [], "security": {}}),
            &Default::default(),
        )
        .unwrap()
        .model;
        Resolver::resolve(&mut model);
        check_variables(&model, &mut out);
        assert_eq!(codes(&out), vec![FindingCode::InvalidRange]);
    }
}
