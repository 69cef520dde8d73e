use serde_json::Value;
use ttp_core::{Finding, FindingCode, Location, PatternModel, TtpInfo};

use crate::reader::{DocReader, Object};

/// `ttp_info` (or the older `NDM_metadata` spelling). Absence is a
/// warning; a present but malformed section is structural.
pub(crate) fn load_info(reader: &mut DocReader, root: &Object, model: &mut PatternModel) {
    let (key, value) = match (root.get("ttp_info"), root.get("NDM_metadata")) {
        (Some(v), _) => ("ttp_info", v),
        (None, Some(v)) => ("NDM_metadata", v),
        (None, None) => {
            reader.push(
                Finding::warning(
                    FindingCode::MissingInfo,
                    Location::root(),
                    "document has no ttp_info section",
                )
                .with_suggestion("add ttp_info with at least a name and version"),
            );
            return;
        }
    };
    let loc = Location::section(key);
    let Some(obj) = reader.object(value, &loc) else {
        return;
    };
    let name = reader.required_str(obj, "name", &loc);
    let info = TtpInfo {
        name: name.unwrap_or_default(),
        authority: reader.optional_str(obj, "authority", &loc),
        version: version_text(reader, obj.get("version"), &loc),
        of_version: reader.optional_str(obj, "of_version", &loc),
        doc: reader.doc(obj, &loc),
    };
    model.info = Some(info);
}

/// Versions are strings, but a bare number such as `1.0` is tolerated.
fn version_text(reader: &mut DocReader, v: Option<&Value>, loc: &Location) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        other => {
            reader.structural(
                &loc.child("version"),
                format!("expected a version string, found {other}"),
            );
            None
        }
    }
}
