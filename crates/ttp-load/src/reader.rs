//! Typed access to the raw JSON tree with structural findings.
//!
//! Every accessor records a finding at the given location when the
//! document does not have the expected shape and returns `None`, so a
//! section builder can keep going and report every problem in one pass.

use serde_json::{Map, Value};
use ttp_core::{
    value, Bounds, ExpressionPolicy, Finding, FindingCode, FindingSet, Location, ValueExpr,
};

pub(crate) type Object = Map<String, Value>;

pub(crate) struct DocReader {
    pub policy: ExpressionPolicy,
    pub findings: FindingSet,
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl DocReader {
    pub fn new(policy: ExpressionPolicy) -> Self {
        Self {
            policy,
            findings: FindingSet::new(),
        }
    }

    pub fn structural(&mut self, loc: &Location, message: impl Into<String>) {
        self.findings.push(Finding::error(
            FindingCode::StructuralError,
            loc.clone(),
            message,
        ));
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn object<'v>(&mut self, v: &'v Value, loc: &Location) -> Option<&'v Object> {
        match v {
            Value::Object(map) => Some(map),
            other => {
                self.structural(loc, format!("expected an object, found {}", kind_of(other)));
                None
            }
        }
    }

    pub fn array<'v>(&mut self, v: &'v Value, loc: &Location) -> Option<&'v Vec<Value>> {
        match v {
            Value::Array(items) => Some(items),
            other => {
                self.structural(loc, format!("expected an array, found {}", kind_of(other)));
                None
            }
        }
    }

    pub fn string<'v>(&mut self, v: &'v Value, loc: &Location) -> Option<&'v str> {
        match v {
            Value::String(s) => Some(s),
            other => {
                self.structural(loc, format!("expected a string, found {}", kind_of(other)));
                None
            }
        }
    }

    /// A required string member.
    pub fn required_str(&mut self, obj: &Object, key: &str, loc: &Location) -> Option<String> {
        match obj.get(key) {
            Some(v) => self.string(v, &loc.child(key)).map(str::to_string),
            None => {
                self.structural(loc, format!("missing required key '{key}'"));
                None
            }
        }
    }

    /// An optional string member; present but mistyped is still an error.
    pub fn optional_str(&mut self, obj: &Object, key: &str, loc: &Location) -> Option<String> {
        let v = obj.get(key)?;
        self.string(v, &loc.child(key)).map(str::to_string)
    }

    /// An optional array of strings.
    pub fn string_list(&mut self, obj: &Object, key: &str, loc: &Location) -> Vec<String> {
        let Some(v) = obj.get(key) else {
            return Vec::new();
        };
        let loc = loc.child(key);
        let Some(items) = self.array(v, &loc) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.string(item, &loc.child(i)).map(str::to_string))
            .collect()
    }

    /// `doc` as a string or an array of strings joined with spaces.
    pub fn doc(&mut self, obj: &Object, loc: &Location) -> Option<String> {
        let v = obj.get("doc")?;
        let loc = loc.child("doc");
        match v {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let mut out = Vec::new();
                for (i, part) in parts.iter().enumerate() {
                    if let Some(s) = self.string(part, &loc.child(i)) {
                        out.push(s.trim().to_string());
                    }
                }
                Some(out.join(" "))
            }
            other => {
                self.structural(
                    &loc,
                    format!("expected a string or array of strings, found {}", kind_of(other)),
                );
                None
            }
        }
    }

    /// An unsigned integer member that must fit `u32`.
    pub fn integer(&mut self, v: &Value, loc: &Location) -> Option<u32> {
        let parsed = match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => value::parse_integer(s.trim()).and_then(|v| u64::try_from(v).ok()),
            _ => None,
        };
        match parsed.and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                self.structural(loc, format!("expected an integer in 0..=4294967295, found {v}"));
                None
            }
        }
    }

    /// A numeric value: a JSON integer, or text parsed as an address,
    /// reserved name or expression.
    pub fn value_expr(&mut self, v: &Value, loc: &Location) -> Option<ValueExpr> {
        let (text, parsed) = match v {
            Value::Number(n) => match n.as_u64() {
                Some(u) => (u.to_string(), Ok(ttp_core::Expr::Lit(u128::from(u)))),
                None => {
                    self.structural(loc, format!("expected a non-negative integer, found {n}"));
                    return None;
                }
            },
            Value::String(s) => (s.clone(), value::parse_value_text(s)),
            other => {
                self.structural(
                    loc,
                    format!("expected a number or value text, found {}", kind_of(other)),
                );
                return None;
            }
        };
        let expr = match parsed {
            Ok(expr) => expr,
            Err(e) => {
                self.structural(loc, format!("invalid value '{text}': {e}"));
                return None;
            }
        };
        if self.policy == ExpressionPolicy::Reject && !expr.is_simple() {
            self.push(
                Finding::error(
                    FindingCode::ExpressionRejected,
                    loc.clone(),
                    format!("arithmetic expression '{text}' is not allowed"),
                )
                .with_suggestion("write the value as a literal or a single <variable>"),
            );
            return None;
        }
        Some(ValueExpr::new(text, expr))
    }

    /// A domain: `"lo..hi"`, `[lo, hi]`, or a single value.
    pub fn bounds(&mut self, v: &Value, loc: &Location) -> Option<Bounds> {
        match v {
            Value::String(s) if s.contains("..") => {
                let (lo, hi) = s.split_once("..")?;
                let lo = self.value_expr(&Value::String(lo.trim().to_string()), loc);
                let hi = self.value_expr(&Value::String(hi.trim().to_string()), loc);
                Some(Bounds { lo: lo?, hi: hi? })
            }
            Value::Array(items) if items.len() == 2 => {
                let lo = self.value_expr(&items[0], &loc.child(0));
                let hi = self.value_expr(&items[1], &loc.child(1));
                Some(Bounds { lo: lo?, hi: hi? })
            }
            Value::Array(items) => {
                self.structural(
                    loc,
                    format!("a range needs exactly two bounds, found {}", items.len()),
                );
                None
            }
            other => self.value_expr(other, loc).map(Bounds::single),
        }
    }

    /// Reject identifiers that collide with reserved names.
    pub fn check_name(&mut self, name: &str, loc: &Location) -> bool {
        if name.starts_with('$') {
            self.push(Finding::error(
                FindingCode::ReservedName,
                loc.clone(),
                format!("'{name}': names starting with '$' are reserved for extension references"),
            ));
            return false;
        }
        if name.trim().is_empty() {
            self.structural(loc, "name must not be empty");
            return false;
        }
        true
    }
}

/// Strip `<...>` around a variable name.
pub(crate) fn variable_name(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Split a `$ref` into the extension reference name.
pub(crate) fn extension_ref(raw: &str) -> Option<&str> {
    raw.trim().strip_prefix('$').map(str::trim)
}
