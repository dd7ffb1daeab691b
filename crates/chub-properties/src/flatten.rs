use std::collections::BTreeMap;

use serde_json::{Number as JsonNumber, Value as JsonValue};
use serde_yaml_ng::Value as YamlValue;

/// Flatten a YAML value into `out`, keyed by dotted path rooted at `prefix`.
///
/// `prefix` is empty for the document root; each recursive call appends
/// either `.key` (mapping) or `[i]` (sequence index).
pub fn flatten_value(prefix: &str, value: &YamlValue, out: &mut BTreeMap<String, JsonValue>) {
    match value {
        YamlValue::Mapping(map) => {
            for (key, child) in map {
                let child_prefix = mapping_child_prefix(prefix, key);
                flatten_value(&child_prefix, child, out);
            }
        }
        YamlValue::Sequence(seq) => {
            if seq.is_empty() {
                insert(out, prefix, JsonValue::Array(Vec::new()));
            } else {
                for (i, child) in seq.iter().enumerate() {
                    flatten_value(&format!("{prefix}[{i}]"), child, out);
                }
            }
        }
        YamlValue::Tagged(tagged) => flatten_value(prefix, &tagged.value, out),
        scalar => insert(out, prefix, scalar_to_json(scalar)),
    }
}

fn mapping_child_prefix(prefix: &str, key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => format!("{prefix}.{s}"),
        YamlValue::Number(n) if n.is_i64() || n.is_u64() => format!("{prefix}[{n}]"),
        other => format!("{prefix}.{}", scalar_text(other)),
    }
}

fn scalar_text(value: &YamlValue) -> String {
    match value {
        YamlValue::Null => String::new(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

fn scalar_to_json(value: &YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::Number(JsonNumber::from(i))
            } else if let Some(u) = n.as_u64() {
                JsonValue::Number(JsonNumber::from(u))
            } else if let Some(f) = n.as_f64() {
                JsonNumber::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
            } else {
                JsonValue::Null
            }
        }
        YamlValue::String(s) => match s.to_uppercase().as_str() {
            "ON" => JsonValue::Bool(true),
            "OFF" => JsonValue::Bool(false),
            _ => JsonValue::String(s.clone()),
        },
        YamlValue::Sequence(_) | YamlValue::Mapping(_) | YamlValue::Tagged(_) => JsonValue::Null,
    }
}

fn insert(out: &mut BTreeMap<String, JsonValue>, prefix: &str, value: JsonValue) {
    let key = prefix.strip_prefix('.').unwrap_or(prefix);
    out.insert(key.to_string(), value);
}

/// Flatten an already-parsed JSON value by the same rules as [`flatten_value`]
/// (mapping `.key`, sequence `[i]`, empty-array preservation, `ON`/`OFF`
/// string coercion). Used by the aggregator to flatten credhub layers,
/// whose values arrive as JSON rather than through a YAML document parse.
pub fn flatten_json_value(prefix: &str, value: &JsonValue, out: &mut BTreeMap<String, JsonValue>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                flatten_json_value(&format!("{prefix}.{key}"), child, out);
            }
        }
        JsonValue::Array(seq) => {
            if seq.is_empty() {
                insert(out, prefix, JsonValue::Array(Vec::new()));
            } else {
                for (i, child) in seq.iter().enumerate() {
                    flatten_json_value(&format!("{prefix}[{i}]"), child, out);
                }
            }
        }
        JsonValue::String(s) => match s.to_uppercase().as_str() {
            "ON" => insert(out, prefix, JsonValue::Bool(true)),
            "OFF" => insert(out, prefix, JsonValue::Bool(false)),
            _ => insert(out, prefix, JsonValue::String(s.clone())),
        },
        scalar => insert(out, prefix, scalar.clone()),
    }
}
