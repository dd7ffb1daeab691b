// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property file parsing and flattening (component A).
//!
//! Two input shapes are understood: `.properties`-style key-value lines
//! (`parse_key_value`) and YAML nested documents (`parse_nested_document`).
//! Both produce a flat `string → json value` map keyed by dotted path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod flatten;
mod kv;

pub use flatten::{flatten_json_value, flatten_value};

use std::collections::BTreeMap;

use chub_error::{ChubError, ErrorCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use serde_yaml_ng::Value as YamlValue;

/// Parse `.properties`-style key-value lines.
///
/// Lines without `=` are skipped, as are lines whose key begins with `#`.
/// Values are always strings; there is no type coercion in this format.
pub fn parse_key_value(content: &str) -> BTreeMap<String, JsonValue> {
    kv::parse(content)
}

/// Parse a YAML document (or several `---`-concatenated documents) and
/// flatten it to dotted-path keys.
///
/// Multiple concatenated sub-documents are shallow-merged at the top level
/// before flattening; an empty sub-document is ignored rather than
/// overwriting prior content (a workaround carried over from the upstream
/// YAML decoder's handling of trailing `---` separators).
pub fn parse_nested_document(content: &str) -> Result<BTreeMap<String, JsonValue>, ChubError> {
    let merged = merge_documents(content)?;
    let mut out = BTreeMap::new();
    flatten::flatten_value("", &merged, &mut out);
    Ok(out)
}

/// Flatten an already-parsed top-level property map (e.g. a credhub
/// credential's JSON value, which is not necessarily flat) by the same
/// dotted-path rules as [`parse_nested_document`].
pub fn flatten_properties(properties: &BTreeMap<String, JsonValue>) -> BTreeMap<String, JsonValue> {
    let mut out = BTreeMap::new();
    for (key, value) in properties {
        flatten::flatten_json_value(key, value, &mut out);
    }
    out
}

fn merge_documents(content: &str) -> Result<YamlValue, ChubError> {
    let mut merged = serde_yaml_ng::Mapping::new();
    let mut saw_non_mapping_scalar = None;

    for document in serde_yaml_ng::Deserializer::from_str(content) {
        let value = YamlValue::deserialize(document).map_err(|e| {
            ChubError::new(ErrorCode::ParseFailure, "failed to parse YAML document")
                .with_source(e)
        })?;
        match value {
            YamlValue::Null => continue,
            YamlValue::Mapping(m) if m.is_empty() => continue,
            YamlValue::Mapping(m) => {
                for (k, v) in m {
                    merged.insert(k, v);
                }
            }
            other => saw_non_mapping_scalar = Some(other),
        }
    }

    if merged.is_empty() {
        if let Some(scalar) = saw_non_mapping_scalar {
            return Ok(scalar);
        }
    }
    Ok(YamlValue::Mapping(merged))
}
