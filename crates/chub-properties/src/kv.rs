use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

/// Parse `.properties`-style `key=value` lines.
pub fn parse(content: &str) -> BTreeMap<String, JsonValue> {
    let mut out = BTreeMap::new();
    for line in content.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            out.insert(key.to_string(), JsonValue::String(value.to_string()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        let props = parse("\nfoo=bar\n\n");
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn value_may_contain_further_equals_signs() {
        let props = parse("url=https://example.com/?a=b\n");
        assert_eq!(props.get("url").unwrap(), "https://example.com/?a=b");
    }
}
