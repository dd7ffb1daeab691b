use proptest::prelude::*;
use serde_json::Value as JsonValue;

fn leaf() -> impl Strategy<Value = JsonValue> {
    prop_oneof![
        any::<i32>().prop_map(|n| JsonValue::from(n)),
        "[a-zA-Z0-9_]{1,8}".prop_map(JsonValue::String),
        any::<bool>().prop_map(JsonValue::Bool),
    ]
}

fn document() -> impl Strategy<Value = serde_json::Map<String, JsonValue>> {
    prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9_]{0,6}", leaf(), 1..6)
        .prop_map(|m| m.into_iter().collect())
}

fn json_to_yaml_text(map: &serde_json::Map<String, JsonValue>) -> String {
    let json = JsonValue::Object(map.clone());
    serde_yaml_ng::to_string(&json).unwrap()
}

proptest! {
    #[test]
    fn flattened_keys_are_non_empty_for_non_trivial_documents(doc in document()) {
        let yaml_text = json_to_yaml_text(&doc);
        let flattened = chub_properties::parse_nested_document(&yaml_text).unwrap();
        prop_assert_eq!(flattened.len(), doc.len());
        for key in flattened.keys() {
            prop_assert!(!key.is_empty());
            prop_assert!(!key.starts_with('.'));
        }
    }

    #[test]
    fn flattening_is_deterministic(doc in document()) {
        let yaml_text = json_to_yaml_text(&doc);
        let first = chub_properties::parse_nested_document(&yaml_text).unwrap();
        let second = chub_properties::parse_nested_document(&yaml_text).unwrap();
        prop_assert_eq!(first, second);
    }
}
