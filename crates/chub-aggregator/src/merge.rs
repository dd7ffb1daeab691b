use std::collections::BTreeMap;

use serde_json::Value;

/// Merge `overlay` onto `base` in place: a key present on both sides whose
/// values are both objects recurses; otherwise the overlay value wins.
///
/// Mirrors the `mergeMap` rule from the aggregator's profile-bucket merge
/// (§4.8) — distinct from `chub-credhub`'s credential deep-merge, which
/// serves a different component, but the same recursive shape.
pub fn merge_map(base: &mut BTreeMap<String, Value>, overlay: &BTreeMap<String, Value>) {
    for (key, value) in overlay {
        match base.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => {
                merge_value(existing, value.clone());
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_value(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, overlay) => *slot = overlay,
    }
}
