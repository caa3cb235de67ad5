//! Layer merge logic
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars and null: override (last wins)

use serde_json::{Map, Value};

/// Deep merge `overlay` onto `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order; the last layer has the highest precedence.
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Set a dot-separated `path` inside `target`, creating objects on the way.
///
/// Used to turn individual CLI flags into an override layer.
pub fn set_path(target: &mut Value, path: &str, value: Value) {
    let nested = path.rsplit('.').fold(value, |inner, key| {
        let mut map = Map::new();
        map.insert(key.to_string(), inner);
        Value::Object(map)
    });
    let base = std::mem::take(target);
    *target = deep_merge(base, nested);
}
