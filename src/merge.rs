//! Deep merge of configuration mappings.
//!
//! Precedence is positional: later layers win. Nested objects merge key by
//! key; every other value (numbers, strings, arrays, null) at a higher layer
//! replaces the lower one outright.

use serde_json::{Map, Value};

/// Merge `overlay` into `target`.
pub fn merge_deep(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (Value::Object(target), Value::Object(overlay)) => merge_maps(target, overlay),
        (target, overlay) => *target = overlay.clone(),
    }
}

/// Merge the entries of `overlay` into `target`.
pub fn merge_maps(target: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match target.get_mut(key) {
            Some(existing) if existing.is_object() && value.is_object() => merge_deep(existing, value),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Merge `layers` lowest-precedence first into a new map.
///
/// Layers are only read; the result shares nothing with them.
pub fn merge_layers<'a, I>(layers: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut merged = Map::new();
    for layer in layers {
        merge_maps(&mut merged, layer);
    }
    merged
}
