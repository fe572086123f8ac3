//! Dotted-path field merging for structured output.

use serde_json::{Map, Value};

/// Merge `updates` into `destination`, expanding dotted keys into nested
/// objects.
///
/// `'a.b.c': 'hello'` becomes `{'a': {'b': {'c': 'hello'}}}`, creating
/// intermediate objects as needed. A non-object value sitting at an
/// intermediate segment is overwritten by an object; the value at the exact
/// leaf path is overwritten unconditionally. Keys without dots set top-level
/// fields directly. Precedence across several `updates` maps is purely the
/// caller's merge order.
pub fn merge_nested_fields(destination: &mut Map<String, Value>, updates: &Map<String, Value>) {
    for (field_name, field_value) in updates {
        let mut segments: Vec<&str> = field_name.split('.').collect();
        // split always yields at least one segment
        let leaf = segments.pop().unwrap_or(field_name);
        let mut here = &mut *destination;
        for segment in segments {
            let slot = here
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            here = match slot {
                Value::Object(map) => map,
                _ => unreachable!("slot was just replaced with an object"),
            };
        }
        here.insert(leaf.to_string(), field_value.clone());
    }
}
