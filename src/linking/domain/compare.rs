//! Content comparison for persisted values.

use serde_json::Value;

/// Compares two JSON values for deep equality, skipping top-level keys named
/// in `ignored_fields` when both sides are objects.
///
/// Persisted entities are reloaded as fresh objects on every change event,
/// so linking decisions are taken on content rather than identity.
#[must_use]
pub fn content_eq_ignoring(left: &Value, right: &Value, ignored_fields: &[String]) -> bool {
    let (Value::Object(left_fields), Value::Object(right_fields)) = (left, right) else {
        return left == right;
    };

    let is_relevant = |key: &str| !ignored_fields.iter().any(|ignored| ignored == key);

    let left_count = left_fields.keys().filter(|key| is_relevant(key)).count();
    let right_count = right_fields.keys().filter(|key| is_relevant(key)).count();
    if left_count != right_count {
        return false;
    }

    left_fields
        .iter()
        .filter(|(key, _)| is_relevant(key))
        .all(|(key, value)| right_fields.get(key) == Some(value))
}
