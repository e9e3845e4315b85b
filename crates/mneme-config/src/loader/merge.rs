//! JSON merge helpers for layered configuration.

use serde_json::Value;

/// Apply `overlay` on top of `base`.
///
/// Objects merge key by key; any other overlay value, `null` included,
/// replaces what was there.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    if let (Value::Object(target), Value::Object(layer)) = (&mut *base, overlay) {
        for (key, value) in layer {
            target
                .entry(key.clone())
                .and_modify(|existing| merge_json_values(existing, value))
                .or_insert_with(|| value.clone());
        }
        return;
    }
    *base = overlay.clone();
}
