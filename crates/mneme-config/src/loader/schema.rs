//! Schema validation helpers for Mneme JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema",
        "short_term",
        "long_term",
        "ranking",
        "context",
        "storage",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("short_term") {
        validate_short_term(value, layer, "short_term")?;
    }
    if let Some(value) = map.get("long_term") {
        validate_long_term(value, layer, "long_term")?;
    }
    if let Some(value) = map.get("ranking") {
        validate_ranking(value, layer, "ranking")?;
    }
    if let Some(value) = map.get("context") {
        validate_context(value, layer, "context")?;
    }
    if let Some(value) = map.get("storage") {
        validate_storage(value, layer, "storage")?;
    }

    Ok(())
}

/// Validate the "short_term" block.
fn validate_short_term(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "strategy",
        "max_messages",
        "summary_threshold",
        "summary_chunk_size",
        "window_limit",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    if let Some(value) = map.get("strategy") {
        validate_strategy(value, layer, &join_path(path, "strategy"))?;
    }
    for key in [
        "max_messages",
        "summary_threshold",
        "summary_chunk_size",
        "window_limit",
    ] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_strategy(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let Some(strategy) = value.as_str() else {
        return Err(invalid_field(layer, path, "expected string"));
    };
    if matches!(strategy, "trim" | "summarize") {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "invalid retention strategy"))
    }
}

/// Validate the "long_term" block.
fn validate_long_term(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = ["top_k", "min_similarity", "extract_every", "embedding_dim"];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    if let Some(value) = map.get("top_k") {
        expect_u64(value, layer, &join_path(path, "top_k"))?;
    }
    if let Some(value) = map.get("min_similarity") {
        expect_f64(value, layer, &join_path(path, "min_similarity"))?;
    }
    if let Some(value) = map.get("extract_every") {
        expect_u64(value, layer, &join_path(path, "extract_every"))?;
    }
    if let Some(value) = map.get("embedding_dim") {
        expect_u64(value, layer, &join_path(path, "embedding_dim"))?;
    }
    Ok(())
}

/// Validate the "ranking" block.
fn validate_ranking(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    let allowed = [
        "similarity_weight",
        "importance_weight",
        "high_threshold",
        "medium_threshold",
    ];
    ensure_allowed_keys(map, &allowed, layer, path)?;

    for key in allowed {
        if let Some(value) = map.get(key) {
            expect_f64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "context" block.
fn validate_context(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["system_prompt"], layer, path)?;

    if let Some(value) = map.get("system_prompt") {
        expect_optional_string(value, layer, &join_path(path, "system_prompt"))?;
    }
    Ok(())
}

/// Validate the "storage" block.
fn validate_storage(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["path"], layer, path)?;

    if let Some(value) = map.get("path") {
        expect_optional_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

/// Expect a JSON object or return a typed error.
fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON string or null.
fn expect_optional_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_null() {
        return Ok(());
    }
    expect_string(value, layer, path)
}

/// Expect a non-negative JSON integer or return a typed error.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_u64().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a JSON number or return a typed error.
fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_f64() || value.is_u64() || value.is_i64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
