//! Tolerant parsing of classifier output into an admission decision.
//!
//! Classifier replies are free text that usually, but not always, contain a
//! JSON object. Candidates are tried in order (the raw reply, a ```json
//! fence, any ``` fence, the outermost brace span) and the first one that
//! parses as a JSON object wins.

use crate::model::{MAX_IMPORTANCE, MIN_IMPORTANCE, MemoryCategory};
use log::debug;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static JSON_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").ok());
static ANY_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").ok());

/// A memory the classifier asked to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMemory {
    pub category: MemoryCategory,
    pub content: String,
    /// Already clamped to `[1, 10]`.
    pub importance: u8,
}

/// Result of interpreting a classifier reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Remember(ExtractedMemory),
    Nothing,
}

/// Interpret a raw classifier reply.
///
/// Malformed output never errors; it resolves to `Nothing`.
pub fn parse_extraction(raw: &str) -> ExtractionOutcome {
    let Some(object) = parse_json_object(raw) else {
        debug!("classifier output unparsable (len={})", raw.len());
        return ExtractionOutcome::Nothing;
    };
    interpret(&object)
}

/// Locate the first JSON object in a reply using the candidate pipeline.
pub fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    let attempts: [fn(&str) -> Option<&str>; 4] =
        [direct, json_fence, any_fence, outermost_braces];
    attempts
        .iter()
        .filter_map(|attempt| attempt(raw))
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate.trim()) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
}

fn direct(raw: &str) -> Option<&str> {
    Some(raw)
}

fn json_fence(raw: &str) -> Option<&str> {
    capture_first(JSON_FENCE.as_ref()?, raw)
}

fn any_fence(raw: &str) -> Option<&str> {
    capture_first(ANY_FENCE.as_ref()?, raw)
}

fn outermost_braces(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn capture_first<'a>(regex: &Regex, raw: &'a str) -> Option<&'a str> {
    regex
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn interpret(object: &Map<String, Value>) -> ExtractionOutcome {
    let should_remember = object
        .get("should_remember")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !should_remember {
        return ExtractionOutcome::Nothing;
    }

    let category = object
        .get("category")
        .or_else(|| object.get("memory_type"))
        .and_then(Value::as_str);
    let content = object
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|content| !content.is_empty());
    let importance = object.get("importance").and_then(importance_from_value);

    match (category, content, importance) {
        (Some(category), Some(content), Some(importance)) => {
            ExtractionOutcome::Remember(ExtractedMemory {
                category: MemoryCategory::from_tag(category),
                content: content.to_string(),
                importance,
            })
        }
        _ => {
            debug!("classifier output missing required fields");
            ExtractionOutcome::Nothing
        }
    }
}

/// Accept integer or fractional importance and clamp to `[1, 10]`.
fn importance_from_value(value: &Value) -> Option<u8> {
    let raw = value.as_f64()?;
    if !raw.is_finite() {
        return None;
    }
    let clamped = raw
        .round()
        .clamp(f64::from(MIN_IMPORTANCE), f64::from(MAX_IMPORTANCE));
    Some(clamped as u8)
}

#[cfg(test)]
mod tests {
    use super::{ExtractedMemory, ExtractionOutcome, parse_extraction};
    use crate::model::MemoryCategory;
    use pretty_assertions::assert_eq;

    fn remember(category: MemoryCategory, content: &str, importance: u8) -> ExtractionOutcome {
        ExtractionOutcome::Remember(ExtractedMemory {
            category,
            content: content.to_string(),
            importance,
        })
    }

    #[test]
    fn parses_plain_json() {
        let raw = r#"{"should_remember": true, "memory_type": "preference", "content": "Likes tea", "importance": 6}"#;
        assert_eq!(
            parse_extraction(raw),
            remember(MemoryCategory::Preference, "Likes tea", 6)
        );
    }

    #[test]
    fn parses_json_fence_with_prose() {
        let raw = "Sure!\n```json\n{\"should_remember\": true, \"category\": \"goal\", \"content\": \"Run a marathon\", \"importance\": 8}\n```\nDone.";
        assert_eq!(
            parse_extraction(raw),
            remember(MemoryCategory::Goal, "Run a marathon", 8)
        );
    }

    #[test]
    fn parses_bare_fence() {
        let raw = "```\n{\"should_remember\": true, \"memory_type\": \"fact\", \"content\": \"Has a cat\", \"importance\": 4}\n```";
        assert_eq!(
            parse_extraction(raw),
            remember(MemoryCategory::Fact, "Has a cat", 4)
        );
    }

    #[test]
    fn parses_outermost_braces() {
        let raw = "I think {\"should_remember\": true, \"memory_type\": \"personal_info\", \"content\": \"Name is Ada\", \"importance\": 9} is right";
        assert_eq!(
            parse_extraction(raw),
            remember(MemoryCategory::PersonalInfo, "Name is Ada", 9)
        );
    }

    #[test]
    fn clamps_importance() {
        let high = r#"{"should_remember": true, "memory_type": "fact", "content": "x", "importance": 42}"#;
        let low = r#"{"should_remember": true, "memory_type": "fact", "content": "x", "importance": -3}"#;
        let fractional = r#"{"should_remember": true, "memory_type": "fact", "content": "x", "importance": 6.6}"#;
        assert_eq!(parse_extraction(high), remember(MemoryCategory::Fact, "x", 10));
        assert_eq!(parse_extraction(low), remember(MemoryCategory::Fact, "x", 1));
        assert_eq!(
            parse_extraction(fractional),
            remember(MemoryCategory::Fact, "x", 7)
        );
    }

    #[test]
    fn unknown_category_maps_to_other() {
        let raw = r#"{"should_remember": true, "memory_type": "hobby", "content": "Knits", "importance": 3}"#;
        assert_eq!(parse_extraction(raw), remember(MemoryCategory::Other, "Knits", 3));
    }

    #[test]
    fn declines_and_garbage_resolve_to_nothing() {
        for raw in [
            r#"{"should_remember": false}"#,
            r#"{"should_remember": true, "content": "no type", "importance": 5}"#,
            r#"{"should_remember": true, "memory_type": "fact", "content": "  ", "importance": 5}"#,
            r#"{"should_remember": true, "memory_type": "fact", "content": "x", "importance": "high"}"#,
            "not json at all",
            "",
            "[1, 2, 3]",
        ] {
            assert_eq!(parse_extraction(raw), ExtractionOutcome::Nothing, "{raw}");
        }
    }
}
