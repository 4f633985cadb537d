//! Locate and parse the JSON object inside a model response.
//!
//! Models wrap their answer in prose or code fences often enough that strict
//! parsing of the raw text is useless. Extraction runs in two stages:
//!   1. a fenced block (```` ```json ````, or a bare ```` ``` ```` fence whose
//!      body is an object)
//!   2. the span from the first `{` to the last `}`
//! and only then parses strictly.

use serde_json::{Map, Value};
use thiserror::Error;

use capricorn_common::{ExtractedMetadata, REQUIRED_METADATA_FIELDS};

#[derive(Debug, Error)]
pub enum JsonExtractError {
    #[error("no JSON object found in response")]
    NoJson,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Body of the first fenced block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find(JSON_FENCE) {
        let body = &text[start + JSON_FENCE.len()..];
        let end = body.find(FENCE).unwrap_or(body.len());
        return Some(body[..end].trim());
    }

    let start = text.find(FENCE)?;
    let after = &text[start + FENCE.len()..];
    // Skip an optional language tag on the fence line.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find(FENCE)?;
    let body = body[..end].trim();
    body.starts_with('{').then_some(body)
}

/// First `{` through last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Candidate JSON text, without parsing.
pub fn locate_json(text: &str) -> Option<&str> {
    let text = text.trim();
    match fenced_block(text) {
        Some(block) if !block.is_empty() => Some(block),
        _ => brace_span(text),
    }
}

/// Locate and strictly parse a JSON value.
pub fn extract_json(text: &str) -> Result<Value, JsonExtractError> {
    let candidate = locate_json(text).ok_or(JsonExtractError::NoJson)?;
    Ok(serde_json::from_str(candidate)?)
}

/// Fields from `required` absent or null in `obj`, in the order given.
pub fn missing_fields(obj: &Map<String, Value>, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|f| obj.get(**f).map_or(true, Value::is_null))
        .map(|f| f.to_string())
        .collect()
}

/// Parse article metadata from a model response.
///
/// Accepts `{"article_metadata": {...}}` or the bare metadata object. Every
/// required field must be present; absent booleans default to false.
pub fn extract_metadata(text: &str) -> Result<ExtractedMetadata, JsonExtractError> {
    let value = extract_json(text)?;
    let mut obj = match value {
        Value::Object(obj) => obj,
        _ => return Err(JsonExtractError::NoJson),
    };
    if let Some(Value::Object(inner)) = obj.remove("article_metadata") {
        obj = inner;
    }

    // An unknown score is allowed; the journal table fills it in later.
    if obj.get("journal_sjr").is_some_and(Value::is_null) {
        obj.insert("journal_sjr".to_string(), Value::from(0));
    }

    let missing = missing_fields(&obj, &REQUIRED_METADATA_FIELDS);
    if !missing.is_empty() {
        return Err(JsonExtractError::MissingFields(missing));
    }
    Ok(serde_json::from_value(Value::Object(obj))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PAYLOAD: &str = r#"{"article_metadata": {"title": "FLT3 inhibition", "journal_title": "Blood", "journal_sjr": 5.1, "type_of_disease": "AML", "paper_type": "Clinical trial", "actionable_events": [{"event": "FLT3-ITD", "matches_query": true}]}}"#;

    #[test]
    fn test_fenced_and_prose_wrapped_agree() {
        let fenced = format!("Here you go:\n```json\n{}\n```\nThanks", PAYLOAD);
        let prose = format!("Sure! The analysis is {} Let me know.", PAYLOAD);
        let a = extract_json(&fenced).unwrap();
        let b = extract_json(&prose).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["article_metadata"]["journal_title"], json!("Blood"));
    }

    #[test]
    fn test_generic_fence() {
        let text = format!("```\n{}\n```", PAYLOAD);
        assert!(extract_json(&text).is_ok());
    }

    #[test]
    fn test_unterminated_json_fence_takes_rest() {
        let text = format!("```json\n{}", PAYLOAD);
        assert!(extract_json(&text).is_ok());
    }

    #[test]
    fn test_no_json() {
        assert!(matches!(extract_json("I could not read the article."), Err(JsonExtractError::NoJson)));
        assert!(matches!(extract_json("} backwards {"), Err(JsonExtractError::NoJson)));
    }

    #[test]
    fn test_invalid_json() {
        let res = extract_json("result: {\"title\": \"x\",, }");
        assert!(matches!(res, Err(JsonExtractError::InvalidJson(_))));
    }

    #[test]
    fn test_metadata_wrapper_and_bare_object() {
        let wrapped = extract_metadata(PAYLOAD).unwrap();
        let bare_text = serde_json::to_string(
            &serde_json::from_str::<Value>(PAYLOAD).unwrap()["article_metadata"],
        )
        .unwrap();
        let bare = extract_metadata(&bare_text).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.matched_event_count(), 1);
        assert!(!wrapped.novelty);
    }

    #[test]
    fn test_missing_paper_type_is_rejected() {
        let text = r#"{"title": "t", "journal_title": "j", "journal_sjr": 0, "type_of_disease": "ALL", "actionable_events": []}"#;
        match extract_metadata(text) {
            Err(JsonExtractError::MissingFields(f)) => assert_eq!(f, vec!["paper_type".to_string()]),
            other => panic!("expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn test_null_required_field_is_rejected() {
        let text = r#"{"article_metadata":{"title":"t","journal_title":"j","journal_sjr":0,"type_of_disease":"ALL","paper_type":null,"actionable_events":[]}}"#;
        match extract_metadata(text) {
            Err(JsonExtractError::MissingFields(f)) => assert_eq!(f, vec!["paper_type".to_string()]),
            other => panic!("expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn test_null_journal_sjr_defaults_to_zero() {
        let text = r#"{"title":"t","journal_title":"Blood","journal_sjr":null,"type_of_disease":"ALL","paper_type":"Review","actionable_events":[]}"#;
        let meta = extract_metadata(text).unwrap();
        assert_eq!(meta.journal_sjr, 0.0);
    }

    #[test]
    fn test_missing_fields_listed_in_order() {
        let err = extract_metadata(r#"{"title": "only"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required fields: journal_title, journal_sjr, type_of_disease, paper_type, actionable_events"
        );
    }
}
