//! Recovers a single JSON object from free-text model output.
//!
//! Models wrap their JSON in markdown fences, surround it with prose, or leave
//! a trailing comma before a closing bracket. The pipeline below tolerates
//! exactly those artifacts and nothing more: when no object can be parsed
//! after the repairs, it fails instead of guessing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// Characters of cleaned text kept in an [`ExtractionError`] for diagnostics
pub const EXCERPT_CHARS: usize = 500;

// A language tag only counts when the fence line ends right after it
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?").expect("valid fence regex"));
static TRAILING_COMMA_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\}").expect("valid brace regex"));
static TRAILING_COMMA_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*\]").expect("valid bracket regex"));

/// Model output that could not be turned into a JSON object
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid JSON: {message}")]
pub struct ExtractionError {
    /// Parse error from the first failed attempt on the candidate text
    pub message: String,
    /// Leading part of the cleaned text
    pub excerpt: String,
}

/// Extract one JSON object from raw model output.
pub fn extract_json(raw: &str) -> Result<Map<String, Value>, ExtractionError> {
    debug!("Parsing JSON response (length: {})", raw.len());

    let cleaned = strip_code_fences(raw);

    let direct_error = match parse_object(&cleaned) {
        Ok(object) => return Ok(object),
        Err(e) => e,
    };

    let Some(span) = object_span(&cleaned) else {
        debug!("No object span found in response");
        return Err(failure(direct_error, &cleaned));
    };

    let span_error = match parse_object(span) {
        Ok(object) => return Ok(object),
        Err(e) => e,
    };
    debug!("JSON parsing error: {}", span_error);

    let repaired = remove_trailing_commas(span);
    match parse_object(&repaired) {
        Ok(object) => {
            debug!("Parsed JSON after removing trailing commas");
            Ok(object)
        }
        Err(e) => {
            debug!("Still failed after repairs: {}", e);
            Err(failure(span_error, &cleaned))
        }
    }
}

/// Extract a JSON object and convert it into `T`.
///
/// Returns the raw [`ExtractionError`] or the conversion error separately so
/// callers can tell malformed text from a well-formed reply of the wrong shape.
pub fn extract<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractError> {
    let object = extract_json(raw)?;
    serde_json::from_value(Value::Object(object)).map_err(ExtractError::Shape)
}

/// Failure of [`extract`]
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Malformed(#[from] ExtractionError),

    #[error("Unexpected response shape: {0}")]
    Shape(serde_json::Error),
}

/// Remove fenced code-block markers and surrounding whitespace
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Greedy span from the first `{` to the last `}`, inclusive.
///
/// Not brace-balanced: two unrelated objects in one reply yield a span
/// covering both, which then fails to parse.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn remove_trailing_commas(text: &str) -> String {
    let text = TRAILING_COMMA_BRACE.replace_all(text, "}");
    TRAILING_COMMA_BRACKET.replace_all(&text, "]").into_owned()
}

fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(format!("expected a JSON object, found {}", value_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn failure(message: String, cleaned: &str) -> ExtractionError {
    ExtractionError {
        message,
        excerpt: cleaned.chars().take(EXCERPT_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extracted(raw: &str) -> Value {
        Value::Object(extract_json(raw).unwrap())
    }

    #[test]
    fn test_valid_json_is_returned_unchanged() {
        let raw = r#"{"title": "Rust Basics", "description": "Ownership", "tags": ["rust"], "modules": []}"#;
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(extracted(raw), expected);
    }

    #[test]
    fn test_fenced_json_matches_unfenced() {
        let body = r#"{"title": "A", "modules": [{"title": "M", "lessons": ["L1", "L2"]}]}"#;
        let fenced = format!("```json\n{}\n```", body);
        let bare_fence = format!("```\n{}\n```", body);

        assert_eq!(extracted(&fenced), extracted(body));
        assert_eq!(extracted(&bare_fence), extracted(body));
    }

    #[test]
    fn test_trailing_comma_before_brace() {
        let raw = r#"{"title": "A", "description": "B",}"#;
        assert_eq!(extracted(raw), json!({"title": "A", "description": "B"}));
    }

    #[test]
    fn test_trailing_comma_before_bracket_with_whitespace() {
        let raw = "{\"tags\": [\"x\", \"y\" ,\n  ]}";
        assert_eq!(extracted(raw), json!({"tags": ["x", "y"]}));
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Here is your course outline:\n{\"title\": \"Intro\"}\nLet me know if you need changes!";
        assert_eq!(extracted(raw), json!({"title": "Intro"}));
    }

    #[test]
    fn test_fenced_with_prose_and_trailing_comma() {
        let raw = "Sure! ```json\n{\"title\": \"A\", \"tags\": [\"x\", \"y\",]}\n```";
        assert_eq!(extracted(raw), json!({"title": "A", "tags": ["x", "y"]}));
    }

    #[test]
    fn test_no_json_fails() {
        let err = extract_json("no json here").unwrap_err();
        assert_eq!(err.excerpt, "no json here");
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_unrecoverable_object_fails() {
        let err = extract_json("{\"title\": \"A\" \"missing\": comma}").unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON"));
    }

    #[test]
    fn test_top_level_array_is_not_an_object() {
        assert!(extract_json("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_two_objects_do_not_produce_a_guess() {
        // The greedy span covers both objects and is not valid JSON
        let raw = "{\"a\": 1} and also {\"b\": 2}";
        assert!(extract_json(raw).is_err());
    }

    #[test]
    fn test_excerpt_is_limited() {
        let raw = "x".repeat(2000);
        let err = extract_json(&raw).unwrap_err();
        assert_eq!(err.excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn test_excerpt_uses_cleaned_text() {
        let err = extract_json("```json\nnot an object\n```").unwrap_err();
        assert_eq!(err.excerpt, "not an object");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```python\nprint()\n```"), "print()");
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_prose_next_to_a_fence_is_kept() {
        assert_eq!(strip_code_fences("```\nHola\n```Gracias"), "Hola\nGracias");
        assert_eq!(strip_code_fences("Result: ```Thanks``` done"), "Result: Thanks done");
        assert_eq!(strip_code_fences("```rust \r\nlet x = 1;\r\n```"), "let x = 1;");
    }

    #[test]
    fn test_typed_extract_reports_shape_errors() {
        #[derive(Debug, serde::Deserialize)]
        struct Titled {
            #[allow(dead_code)]
            title: String,
        }

        assert!(extract::<Titled>(r#"{"title": "ok"}"#).is_ok());
        assert!(matches!(
            extract::<Titled>(r#"{"name": "no title"}"#),
            Err(ExtractError::Shape(_))
        ));
        assert!(matches!(
            extract::<Titled>("nothing"),
            Err(ExtractError::Malformed(_))
        ));
    }
}
