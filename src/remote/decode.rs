//! Tolerant decoding of remote replies.
//!
//! Order: a body that already is valid JSON is taken as is; otherwise strip a
//! leading markdown fence (or, failing that, the first fenced block in prose)
//! and parse strictly. Plain text starting with `Error` becomes a business
//! error; anything else that fails to parse is malformed. Nothing here panics
//! on bad input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::error::{RemoteCallError, RemoteResult};

static WRAPPING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*)```\z").expect("fence pattern is valid")
});

static LEADING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

/// Content of the fence wrapping the input, or of the first fenced block in
/// surrounding prose, or the trimmed input when there is none.
///
/// Input that starts as JSON is never searched, so backticks inside its
/// string values survive.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    // Outermost fence first so fences inside the payload stay intact
    let wrapped = WRAPPING_FENCE
        .captures(trimmed)
        .or_else(|| LEADING_FENCE.captures(trimmed))
        .and_then(|c| c.get(1));
    if let Some(inner) = wrapped {
        return inner.as_str().trim();
    }
    // Opening fence without a closing one (truncated output)
    if let Some(rest) = trimmed.strip_prefix("```") {
        return match rest.find('\n') {
            Some(idx) => rest[idx + 1..].trim(),
            None => "",
        };
    }
    if starts_structured(trimmed) {
        return trimmed;
    }
    match FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Decode one reply body into JSON.
pub fn decode_reply(raw: &str) -> RemoteResult<Value> {
    let trimmed = raw.trim();
    if starts_structured(trimmed) {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Ok(value);
        }
    }

    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(RemoteCallError::malformed(raw, "no content after removing code fences"));
    }

    if !starts_structured(body) && looks_like_error(body) {
        return Err(RemoteCallError::RemoteBusinessError {
            message: body.to_string(),
        });
    }

    serde_json::from_str(body).map_err(|e| RemoteCallError::malformed(raw, e))
}

/// Surface failures the remote reported inside an otherwise valid payload:
/// an `error` key, or `status: "error"` with a `message`.
pub fn reject_reported_errors(value: Value) -> RemoteResult<Value> {
    if let Value::Object(map) = &value {
        if let Some(err) = map.get("error").filter(|v| !v.is_null()) {
            return Err(RemoteCallError::RemoteBusinessError {
                message: value_text(err),
            });
        }
        let errored = map
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("error"))
            .unwrap_or(false);
        if errored {
            let message = map
                .get("message")
                .map(value_text)
                .unwrap_or_else(|| "Unknown remote error".to_string());
            return Err(RemoteCallError::RemoteBusinessError { message });
        }
    }
    Ok(value)
}

fn starts_structured(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

/// Tool frameworks report failures as text beginning with `Error`.
fn looks_like_error(text: &str) -> bool {
    text.get(..5)
        .map(|prefix| prefix.eq_ignore_ascii_case("error"))
        .unwrap_or(false)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_and_bare_json_decode_identically() {
        let bare = r#"{"invoice_no": "INV-1", "total_amount": 500}"#;
        let fenced = format!("```json\n{}\n```", bare);
        let fenced_no_lang = format!("Here you go:\n```\n{}\n```\nThanks", bare);
        let expected = decode_reply(bare).unwrap();
        assert_eq!(decode_reply(&fenced).unwrap(), expected);
        assert_eq!(decode_reply(&fenced_no_lang).unwrap(), expected);
    }

    #[test]
    fn backticks_inside_json_strings_are_kept() {
        let raw = r#"{"html": "<pre>```sql\nSELECT 1\n```</pre>"}"#;
        let value = decode_reply(raw).unwrap();
        assert_eq!(value["html"], "<pre>```sql\nSELECT 1\n```</pre>");

        let fenced = format!("```json\n{}\n```", raw);
        assert_eq!(decode_reply(&fenced).unwrap(), value);
    }

    #[test]
    fn unterminated_fence_is_tolerated() {
        let value = decode_reply("```json\n{\"a\": 1}").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn plain_text_error_is_a_business_error() {
        let err = decode_reply("Error executing tool ocr: file missing").unwrap_err();
        assert_eq!(
            err,
            RemoteCallError::RemoteBusinessError {
                message: "Error executing tool ocr: file missing".to_string()
            }
        );
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = decode_reply("{\"invoice_no\": ").unwrap_err();
        assert!(matches!(err, RemoteCallError::MalformedResponse { .. }));

        let err = decode_reply("sure, here is the invoice").unwrap_err();
        assert!(matches!(err, RemoteCallError::MalformedResponse { .. }));
    }

    #[test]
    fn error_word_mid_sentence_is_not_a_business_error() {
        let err = decode_reply("Checked the invoice, no errors found").unwrap_err();
        assert!(matches!(err, RemoteCallError::MalformedResponse { .. }));

        let err = decode_reply("error: quota exhausted").unwrap_err();
        assert_eq!(err.to_string(), "error: quota exhausted");
    }

    #[test]
    fn empty_fence_is_malformed() {
        let err = decode_reply("```json\n```").unwrap_err();
        assert!(matches!(err, RemoteCallError::MalformedResponse { .. }));
    }

    #[test]
    fn error_key_is_rejected() {
        let err = reject_reported_errors(json!({"error": "Invalid JSON from LLM"})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON from LLM");
    }

    #[test]
    fn status_error_uses_message() {
        let err = reject_reported_errors(json!({"status": "error", "message": "File not found"}))
            .unwrap_err();
        assert_eq!(err.to_string(), "File not found");

        let ok = reject_reported_errors(json!({"valid": false, "reason": "not found"})).unwrap();
        assert_eq!(ok["valid"], false);
        assert!(reject_reported_errors(json!({"error": null, "x": 1})).is_ok());
    }
}
