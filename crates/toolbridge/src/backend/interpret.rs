//! Backend response interpretation.
//!
//! Classifies a raw response as HTML (login page / gateway error),
//! server-sent events, or plain JSON and decodes it into a `Value`.

use serde_json::Value;

use super::RawResponse;
use crate::error::{BridgeError, BridgeResult};

/// Media type marker for server-sent events.
const EVENT_STREAM: &str = "text/event-stream";

/// Media type marker for HTML pages.
const TEXT_HTML: &str = "text/html";

/// Prefix of an SSE data line.
const DATA_PREFIX: &str = "data:";

/// Maximum characters of a decoded value included in log lines.
pub const PREVIEW_LIMIT: usize = 500;

/// Interpret a complete backend response.
///
/// The HTTP status is checked first; content-based decoding only runs for
/// 2xx responses.
pub fn interpret(response: &RawResponse) -> BridgeResult<Value> {
    if !(200..300).contains(&response.status) {
        return Err(BridgeError::HttpStatus {
            code: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }
    decode_body(&response.body, &response.content_type)
}

/// Decode a 2xx response body given its declared content type.
pub fn decode_body(body: &[u8], content_type: &str) -> BridgeResult<Value> {
    let text = String::from_utf8_lossy(body);

    // HTML wins over whatever the content type claims.
    if looks_like_html(&text) {
        return Err(BridgeError::AuthenticationOrRouting);
    }

    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains(EVENT_STREAM) {
        return decode_event_stream(&text);
    }
    if content_type.contains(TEXT_HTML) {
        return Err(BridgeError::AuthenticationOrRouting);
    }

    serde_json::from_slice(body).map_err(|e| BridgeError::NonJson(e.to_string()))
}

/// Whether the trimmed body opens an HTML document.
fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(16).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Join every `data:` line of an event stream and parse the result as one
/// JSON document.
fn decode_event_stream(text: &str) -> BridgeResult<Value> {
    let data_lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .collect();

    if data_lines.is_empty() {
        return Err(BridgeError::EmptyStream);
    }

    let joined = data_lines.join("\n");
    serde_json::from_str(&joined).map_err(|e| BridgeError::NonJson(e.to_string()))
}

/// Render a value for logging, cut at `PREVIEW_LIMIT` characters.
pub fn preview(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= PREVIEW_LIMIT {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(PREVIEW_LIMIT).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn response(status: u16, content_type: &str, body: &str) -> RawResponse {
        RawResponse {
            method: "GET",
            url: "http://backend.test/zmcp".to_string(),
            status,
            content_type: content_type.to_string(),
            body: body.as_bytes().to_vec(),
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn plain_json_object() {
        let value = decode_body(br#"{"TOOL_ID":"T1"}"#, "application/json").unwrap();
        assert_eq!(value, json!({"TOOL_ID": "T1"}));
    }

    #[test]
    fn html_wins_over_json_content_type() {
        let err = decode_body(b"<html><body>login</body></html>", "application/json")
            .unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationOrRouting));
    }

    #[test]
    fn doctype_detection_is_case_insensitive_and_trimmed() {
        let err = decode_body(b"   \n<!doctype HTML>\n<html></html>", "").unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationOrRouting));
    }

    #[test]
    fn html_content_type_is_rejected() {
        let err = decode_body(b"Session expired", "text/html; charset=utf-8").unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationOrRouting));
    }

    #[test]
    fn event_stream_single_frame() {
        let body = b"event: message\ndata: {\"x\": 1}\n\n";
        let value = decode_body(body, "text/event-stream").unwrap();
        assert_eq!(value, json!({"x": 1}));
    }

    #[test]
    fn event_stream_document_split_across_frames() {
        let body = b"data: {\"a\":\ndata:   [1, 2]}\n";
        let value = decode_body(body, "text/event-stream; charset=utf-8").unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn event_stream_independent_frames_fail_as_non_json() {
        let body = b"data: {\"x\":1}\n\ndata: {\"y\":2}";
        let err = decode_body(body, "text/event-stream").unwrap_err();
        assert!(matches!(err, BridgeError::NonJson(_)));
    }

    #[test]
    fn event_stream_without_data_lines() {
        let err = decode_body(b": keep-alive\n\nevent: ping\n", "text/event-stream").unwrap_err();
        assert!(matches!(err, BridgeError::EmptyStream));
    }

    #[test]
    fn garbage_is_non_json() {
        let err = decode_body(b"OK", "text/plain").unwrap_err();
        assert!(matches!(err, BridgeError::NonJson(_)));
    }

    #[test]
    fn invalid_utf8_is_non_json() {
        let err = decode_body(b"{\"a\":\"\xff\xfe\"}", "application/json").unwrap_err();
        assert!(matches!(err, BridgeError::NonJson(_)));
    }

    #[test]
    fn status_checked_before_content() {
        let err = interpret(&response(401, "text/html", "<html>denied</html>")).unwrap_err();
        match err {
            BridgeError::HttpStatus { code, body } => {
                assert_eq!(code, 401);
                assert_eq!(body, "<html>denied</html>");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[test]
    fn interpret_success() {
        let value = interpret(&response(200, "application/json", "[1,2]")).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn preview_truncates_long_values() {
        let long = json!("x".repeat(2 * PREVIEW_LIMIT));
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_LIMIT + 3);
        assert!(p.ends_with("..."));

        let short = json!({"ok": true});
        assert_eq!(preview(&short), r#"{"ok":true}"#);
    }
}
