//! Canned Gemini wire payloads for HTTP-level tests.
//!
//! These builders produce the exact generateContent response shape the
//! gateway parses, so tests against [`MockHttpServer`](crate::MockHttpServer)
//! stay readable instead of repeating nested JSON literals.

/// Request path for the generateContent endpoint of `model`.
pub fn generate_content_path(model: &str) -> String {
    format!("/v1beta/models/{model}:generateContent")
}

/// A successful generateContent response carrying plain text.
pub fn gemini_text_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"text": text}]
            },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 12,
            "candidatesTokenCount": 34,
            "totalTokenCount": 46
        }
    })
}

/// A successful generateContent response whose text is serialized JSON.
pub fn gemini_json_reply(value: &serde_json::Value) -> serde_json::Value {
    gemini_text_reply(&value.to_string())
}

/// A successful generateContent response whose text wraps JSON in a
/// markdown code fence, the way Gemini often replies despite instructions.
pub fn gemini_fenced_reply(value: &serde_json::Value) -> serde_json::Value {
    gemini_text_reply(&format!("```json\n{value}\n```"))
}

/// A generateContent response with no candidates (e.g. everything filtered).
pub fn gemini_empty_reply() -> serde_json::Value {
    serde_json::json!({ "candidates": [] })
}

/// A Gemini API error body for the given HTTP status code.
pub fn gemini_error_reply(code: u16, message: &str) -> serde_json::Value {
    let status = match code {
        400 => "INVALID_ARGUMENT",
        401 | 403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        429 => "RESOURCE_EXHAUSTED",
        500 => "INTERNAL",
        503 => "UNAVAILABLE",
        _ => "UNKNOWN",
    };
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "status": status
        }
    })
}
