// =============================================================================
// ANTHROPIC CLIENT - Claude Messages API Integration
// =============================================================================
//
// This module implements the `ChatProvider` port against Anthropic's
// Messages API (https://docs.anthropic.com/en/api/messages).
//
// **Request format:**
// - Authentication: `x-api-key` header plus a pinned `anthropic-version`.
// - `system` is a top-level string field, not a message role.
// - Response text lives at `content[0].text` for plain completions.
//
// **Transport discipline:** every call borrows a transport from the
// `TransportSelector` and reports the outcome back. A geo-block or bad key
// shows up as a permanent denial and degrades that route; timeouts and 5xx
// stay transient so routing does not flap. When the selector fails open the
// call runs with the shorter fallback timeout.

use crate::core::ai::models::truncate_chars;
use crate::core::ai::{ChatMessage, ChatProvider, ChatRequest, ProviderError};
use crate::infra::transport::{Acquired, FailureClass, TransportSelector};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// How much upstream error text is kept in logs and error values.
const ERROR_DETAIL_CHARS: usize = 200;

// =============================================================================
// MESSAGES API DATA STRUCTURES
// =============================================================================

/// Request body for the messages endpoint.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],

    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Response body. Only the content blocks matter here; usage and stop
/// metadata are ignored.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    text: Option<String>,
}

/// Error envelope: `{"type":"error","error":{"type":"...","message":"..."}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

// =============================================================================
// FAILURE CLASSIFICATION
// =============================================================================

/// Maps a non-success response to a `ProviderError`. The typed error body
/// wins over the raw status when it parses, because proxies in front of the
/// provider are known to rewrite statuses but pass the JSON body through.
fn classify_response(status: u16, body: &str) -> ProviderError {
    let detail = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.kind.as_str() {
            "authentication_error" | "permission_error" => {
                return ProviderError::Denied {
                    status,
                    detail: parsed.error.message,
                }
            }
            "rate_limit_error" | "overloaded_error" | "api_error" => {
                return ProviderError::Transient {
                    reason: parsed.error.message,
                }
            }
            _ => parsed.error.message,
        },
        Err(_) => truncate_chars(body.trim(), ERROR_DETAIL_CHARS).to_string(),
    };

    match status {
        401 | 403 | 451 => ProviderError::Denied { status, detail },
        408 | 429 => ProviderError::Transient { reason: detail },
        s if s >= 500 => ProviderError::Transient { reason: detail },
        _ => ProviderError::Invalid { status, detail },
    }
}

/// Errors raised before any HTTP status arrived (DNS, connect, timeout,
/// interrupted body) are all retryable.
fn classify_request_error(err: &reqwest::Error) -> ProviderError {
    ProviderError::Transient {
        reason: err.to_string(),
    }
}

/// Pulls the reply text out of a successful response body.
fn parse_reply(body: &str) -> Result<String, ProviderError> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|err| ProviderError::Transient {
            reason: format!("malformed provider response: {err}"),
        })?;

    let reply = parsed
        .content
        .iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text.as_deref())
        .unwrap_or_default();

    if reply.is_empty() {
        return Err(ProviderError::Transient {
            reason: "provider response had no text content".to_string(),
        });
    }
    Ok(reply.to_string())
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub endpoint: String,
    pub version: String,

    /// Timeout for calls on a healthy transport.
    pub request_timeout: Duration,

    /// Shorter timeout used when the selector failed open and the call is
    /// likely to hit the same wall as everything before it.
    pub fallback_timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            version: "2023-06-01".to_string(),
            request_timeout: Duration::from_secs(30),
            fallback_timeout: Duration::from_secs(10),
        }
    }
}

/// `ChatProvider` backed by the Anthropic API, shared by the moderation and
/// rewrite clients.
pub struct AnthropicClient {
    config: AnthropicConfig,
    transports: Arc<TransportSelector>,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig, transports: Arc<TransportSelector>) -> Self {
        Self { config, transports }
    }

    async fn send(
        &self,
        acquired: &Acquired,
        timeout: Duration,
        body: &MessagesRequest<'_>,
    ) -> Result<String, ProviderError> {
        let response = acquired
            .handle
            .client()
            .post(&self.config.endpoint)
            .timeout(timeout)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.version)
            .json(body)
            .send()
            .await
            .map_err(|err| classify_request_error(&err))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| classify_request_error(&err))?;

        if !status.is_success() {
            return Err(classify_response(status.as_u16(), &text));
        }
        parse_reply(&text)
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let acquired = self.transports.acquire(request.purpose);
        let timeout = if acquired.fail_open {
            self.config.fallback_timeout
        } else {
            self.config.request_timeout
        };

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: &request.messages,
            temperature: request.temperature,
        };

        tracing::debug!(
            purpose = %request.purpose,
            model = %request.model,
            transport = acquired.handle.name(),
            "sending chat request"
        );

        let outcome = self.send(&acquired, timeout, &body).await;
        match &outcome {
            Ok(_) => self.transports.report_success(&acquired.handle),
            Err(ProviderError::Denied { .. }) => {
                self.transports
                    .report_failure(&acquired.handle, FailureClass::Permanent);
            }
            Err(ProviderError::Transient { .. }) => {
                self.transports
                    .report_failure(&acquired.handle, FailureClass::Transient);
            }
            // The transport did its job; a malformed request is not a
            // routing problem.
            Err(ProviderError::Invalid { .. }) => self.transports.report_success(&acquired.handle),
        }
        outcome
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses_classify_as_denied() {
        for status in [401, 403, 451] {
            match classify_response(status, "blocked") {
                ProviderError::Denied { status: got, .. } => assert_eq!(got, status),
                other => panic!("expected denied for {status}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_geo_block_body_classifies_as_denied() {
        let body = r#"{"type":"error","error":{"type":"permission_error","message":"Request not allowed from this region"}}"#;
        match classify_response(403, body) {
            ProviderError::Denied { status, detail } => {
                assert_eq!(status, 403);
                assert_eq!(detail, "Request not allowed from this region");
            }
            other => panic!("expected denied, got {other:?}"),
        }
    }

    #[test]
    fn test_rate_limit_and_server_errors_classify_as_transient() {
        assert!(classify_response(429, "slow down").is_transient());
        assert!(classify_response(500, "boom").is_transient());
        assert!(classify_response(529, "overloaded").is_transient());
    }

    #[test]
    fn test_error_body_type_wins_over_status() {
        // Some proxies rewrite the status but forward the provider body.
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        match classify_response(400, body) {
            ProviderError::Denied { detail, .. } => assert_eq!(detail, "invalid x-api-key"),
            other => panic!("expected denied, got {other:?}"),
        }

        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(classify_response(200, body).is_transient());
    }

    #[test]
    fn test_bad_request_classifies_as_invalid() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens required"}}"#;
        match classify_response(400, body) {
            ProviderError::Invalid { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "max_tokens required");
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_error_body_is_truncated() {
        let noise = "x".repeat(600);
        match classify_response(418, &noise) {
            ProviderError::Invalid { detail, .. } => {
                assert_eq!(detail.chars().count(), ERROR_DETAIL_CHARS)
            }
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply_extracts_first_text_block() {
        let body = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Привет! Текст проверен."}],
            "model": "claude-3-haiku-20240307",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 8}
        }"#;
        assert_eq!(parse_reply(body).unwrap(), "Привет! Текст проверен.");
    }

    #[test]
    fn test_parse_reply_without_text_is_transient() {
        assert!(parse_reply(r#"{"content":[]}"#).unwrap_err().is_transient());
        assert!(parse_reply("not json").unwrap_err().is_transient());
    }

    #[test]
    fn test_request_serialization_skips_absent_temperature() {
        let messages = vec![ChatMessage::user("Проверь это")];
        let request = MessagesRequest {
            model: "claude-3-haiku-20240307",
            max_tokens: 256,
            system: "Ты модератор.",
            messages: &messages,
            temperature: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"max_tokens\":256"));
        assert!(json.contains("\"system\":\"Ты модератор.\""));
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("temperature"));
    }
}
