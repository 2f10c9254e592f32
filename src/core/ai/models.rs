use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What a completion request is for. Travels with the request so transport
/// selection and logging can tell a moderation call from a rewrite call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Moderation,
    Rewrite,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Purpose::Moderation => write!(f, "moderation"),
            Purpose::Rewrite => write!(f, "rewrite"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One completion request, provider-agnostic. The infra client turns this
/// into the concrete wire format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub purpose: Purpose,
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// Provider failures, split by what the caller can do about them.
///
/// `Transient` is worth one retry. `Denied` means this route will keep
/// failing (bad key, geo-block) and the transport should be demoted.
/// `Invalid` is a malformed request on our side; retrying cannot help.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider denied the request (status {status}): {detail}")]
    Denied { status: u16, detail: String },

    #[error("transient provider failure: {reason}")]
    Transient { reason: String },

    #[error("provider rejected the request (status {status}): {detail}")]
    Invalid { status: u16, detail: String },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a char.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("привет", 4), "прив");
        assert_eq!(truncate_chars("привет", 10), "привет");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_user_message_role() {
        let msg = ChatMessage::user("Проверь это");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "Проверь это");
    }
}
