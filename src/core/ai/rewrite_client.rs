// AI rewrite of ad descriptions.
//
// One request, one candidate. The model is told to keep every fact and add
// none, and whatever comes back is trimmed and length-capped before the
// workflow ever sees it.

use super::models::{truncate_chars, ChatMessage, ChatRequest, Purpose};
use super::remote::{call_with_retry, ChatProvider, RetryPolicy};
use crate::core::workflow::{RewriteError, Rewriter};
use async_trait::async_trait;

pub const REWRITE_SYSTEM_PROMPT: &str = "\
Ты — помощник для написания объявлений о продаже на торговой площадке.

Твоя задача — улучшить описание объявления, сохранив всю информацию от пользователя.

Правила:
1. Сохрани ВСЮ фактическую информацию из оригинала
2. Исправь орфографию и пунктуацию
3. Сделай текст более читаемым и структурированным
4. Добавь эмодзи где уместно (не больше 2-3)
5. Длина: 2-5 предложений (не больше 500 символов)
6. Тон: дружелюбный, но деловой
7. НЕ добавляй информацию, которой нет в оригинале
8. НЕ добавляй цену, контакты, призывы \"звоните/пишите\"
9. Пиши на русском языке

Верни ТОЛЬКО улучшенный текст описания, без пояснений.";

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub model: String,
    pub max_tokens: u32,
    pub max_input_chars: usize,
    /// Inputs shorter than this are not worth a model call.
    pub min_input_chars: usize,
    /// Candidates longer than this are cut with a trailing ellipsis.
    pub max_candidate_chars: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 512,
            max_input_chars: 1000,
            min_input_chars: 5,
            max_candidate_chars: 1000,
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct RewriteClient<P: ChatProvider> {
    provider: P,
    config: RewriteConfig,
    retry: RetryPolicy,
}

impl<P: ChatProvider> RewriteClient<P> {
    pub fn new(provider: P, config: RewriteConfig, retry: RetryPolicy) -> Self {
        Self {
            provider,
            config,
            retry,
        }
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        let excerpt = truncate_chars(text, self.config.max_input_chars);
        ChatRequest {
            purpose: Purpose::Rewrite,
            model: self.config.model.clone(),
            system: REWRITE_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage::user(format!(
                "Оригинальное описание от пользователя:\n{excerpt}\n\nУлучши это описание:"
            ))],
            max_tokens: self.config.max_tokens,
            temperature: Some(0.7),
        }
    }
}

#[async_trait]
impl<P: ChatProvider> Rewriter for RewriteClient<P> {
    async fn improve(&self, text: &str) -> Result<String, RewriteError> {
        if text.trim().chars().count() < self.config.min_input_chars {
            return Err(RewriteError::Unusable);
        }

        let request = self.build_request(text);
        let reply = call_with_retry(&self.provider, &request, self.retry)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "rewrite call failed");
                RewriteError::Unavailable
            })?;

        polish_candidate(&reply, &self.config)
    }
}

/// Trim the model's reply and enforce the candidate length bounds.
fn polish_candidate(reply: &str, config: &RewriteConfig) -> Result<String, RewriteError> {
    let candidate = reply.trim();
    let chars = candidate.chars().count();

    if chars < config.min_input_chars {
        return Err(RewriteError::Unusable);
    }
    if chars > config.max_candidate_chars {
        let cut: String = candidate
            .chars()
            .take(config.max_candidate_chars.saturating_sub(3))
            .collect();
        return Ok(format!("{cut}..."));
    }
    Ok(candidate.to_string())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::models::ProviderError;
    use std::time::Duration;

    fn config() -> RewriteConfig {
        RewriteConfig::default()
    }

    #[test]
    fn test_candidate_is_trimmed() {
        let polished = polish_candidate("\n  Продам велосипед, звонкий и быстрый. \n", &config());
        assert_eq!(polished.unwrap(), "Продам велосипед, звонкий и быстрый.");
    }

    #[test]
    fn test_empty_or_tiny_reply_is_unusable() {
        assert_eq!(polish_candidate("", &config()), Err(RewriteError::Unusable));
        assert_eq!(polish_candidate("  ок ", &config()), Err(RewriteError::Unusable));
    }

    #[test]
    fn test_overlong_candidate_is_cut_with_ellipsis() {
        let reply = "д".repeat(1200);
        let polished = polish_candidate(&reply, &config()).unwrap();
        assert_eq!(polished.chars().count(), 1000);
        assert!(polished.ends_with("..."));
    }

    #[test]
    fn test_candidate_at_the_limit_is_kept_whole() {
        let reply = "д".repeat(1000);
        let polished = polish_candidate(&reply, &config()).unwrap();
        assert_eq!(polished.chars().count(), 1000);
        assert!(!polished.ends_with("..."));
    }

    struct FixedProvider(&'static str);

    #[async_trait]
    impl ChatProvider for FixedProvider {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    struct DownProvider;

    #[async_trait]
    impl ChatProvider for DownProvider {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            Err(ProviderError::Denied {
                status: 403,
                detail: "region blocked".to_string(),
            })
        }
    }

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_short_input_fails_without_a_model_call() {
        let client = RewriteClient::new(FixedProvider("длинный улучшенный текст"), config(), no_backoff());
        assert_eq!(client.improve("аб").await, Err(RewriteError::Unusable));
    }

    #[tokio::test]
    async fn test_successful_rewrite_returns_candidate() {
        let client = RewriteClient::new(
            FixedProvider("🚲 Продам велосипед в отличном состоянии."),
            config(),
            no_backoff(),
        );
        let candidate = client.improve("прода велик почти новый").await.unwrap();
        assert_eq!(candidate, "🚲 Продам велосипед в отличном состоянии.");
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_unavailable() {
        let client = RewriteClient::new(DownProvider, config(), no_backoff());
        assert_eq!(
            client.improve("прода велик почти новый").await,
            Err(RewriteError::Unavailable)
        );
    }
}
