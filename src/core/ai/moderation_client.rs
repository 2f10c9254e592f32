// Remote moderation tier.
//
// Sends the ad text to the model with a strict-JSON instruction and turns
// the reply into a RemoteVerdict. Everything that is not a well-formed,
// confident verdict comes back as Uncertain - this client never invents a
// rejection out of an infrastructure problem.

use super::models::{truncate_chars, ChatMessage, ChatRequest, Purpose};
use super::remote::{call_with_retry, ChatProvider, RetryPolicy};
use crate::core::moderation::{Classifier, RemoteVerdict};
use async_trait::async_trait;
use serde::Deserialize;

pub const MODERATION_SYSTEM_PROMPT: &str = "\
Ты — модератор объявлений на торговой площадке. Твоя задача — проверять объявления на соответствие правилам.

ЗАПРЕЩЕНО:
1. Спам и реклама сторонних сервисов
2. Мошенничество (пирамиды, \"лёгкий заработок\", фейковые схемы)
3. Нецензурная лексика и оскорбления
4. Угрозы и призывы к насилию
5. Разжигание ненависти (расизм, ксенофобия, дискриминация)
6. Контент для взрослых (порно, эскорт)
7. Наркотики и запрещённые вещества
8. Терроризм и экстремизм
9. Контактные данные в обход платформы (телефоны, ссылки, @username)

РАЗРЕШЕНО:
- Обычные объявления о продаже товаров и услуг
- Описание товаров с характеристиками
- Упоминание брендов и моделей
- Указание цен и условий

Отвечай СТРОГО в JSON формате:
{
  \"is_safe\": true/false,
  \"category\": \"safe|spam|scam|profanity|threats|hate_speech|adult_content|drugs|terrorism|fraud|personal_data\",
  \"confidence\": 0.0-1.0,
  \"reason\": \"краткое объяснение на русском (1-2 предложения)\"
}";

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub model: String,
    /// Flags below this confidence are treated as a pass.
    pub confidence_threshold: f64,
    pub max_input_chars: usize,
    pub max_tokens: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".to_string(),
            confidence_threshold: 0.7,
            max_input_chars: 2000,
            max_tokens: 256,
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct ModerationClient<P: ChatProvider> {
    provider: P,
    config: ModerationConfig,
    retry: RetryPolicy,
}

impl<P: ChatProvider> ModerationClient<P> {
    pub fn new(provider: P, config: ModerationConfig, retry: RetryPolicy) -> Self {
        Self {
            provider,
            config,
            retry,
        }
    }

    fn build_request(&self, text: &str) -> ChatRequest {
        let excerpt = truncate_chars(text, self.config.max_input_chars);
        ChatRequest {
            purpose: Purpose::Moderation,
            model: self.config.model.clone(),
            system: MODERATION_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage::user(format!("Проверь это:\n\n{excerpt}"))],
            max_tokens: self.config.max_tokens,
            // Verdicts should not be creative.
            temperature: Some(0.0),
        }
    }
}

#[async_trait]
impl<P: ChatProvider> Classifier for ModerationClient<P> {
    async fn classify(&self, text: &str) -> RemoteVerdict {
        let request = self.build_request(text);
        match call_with_retry(&self.provider, &request, self.retry).await {
            Ok(reply) => parse_verdict(&reply, self.config.confidence_threshold),
            Err(err) => {
                tracing::warn!(error = %err, "moderation call failed, verdict uncertain");
                RemoteVerdict::Uncertain
            }
        }
    }
}

// ============================================================================
// REPLY PARSING
// ============================================================================

#[derive(Debug, Deserialize)]
struct VerdictPayload {
    is_safe: Option<bool>,
    category: Option<String>,
    confidence: Option<f64>,
    reason: Option<String>,
}

// Models occasionally wrap the JSON in prose; take the outermost braces.
fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

fn parse_verdict(reply: &str, confidence_threshold: f64) -> RemoteVerdict {
    let Some(json) = extract_json(reply) else {
        tracing::warn!("moderation reply carried no JSON object");
        return RemoteVerdict::Uncertain;
    };

    let payload: VerdictPayload = match serde_json::from_str(json) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "moderation reply failed to parse");
            return RemoteVerdict::Uncertain;
        }
    };

    if payload.is_safe.unwrap_or(true) {
        return RemoteVerdict::Allowed;
    }

    let confidence = payload.confidence.unwrap_or(0.5);
    if confidence < confidence_threshold {
        tracing::info!(confidence, "flag below confidence threshold, allowing");
        return RemoteVerdict::Allowed;
    }

    RemoteVerdict::Flagged {
        label: category_label(payload.category.as_deref()).to_string(),
        reason: payload.reason,
    }
}

fn category_label(category: Option<&str>) -> &'static str {
    match category {
        Some("spam") => "Спам",
        Some("scam") => "Мошенничество",
        Some("profanity") => "Нецензурная лексика",
        Some("threats") => "Угрозы",
        Some("hate_speech") => "Разжигание ненависти",
        Some("adult_content") => "Контент 18+",
        Some("drugs") => "Наркотики",
        Some("terrorism") => "Терроризм",
        Some("fraud") => "Финансовое мошенничество",
        Some("personal_data") => "Контактные данные в обход",
        _ => "Нарушение правил",
    }
}

// ============================================================================
// TESTS
// ============================================================================
