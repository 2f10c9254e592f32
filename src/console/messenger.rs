// Console-specific presentation - translates workflow updates to the text a
// user would see in the chat surface.

use crate::core::workflow::{MessagingPort, Presentation};
use async_trait::async_trait;

/// Prints workflow updates to stdout. Output is prefixed with the user id so
/// interleaved sessions stay readable.
pub struct ConsoleMessenger;

/// The user-facing text for one update.
pub fn render(update: &Presentation) -> String {
    match update {
        Presentation::Rejected { reason } => {
            format!("❌ Объявление отклонено: {reason}\nИсправьте текст и отправьте снова.")
        }

        Presentation::Held => {
            "⏳ Текст отправлен на ручную проверку модератору. Мы сообщим о решении.".to_string()
        }

        Presentation::ReadyToConfirm {
            text,
            local_only,
            can_rewrite,
        } => {
            let mut out = format!("✅ Текст проверен. Ваше объявление:\n\n{text}\n");
            if *local_only {
                out.push_str("\n(ИИ-проверка недоступна, выполнена базовая проверка.)\n");
            }
            out.push_str("\n/confirm - опубликовать");
            if *can_rewrite {
                out.push_str("\n/improve - улучшить текст с помощью ИИ");
            }
            out.push_str("\n/cancel - отменить");
            out
        }

        Presentation::Busy => "⌛ Предыдущий запрос ещё обрабатывается, подождите.".to_string(),

        Presentation::QuotaExceeded { used, limit } => format!(
            "🚫 Лимит ИИ-улучшений на сегодня исчерпан ({used}/{limit}). Попробуйте завтра."
        ),

        Presentation::RewriteReady { candidate } => format!(
            "✨ Улучшенный вариант:\n\n{candidate}\n\n\
             /confirm_new - опубликовать улучшенный\n\
             /confirm - опубликовать исходный\n\
             /improve - попробовать ещё раз"
        ),

        Presentation::RewriteFailed => {
            "⚠️ Не удалось улучшить текст. Исходный вариант остался без изменений.".to_string()
        }

        Presentation::CandidateRejected { reason } => format!(
            "❌ Улучшенный вариант не прошёл проверку: {reason}\n\
             Можно опубликовать исходный текст (/confirm)."
        ),

        Presentation::Confirmed { text } => {
            format!("🎉 Объявление опубликовано:\n\n{text}")
        }

        Presentation::Cancelled => "🚪 Создание объявления отменено.".to_string(),

        Presentation::NoActiveSession => {
            "ℹ️ Нет активного объявления. Отправьте текст, чтобы начать.".to_string()
        }

        Presentation::NoCandidate => {
            "ℹ️ Улучшенного варианта нет. Сначала выполните /improve.".to_string()
        }
    }
}

#[async_trait]
impl MessagingPort for ConsoleMessenger {
    async fn present(&self, user_id: u64, update: Presentation) {
        println!("\n→ [user {user_id}] {}\n", render(&update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_to_confirm_offers_rewrite_only_within_quota() {
        let with_quota = render(&Presentation::ReadyToConfirm {
            text: "Продам велосипед".to_string(),
            local_only: false,
            can_rewrite: true,
        });
        assert!(with_quota.contains("Продам велосипед"));
        assert!(with_quota.contains("/improve"));
        assert!(!with_quota.contains("базовая проверка"));

        let without_quota = render(&Presentation::ReadyToConfirm {
            text: "Продам велосипед".to_string(),
            local_only: false,
            can_rewrite: false,
        });
        assert!(!without_quota.contains("/improve"));
        assert!(without_quota.contains("/confirm"));
    }

    #[test]
    fn test_local_only_approval_mentions_degraded_check() {
        let out = render(&Presentation::ReadyToConfirm {
            text: "Продам велосипед".to_string(),
            local_only: true,
            can_rewrite: true,
        });
        assert!(out.contains("базовая проверка"));
    }

    #[test]
    fn test_rejection_carries_the_reason() {
        let out = render(&Presentation::Rejected {
            reason: "Ссылки запрещены в объявлениях".to_string(),
        });
        assert!(out.contains("Ссылки запрещены в объявлениях"));
    }

    #[test]
    fn test_quota_exceeded_shows_usage() {
        let out = render(&Presentation::QuotaExceeded { used: 3, limit: 3 });
        assert!(out.contains("3/3"));
    }

    #[test]
    fn test_rewrite_ready_offers_both_texts() {
        let out = render(&Presentation::RewriteReady {
            candidate: "🚲 Отличный велосипед".to_string(),
        });
        assert!(out.contains("🚲 Отличный велосипед"));
        assert!(out.contains("/confirm_new"));
        assert!(out.contains("/confirm"));
    }
}
