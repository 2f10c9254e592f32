// Moderation pipeline - composes the lexical filter with the remote
// classifier into a single verdict.
//
// Order is fixed: local filter first, and a local rejection never reaches
// the remote tier. The remote tier can add rejections on top of a local
// pass, and an uncertain remote verdict resolves by configured policy
// rather than silently approving.

use super::filter::{FilterDecision, LexicalFilter, TermHit};
use async_trait::async_trait;
use std::str::FromStr;

// ============================================================================
// VERDICT TYPES
// ============================================================================

/// What the remote classifier said about a text. `Uncertain` covers every
/// case where no trustworthy verdict exists: transport failure, malformed
/// reply, moderation disabled upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteVerdict {
    Allowed,
    Flagged { label: String, reason: Option<String> },
    Uncertain,
}

/// Why a text was rejected, with enough detail to tell a lexicon hit from a
/// remote flag in logs and user messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Term(TermHit),
    Remote { label: String, reason: Option<String> },
}

impl Rejection {
    /// Short Russian line shown to the submitting user.
    pub fn user_label(&self) -> String {
        match self {
            Rejection::Term(hit) => hit.category.user_reason().to_string(),
            Rejection::Remote { label, reason } => match reason {
                Some(r) if !r.trim().is_empty() => format!("{label}: {r}"),
                _ => label.clone(),
            },
        }
    }
}

/// Final pipeline verdict. `local_only` records that the remote tier did not
/// vouch for the text (disabled, or uncertain under the allow policy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved { local_only: bool },
    Rejected(Rejection),
    Held,
}

// ============================================================================
// CLASSIFIER PORT
// ============================================================================

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> RemoteVerdict;
}

// ============================================================================
// PIPELINE
// ============================================================================

/// How to resolve a verdict the remote tier could not produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertainPolicy {
    /// Let the text through on the strength of the local filter alone.
    Allow,
    /// Park the text for manual review instead of deciding.
    Review,
}

impl FromStr for UncertainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(UncertainPolicy::Allow),
            "review" => Ok(UncertainPolicy::Review),
            other => Err(format!("expected \"allow\" or \"review\", got \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub remote_enabled: bool,
    pub uncertain_policy: UncertainPolicy,
}

pub struct ModerationPipeline<C: Classifier> {
    filter: LexicalFilter,
    classifier: C,
    config: PipelineConfig,
}

impl<C: Classifier> ModerationPipeline<C> {
    pub fn new(filter: LexicalFilter, classifier: C, config: PipelineConfig) -> Self {
        Self {
            filter,
            classifier,
            config,
        }
    }

    /// Evaluate one text end to end. Never returns an error: infrastructure
    /// trouble surfaces as `Held` or a local-only approval, not a rejection.
    pub async fn evaluate(&self, text: &str) -> Verdict {
        if let FilterDecision::Rejected(hit) = self.filter.check(text) {
            tracing::info!(category = %hit.category, term = %hit.term, "lexical filter rejected text");
            return Verdict::Rejected(Rejection::Term(hit));
        }

        if !self.config.remote_enabled {
            return Verdict::Approved { local_only: true };
        }

        match self.classifier.classify(text).await {
            RemoteVerdict::Allowed => Verdict::Approved { local_only: false },
            RemoteVerdict::Flagged { label, reason } => {
                tracing::info!(%label, "remote moderation flagged text");
                Verdict::Rejected(Rejection::Remote { label, reason })
            }
            RemoteVerdict::Uncertain => match self.config.uncertain_policy {
                UncertainPolicy::Allow => {
                    tracing::warn!("no usable remote verdict, allowing per policy");
                    Verdict::Approved { local_only: true }
                }
                UncertainPolicy::Review => {
                    tracing::warn!("no usable remote verdict, holding for review");
                    Verdict::Held
                }
            },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::lexicon::{Lexicon, TermCategory};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockClassifier {
        verdict: RemoteVerdict,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Classifier for MockClassifier {
        async fn classify(&self, _text: &str) -> RemoteVerdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn pipeline(
        verdict: RemoteVerdict,
        remote_enabled: bool,
        uncertain_policy: UncertainPolicy,
    ) -> (ModerationPipeline<MockClassifier>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = MockClassifier {
            verdict,
            calls: calls.clone(),
        };
        let filter = LexicalFilter::new(Lexicon::builtin()).unwrap();
        let config = PipelineConfig {
            remote_enabled,
            uncertain_policy,
        };
        (ModerationPipeline::new(filter, classifier, config), calls)
    }

    #[tokio::test]
    async fn test_local_rejection_skips_remote_tier() {
        let (pipeline, calls) = pipeline(RemoteVerdict::Allowed, true, UncertainPolicy::Allow);
        let verdict = pipeline.evaluate("продам гашиш недорого").await;
        match verdict {
            Verdict::Rejected(Rejection::Term(hit)) => {
                assert_eq!(hit.category, TermCategory::Drugs)
            }
            other => panic!("expected a term rejection, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clean_text_approved_with_remote_backing() {
        let (pipeline, calls) = pipeline(RemoteVerdict::Allowed, true, UncertainPolicy::Allow);
        let verdict = pipeline.evaluate("Продам велосипед, почти новый").await;
        assert_eq!(verdict, Verdict::Approved { local_only: false });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_flag_rejects() {
        let flagged = RemoteVerdict::Flagged {
            label: "Мошенничество".to_string(),
            reason: Some("Обещает нереальный заработок".to_string()),
        };
        let (pipeline, _) = pipeline(flagged, true, UncertainPolicy::Allow);
        let verdict = pipeline.evaluate("Удалённая работа, 5000$ в неделю").await;
        match verdict {
            Verdict::Rejected(rejection) => {
                let label = rejection.user_label();
                assert!(label.contains("Мошенничество"));
                assert!(label.contains("заработок"));
            }
            other => panic!("expected a remote rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_uncertain_allow_policy_approves_local_only() {
        let (pipeline, _) = pipeline(RemoteVerdict::Uncertain, true, UncertainPolicy::Allow);
        let verdict = pipeline.evaluate("Продам велосипед").await;
        assert_eq!(verdict, Verdict::Approved { local_only: true });
    }

    #[tokio::test]
    async fn test_uncertain_review_policy_holds() {
        let (pipeline, _) = pipeline(RemoteVerdict::Uncertain, true, UncertainPolicy::Review);
        let verdict = pipeline.evaluate("Продам велосипед").await;
        assert_eq!(verdict, Verdict::Held);
    }

    #[tokio::test]
    async fn test_disabled_remote_tier_is_never_called() {
        let (pipeline, calls) = pipeline(RemoteVerdict::Allowed, false, UncertainPolicy::Review);
        let verdict = pipeline.evaluate("Продам велосипед").await;
        assert_eq!(verdict, Verdict::Approved { local_only: true });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_uncertain_policy_parses_from_config_strings() {
        assert_eq!("allow".parse::<UncertainPolicy>(), Ok(UncertainPolicy::Allow));
        assert_eq!("Review".parse::<UncertainPolicy>(), Ok(UncertainPolicy::Review));
        assert!("maybe".parse::<UncertainPolicy>().is_err());
    }
}
