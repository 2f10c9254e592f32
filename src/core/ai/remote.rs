use super::models::{ChatRequest, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one completion request and return the model's text reply.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}

// Blanket implementation for Arc<P>
// The moderation and rewrite clients share one HTTP-backed provider, so both
// hold it behind an Arc and still satisfy the trait bound.
#[async_trait]
impl<P: ChatProvider + ?Sized> ChatProvider for Arc<P> {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        (**self).complete(request).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(400),
        }
    }
}

/// Call the provider with at most one retry.
///
/// Only transient failures are retried, after a fixed backoff. Denied and
/// invalid requests return immediately: a second attempt cannot change the
/// answer and just burns the route's standing.
pub async fn call_with_retry<P: ChatProvider>(
    provider: &P,
    request: &ChatRequest,
    policy: RetryPolicy,
) -> Result<String, ProviderError> {
    match provider.complete(request).await {
        Ok(reply) => Ok(reply),
        Err(err) if err.is_transient() => {
            tracing::warn!(purpose = %request.purpose, error = %err, "provider call failed, retrying once");
            tokio::time::sleep(policy.backoff).await;
            provider.complete(request).await
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::models::Purpose;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct SequenceProvider {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicUsize,
    }

    impl SequenceProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for SequenceProvider {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("provider called more times than scripted")
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            purpose: Purpose::Moderation,
            model: "test-model".to_string(),
            system: "system".to_string(),
            messages: vec![],
            max_tokens: 16,
            temperature: None,
        }
    }

    fn no_backoff() -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::ZERO,
        }
    }

    fn transient() -> ProviderError {
        ProviderError::Transient {
            reason: "timeout".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let provider = SequenceProvider::new(vec![Ok("ответ".to_string())]);
        let reply = call_with_retry(&provider, &request(), no_backoff()).await;
        assert_eq!(reply.unwrap(), "ответ");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let provider = SequenceProvider::new(vec![Err(transient()), Ok("ответ".to_string())]);
        let reply = call_with_retry(&provider, &request(), no_backoff()).await;
        assert_eq!(reply.unwrap(), "ответ");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_second_transient_failure_is_final() {
        let provider = SequenceProvider::new(vec![Err(transient()), Err(transient())]);
        let reply = call_with_retry(&provider, &request(), no_backoff()).await;
        assert!(matches!(reply, Err(ProviderError::Transient { .. })));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_denied_is_not_retried() {
        let provider = SequenceProvider::new(vec![Err(ProviderError::Denied {
            status: 403,
            detail: "region blocked".to_string(),
        })]);
        let reply = call_with_retry(&provider, &request(), no_backoff()).await;
        assert!(matches!(reply, Err(ProviderError::Denied { .. })));
        assert_eq!(provider.call_count(), 1);
    }
}
