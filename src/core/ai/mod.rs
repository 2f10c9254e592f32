pub mod models;
pub mod moderation_client;
pub mod remote;
pub mod rewrite_client;

pub use models::{ChatMessage, ChatRequest, ProviderError, Purpose};
pub use moderation_client::{ModerationClient, ModerationConfig, MODERATION_SYSTEM_PROMPT};
pub use remote::{call_with_retry, ChatProvider, RetryPolicy};
pub use rewrite_client::{RewriteClient, RewriteConfig, REWRITE_SYSTEM_PROMPT};
