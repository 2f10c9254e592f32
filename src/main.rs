// This is the entry point of the ad review bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (surface-agnostic): moderation, quota, workflow
// - `infra/` = Implementations of core ports (HTTP provider, transports, storage)
// - `console/` = Console-specific adapters (rendering, REPL)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Hand the wired workflow to the console loop

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "console/console_layer.rs"]
mod console;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::AppConfig;
use crate::console::messenger::ConsoleMessenger;
use crate::core::ai::{
    ModerationClient, ModerationConfig, RetryPolicy, RewriteClient, RewriteConfig,
};
use crate::core::moderation::{LexicalFilter, Lexicon, ModerationPipeline, PipelineConfig};
use crate::core::quota::{QuotaConfig, QuotaTracker};
use crate::core::workflow::AdTextWorkflow;
use crate::infra::ai::{AnthropicClient, AnthropicConfig};
use crate::infra::storage::MemoryAdStore;
use crate::infra::transport::{TransportConfig, TransportKind, TransportSelector};

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().expect(
        "Invalid configuration! Set CLAUDE_API_KEY and UNCERTAIN_POLICY (allow|review), \
         see src/config.rs for the full list.",
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    use std::sync::Arc;

    // Lexical filter, from a term file when configured, built-in list otherwise
    let lexicon = match &config.terms_file {
        Some(path) => Lexicon::from_file(path).expect("Failed to load the banned-terms file"),
        None => Lexicon::builtin(),
    };
    tracing::info!(terms = lexicon.len(), "lexicon loaded");
    let filter = LexicalFilter::new(lexicon).expect("Failed to compile contact patterns");

    // Outbound transports in priority order: direct first, proxy as fallback
    let mut transport_configs = vec![TransportConfig {
        name: "direct".to_string(),
        kind: TransportKind::Direct,
    }];
    if let Some(url) = &config.proxy_url {
        transport_configs.push(TransportConfig {
            name: "proxy".to_string(),
            kind: TransportKind::Proxy { url: url.clone() },
        });
    }
    let transports = Arc::new(
        TransportSelector::from_config(&transport_configs)
            .expect("Failed to build outbound transports"),
    );

    // One HTTP-backed provider shared by the moderation and rewrite clients
    let mut provider_config = AnthropicConfig::new(config.api_key.clone());
    provider_config.endpoint = config.endpoint.clone();
    provider_config.request_timeout = config.request_timeout;
    provider_config.fallback_timeout = config.fallback_timeout;
    let provider = Arc::new(AnthropicClient::new(provider_config, transports.clone()));

    let retry = RetryPolicy {
        backoff: config.retry_backoff,
    };

    let classifier = ModerationClient::new(
        provider.clone(),
        ModerationConfig {
            model: config.model.clone(),
            confidence_threshold: config.confidence_threshold,
            ..ModerationConfig::default()
        },
        retry,
    );

    let rewriter = RewriteClient::new(
        provider.clone(),
        RewriteConfig {
            model: config.model.clone(),
            ..RewriteConfig::default()
        },
        retry,
    );

    // Two-tier pipeline: lexical filter first, remote classifier second
    let pipeline = ModerationPipeline::new(
        filter,
        classifier,
        PipelineConfig {
            remote_enabled: config.moderation_enabled,
            uncertain_policy: config.uncertain_policy,
        },
    );

    let quota = QuotaTracker::new(QuotaConfig {
        daily_limit: config.daily_limit,
        timezone: config.quota_timezone,
    });

    let store = Arc::new(MemoryAdStore::new());
    let messenger = Arc::new(ConsoleMessenger);

    let workflow = Arc::new(AdTextWorkflow::new(
        pipeline,
        rewriter,
        quota,
        messenger,
        store.clone(),
    ));

    // ========================================================================
    // CONSOLE LOOP
    // ========================================================================

    tracing::info!(
        model = %config.model,
        remote_enabled = config.moderation_enabled,
        policy = ?config.uncertain_policy,
        daily_limit = config.daily_limit,
        "ad review bot ready"
    );

    if let Err(e) = console::repl::run(workflow, transports, store).await {
        tracing::error!("Console loop failed: {}", e);
    }
}
