// =============================================================================
// TRANSPORT SELECTOR - Outbound path selection for geo-restricted upstreams
// =============================================================================
//
// The AI provider rejects calls from some regions, so outbound requests may
// have to leave through a proxy instead of the direct route. Transports are
// configured in priority order and each carries a health flag fed by call
// outcomes:
//
// - A permanent denial (authorization/geo block) degrades the transport
//   until an explicit `reset`, so later calls route around it.
// - Transient noise (timeouts, 5xx) leaves routing untouched; demoting on
//   it would make the route flap.
//
// When every transport is degraded the selector fails open: it hands out the
// preferred transport anyway and tells the caller, which is expected to use
// a shorter timeout for the attempt.
//
// Selection is lock-free. Callers borrow a handle, make the call on their
// own time, and report the outcome back.

use crate::core::ai::Purpose;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no transports configured")]
    Empty,

    #[error("failed to build transport '{name}': {source}")]
    Build {
        name: String,
        #[source]
        source: reqwest::Error,
    },
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub enum TransportKind {
    Direct,
    Proxy { url: String },
}

/// One candidate outbound path. Order in the config list is priority order.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub name: String,
    pub kind: TransportKind,
}

// ============================================================================
// HANDLES
// ============================================================================

/// A built outbound path with its health flag.
pub struct TransportHandle {
    name: String,
    client: Client,
    healthy: AtomicBool,
}

impl TransportHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

/// How a failed call should affect routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Transient,
    Permanent,
}

/// A borrowed transport. `fail_open` is set when every transport was
/// degraded and the call is a hopeful attempt; callers shorten their
/// timeout in that case.
pub struct Acquired {
    pub handle: Arc<TransportHandle>,
    pub fail_open: bool,
}

// ============================================================================
// SELECTOR
// ============================================================================

/// Priority-ordered transport set. Holds at least one handle.
pub struct TransportSelector {
    handles: Vec<Arc<TransportHandle>>,
}

impl TransportSelector {
    /// Builds the HTTP clients up front so a bad proxy URL fails at startup,
    /// not on the first moderation call.
    pub fn from_config(configs: &[TransportConfig]) -> Result<Self, TransportError> {
        if configs.is_empty() {
            return Err(TransportError::Empty);
        }

        let mut handles = Vec::with_capacity(configs.len());
        for config in configs {
            let builder = match &config.kind {
                TransportKind::Direct => Client::builder(),
                TransportKind::Proxy { url } => {
                    let proxy = reqwest::Proxy::all(url).map_err(|source| TransportError::Build {
                        name: config.name.clone(),
                        source,
                    })?;
                    Client::builder().proxy(proxy)
                }
            };
            let client = builder.build().map_err(|source| TransportError::Build {
                name: config.name.clone(),
                source,
            })?;
            handles.push(Arc::new(TransportHandle {
                name: config.name.clone(),
                client,
                healthy: AtomicBool::new(true),
            }));
        }

        Ok(Self { handles })
    }

    /// Returns the highest-priority healthy transport, or the
    /// highest-priority one with `fail_open` set when none are healthy.
    pub fn acquire(&self, purpose: Purpose) -> Acquired {
        if let Some(handle) = self.handles.iter().find(|h| h.is_healthy()) {
            return Acquired {
                handle: handle.clone(),
                fail_open: false,
            };
        }

        let handle = self.handles[0].clone();
        tracing::warn!(
            %purpose,
            transport = handle.name(),
            "all transports degraded, failing open on the preferred one"
        );
        Acquired {
            handle,
            fail_open: true,
        }
    }

    pub fn report_success(&self, handle: &TransportHandle) {
        tracing::debug!(transport = handle.name(), "remote call completed");
    }

    pub fn report_failure(&self, handle: &TransportHandle, class: FailureClass) {
        match class {
            FailureClass::Transient => {
                tracing::debug!(
                    transport = handle.name(),
                    "transient failure, transport keeps its slot"
                );
            }
            FailureClass::Permanent => {
                if handle.healthy.swap(false, Ordering::Relaxed) {
                    tracing::warn!(
                        transport = handle.name(),
                        "permanent denial, transport degraded until reset"
                    );
                }
            }
        }
    }

    /// Marks every transport healthy again. Tied to configuration reload,
    /// not to individual call outcomes.
    pub fn reset(&self) {
        for handle in &self.handles {
            handle.healthy.store(true, Ordering::Relaxed);
        }
        tracing::info!("transport health reset");
    }

    /// Name and health of every transport, in priority order.
    pub fn health(&self) -> Vec<(String, bool)> {
        self.handles
            .iter()
            .map(|h| (h.name.clone(), h.is_healthy()))
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> TransportSelector {
        TransportSelector::from_config(&[
            TransportConfig {
                name: "direct".to_string(),
                kind: TransportKind::Direct,
            },
            TransportConfig {
                name: "proxy-eu".to_string(),
                kind: TransportKind::Proxy {
                    url: "http://127.0.0.1:3128".to_string(),
                },
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_acquire_prefers_first_configured_transport() {
        let selector = selector();
        let acquired = selector.acquire(Purpose::Moderation);
        assert_eq!(acquired.handle.name(), "direct");
        assert!(!acquired.fail_open);
    }

    #[test]
    fn test_permanent_failure_routes_to_next_transport() {
        let selector = selector();
        let acquired = selector.acquire(Purpose::Moderation);
        selector.report_failure(&acquired.handle, FailureClass::Permanent);

        let next = selector.acquire(Purpose::Moderation);
        assert_eq!(next.handle.name(), "proxy-eu");
        assert!(!next.fail_open);
    }

    #[test]
    fn test_transient_failure_keeps_routing() {
        let selector = selector();
        let acquired = selector.acquire(Purpose::Moderation);
        selector.report_failure(&acquired.handle, FailureClass::Transient);
        selector.report_failure(&acquired.handle, FailureClass::Transient);

        let next = selector.acquire(Purpose::Moderation);
        assert_eq!(next.handle.name(), "direct");
    }

    #[test]
    fn test_all_degraded_fails_open_on_preferred() {
        let selector = selector();
        let first = selector.acquire(Purpose::Rewrite);
        selector.report_failure(&first.handle, FailureClass::Permanent);
        let second = selector.acquire(Purpose::Rewrite);
        selector.report_failure(&second.handle, FailureClass::Permanent);

        let acquired = selector.acquire(Purpose::Rewrite);
        assert_eq!(acquired.handle.name(), "direct");
        assert!(acquired.fail_open);
    }

    #[test]
    fn test_reset_restores_all_transports() {
        let selector = selector();
        let acquired = selector.acquire(Purpose::Moderation);
        selector.report_failure(&acquired.handle, FailureClass::Permanent);
        selector.reset();

        assert!(selector.health().iter().all(|(_, healthy)| *healthy));
        let acquired = selector.acquire(Purpose::Moderation);
        assert_eq!(acquired.handle.name(), "direct");
        assert!(!acquired.fail_open);
    }

    #[test]
    fn test_success_never_revives_a_degraded_transport() {
        let selector = selector();
        let direct = selector.acquire(Purpose::Moderation);
        selector.report_failure(&direct.handle, FailureClass::Permanent);

        // A later success on the proxy does not touch the degraded route.
        let proxy = selector.acquire(Purpose::Moderation);
        selector.report_success(&proxy.handle);
        assert_eq!(
            selector.health(),
            vec![("direct".to_string(), false), ("proxy-eu".to_string(), true)]
        );
    }

    #[test]
    fn test_empty_configuration_is_rejected() {
        assert!(matches!(
            TransportSelector::from_config(&[]),
            Err(TransportError::Empty)
        ));
    }
}
