// Ad-text workflow - the per-user state machine over submission, rewrite
// and confirmation.
//
// Concurrency contract: one live session per user, busy states refuse new
// events, and every remote completion re-checks the session epoch before
// applying itself. A completion whose session was superseded or abandoned
// is dropped, never merged. Map guards are never held across an await.

use super::session::{AdTextSession, ConfirmChoice, Presentation, SessionState};
use crate::core::moderation::{Classifier, ModerationPipeline, Verdict};
use crate::core::quota::{QuotaError, QuotaTracker};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to persist confirmed ad: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("rewrite service unavailable")]
    Unavailable,
    #[error("rewrite produced no usable text")]
    Unusable,
}

// ============================================================================
// PORTS
// ============================================================================

/// Renders presentation updates to the user. Rendering problems are the
/// adapter's to log; the workflow never fails because of them.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn present(&self, user_id: u64, update: Presentation);
}

#[async_trait]
impl<M: MessagingPort + ?Sized> MessagingPort for Arc<M> {
    async fn present(&self, user_id: u64, update: Presentation) {
        (**self).present(user_id, update).await
    }
}

/// Persistence for confirmed ads. Nothing else in the workflow is stored.
#[async_trait]
pub trait AdStore: Send + Sync {
    async fn persist_confirmed(&self, user_id: u64, final_text: &str) -> Result<(), WorkflowError>;
}

#[async_trait]
impl<S: AdStore + ?Sized> AdStore for Arc<S> {
    async fn persist_confirmed(&self, user_id: u64, final_text: &str) -> Result<(), WorkflowError> {
        (**self).persist_confirmed(user_id, final_text).await
    }
}

/// AI text improvement. Failures are distinguishable from candidates so the
/// workflow can keep the original text.
#[async_trait]
pub trait Rewriter: Send + Sync {
    async fn improve(&self, text: &str) -> Result<String, RewriteError>;
}

#[async_trait]
impl<R: Rewriter + ?Sized> Rewriter for Arc<R> {
    async fn improve(&self, text: &str) -> Result<String, RewriteError> {
        (**self).improve(text).await
    }
}

// ============================================================================
// WORKFLOW
// ============================================================================

pub struct AdTextWorkflow<C, R, M, S>
where
    C: Classifier,
    R: Rewriter,
    M: MessagingPort,
    S: AdStore,
{
    pipeline: ModerationPipeline<C>,
    rewriter: R,
    quota: QuotaTracker,
    messaging: M,
    store: S,
    sessions: DashMap<u64, AdTextSession>,
    epochs: AtomicU64,
}

impl<C, R, M, S> AdTextWorkflow<C, R, M, S>
where
    C: Classifier,
    R: Rewriter,
    M: MessagingPort,
    S: AdStore,
{
    pub fn new(
        pipeline: ModerationPipeline<C>,
        rewriter: R,
        quota: QuotaTracker,
        messaging: M,
        store: S,
    ) -> Self {
        Self {
            pipeline,
            rewriter,
            quota,
            messaging,
            store,
            sessions: DashMap::new(),
            epochs: AtomicU64::new(1),
        }
    }

    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed)
    }

    /// A user submitted ad text. Opens a fresh session (superseding any idle
    /// one) and runs it through the moderation pipeline.
    pub async fn submit_text(&self, user_id: u64, text: String) {
        let epoch = self.next_epoch();
        let mut session = AdTextSession::open(user_id, text.clone(), epoch);
        session.state = SessionState::Evaluating;

        let accepted = match self.sessions.entry(user_id) {
            Entry::Occupied(mut slot) => {
                if slot.get().state.is_busy() {
                    false
                } else {
                    let prior = slot.get();
                    tracing::debug!(
                        user_id,
                        prior_state = ?prior.state,
                        prior_verdict = ?prior.verdict,
                        opened_at = %prior.opened_at,
                        "superseding previous session"
                    );
                    slot.insert(session);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        };
        if !accepted {
            self.messaging.present(user_id, Presentation::Busy).await;
            return;
        }

        let verdict = self.pipeline.evaluate(&text).await;
        self.finish_evaluation(user_id, epoch, verdict).await;
    }

    async fn finish_evaluation(&self, user_id: u64, epoch: u64, verdict: Verdict) {
        let update = {
            let Some(mut session) = self.sessions.get_mut(&user_id) else {
                tracing::debug!(user_id, "evaluation finished for a closed session, dropping");
                return;
            };
            if session.epoch != epoch || session.state != SessionState::Evaluating {
                tracing::debug!(user_id, "evaluation superseded, dropping verdict");
                return;
            }

            match verdict {
                Verdict::Rejected(rejection) => {
                    session.state = SessionState::Rejected;
                    let reason = rejection.user_label();
                    session.verdict = Some(Verdict::Rejected(rejection));
                    Presentation::Rejected { reason }
                }
                Verdict::Held => {
                    // Parked for manual review; the text leaves the user's
                    // hands and the session with it.
                    drop(session);
                    self.sessions.remove(&user_id);
                    Presentation::Held
                }
                Verdict::Approved { local_only } => {
                    session.state = SessionState::ReadyToConfirm;
                    session.verdict = Some(Verdict::Approved { local_only });
                    let can_rewrite = self.quota.check(user_id).is_ok();
                    Presentation::ReadyToConfirm {
                        text: session.original_text.clone(),
                        local_only,
                        can_rewrite,
                    }
                }
            }
        };
        self.messaging.present(user_id, update).await;
    }

    /// The user asked for an AI improvement of their approved text.
    pub async fn request_rewrite(&self, user_id: u64) {
        let gate = {
            match self.sessions.get_mut(&user_id) {
                None => Err(Presentation::NoActiveSession),
                Some(mut session) => {
                    if session.state.is_busy() {
                        Err(Presentation::Busy)
                    } else if session.state != SessionState::ReadyToConfirm {
                        Err(Presentation::NoActiveSession)
                    } else {
                        match self.quota.check(user_id) {
                            Err(QuotaError::Exceeded { used, limit }) => {
                                Err(Presentation::QuotaExceeded { used, limit })
                            }
                            Ok(()) => {
                                session.state = SessionState::RewriteInFlight;
                                Ok((session.epoch, session.original_text.clone()))
                            }
                        }
                    }
                }
            }
        };

        let (epoch, text) = match gate {
            Ok(go) => go,
            Err(update) => {
                self.messaging.present(user_id, update).await;
                return;
            }
        };

        let outcome = self.rewriter.improve(&text).await;
        self.finish_rewrite(user_id, epoch, outcome).await;
    }

    async fn finish_rewrite(&self, user_id: u64, epoch: u64, outcome: Result<String, RewriteError>) {
        let update = {
            let Some(mut session) = self.sessions.get_mut(&user_id) else {
                tracing::debug!(user_id, "rewrite finished for a closed session, dropping");
                return;
            };
            if session.epoch != epoch || session.state != SessionState::RewriteInFlight {
                tracing::debug!(user_id, "rewrite superseded, dropping candidate");
                return;
            }

            session.state = SessionState::ReadyToConfirm;
            match outcome {
                Ok(candidate) => {
                    // The one place quota is spent: a rewrite that actually
                    // produced a candidate for a still-live session.
                    self.quota.commit(session.user_id);
                    session.candidate = Some(candidate.clone());
                    Presentation::RewriteReady { candidate }
                }
                Err(err) => {
                    tracing::warn!(user_id, error = %err, "rewrite failed, keeping original text");
                    Presentation::RewriteFailed
                }
            }
        };
        self.messaging.present(user_id, update).await;
    }

    /// The user confirmed the ad for publication, picking either their
    /// original text or the AI candidate. A candidate goes through the
    /// moderation pipeline again before it may be persisted.
    pub async fn confirm(&self, user_id: u64, choice: ConfirmChoice) -> Result<(), WorkflowError> {
        let staged = {
            match self.sessions.get_mut(&user_id) {
                None => Err(Presentation::NoActiveSession),
                Some(mut session) => {
                    if session.state.is_busy() {
                        Err(Presentation::Busy)
                    } else if session.state != SessionState::ReadyToConfirm {
                        Err(Presentation::NoActiveSession)
                    } else {
                        match choice {
                            ConfirmChoice::Original => {
                                // Busy through the persist so a duplicate
                                // confirm or a rewrite cannot slip in.
                                session.state = SessionState::Evaluating;
                                Ok((session.epoch, session.original_text.clone(), false))
                            }
                            ConfirmChoice::Rewritten => match session.candidate.clone() {
                                None => Err(Presentation::NoCandidate),
                                Some(candidate) => {
                                    session.state = SessionState::Evaluating;
                                    Ok((session.epoch, candidate, true))
                                }
                            },
                        }
                    }
                }
            }
        };

        let (epoch, final_text, is_candidate) = match staged {
            Ok(staged) => staged,
            Err(update) => {
                self.messaging.present(user_id, update).await;
                return Ok(());
            }
        };

        if is_candidate && !self.recheck_candidate(user_id, epoch, &final_text).await {
            return Ok(());
        }

        match self.store.persist_confirmed(user_id, &final_text).await {
            Ok(()) => {
                let finalized = {
                    match self.sessions.get_mut(&user_id) {
                        Some(mut session) if session.epoch == epoch => {
                            // Terminal transition; the session is discarded,
                            // not kept around.
                            session.state = SessionState::Confirmed;
                            drop(session);
                            self.sessions.remove(&user_id);
                            true
                        }
                        _ => false,
                    }
                };
                if !finalized {
                    tracing::warn!(user_id, "session changed while persisting confirmed ad");
                }
                self.messaging
                    .present(user_id, Presentation::Confirmed { text: final_text })
                    .await;
                Ok(())
            }
            Err(err) => {
                // Leave the session confirmable so the user can retry.
                if let Some(mut session) = self.sessions.get_mut(&user_id) {
                    if session.epoch == epoch && session.state == SessionState::Evaluating {
                        session.state = SessionState::ReadyToConfirm;
                    }
                }
                tracing::error!(user_id, error = %err, "failed to persist confirmed ad");
                Err(err)
            }
        }
    }

    /// Run the pipeline over the AI candidate. `true` means the caller may
    /// proceed to persist; `false` means the outcome was already presented
    /// (or the session is gone).
    async fn recheck_candidate(&self, user_id: u64, epoch: u64, candidate: &str) -> bool {
        let verdict = self.pipeline.evaluate(candidate).await;
        let update = {
            let Some(mut session) = self.sessions.get_mut(&user_id) else {
                tracing::debug!(user_id, "candidate check finished for a closed session");
                return false;
            };
            if session.epoch != epoch || session.state != SessionState::Evaluating {
                tracing::debug!(user_id, "candidate check superseded, dropping verdict");
                return false;
            }

            match verdict {
                // Stays `Evaluating` until persisted so no other event can
                // slip in between approval and storage.
                Verdict::Approved { .. } => return true,
                Verdict::Rejected(rejection) => {
                    session.state = SessionState::ReadyToConfirm;
                    session.candidate = None;
                    Presentation::CandidateRejected {
                        reason: rejection.user_label(),
                    }
                }
                Verdict::Held => {
                    session.state = SessionState::ReadyToConfirm;
                    Presentation::Held
                }
            }
        };
        self.messaging.present(user_id, update).await;
        false
    }

    /// Explicit cancel from any live state, busy ones included. An in-flight
    /// remote call keeps running but its completion finds the session gone
    /// and is dropped without spending quota.
    pub async fn cancel(&self, user_id: u64) {
        let update = {
            match self.sessions.get_mut(&user_id) {
                None => Presentation::NoActiveSession,
                Some(mut session) => {
                    session.state = SessionState::Abandoned;
                    drop(session);
                    self.sessions.remove(&user_id);
                    tracing::info!(user_id, "session abandoned");
                    Presentation::Cancelled
                }
            }
        };
        self.messaging.present(user_id, update).await;
    }

    pub fn session_state(&self, user_id: u64) -> Option<SessionState> {
        self.sessions.get(&user_id).map(|s| s.state)
    }

    pub fn quota_usage(&self, user_id: u64) -> (u32, u32) {
        self.quota.usage(user_id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
