// Session model for the ad-text workflow.
//
// One user has at most one live session. The session is plain data; all
// transition rules live in the workflow service.

use crate::core::moderation::Verdict;
use chrono::{DateTime, Utc};

// ============================================================================
// STATES
// ============================================================================

/// Where one user's submission currently stands.
///
/// `AwaitingText` exists only between opening a session and feeding it the
/// submitted text; `Evaluating` and `RewriteInFlight` cover the remote
/// suspension points. `Confirmed` and `Abandoned` are terminal: the workflow
/// discards the session the moment either is reached, so neither state is
/// ever observable in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingText,
    Evaluating,
    Rejected,
    ReadyToConfirm,
    RewriteInFlight,
    Confirmed,
    Abandoned,
}

impl SessionState {
    /// Busy states have a remote or storage call in flight and refuse new
    /// user events instead of starting a second concurrent call.
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Evaluating | SessionState::RewriteInFlight)
    }
}

/// Which text the user confirms for publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Original,
    Rewritten,
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone)]
pub struct AdTextSession {
    pub user_id: u64,
    pub state: SessionState,
    pub original_text: String,
    pub verdict: Option<Verdict>,
    /// AI candidate offered to the user; never auto-replaces the original.
    pub candidate: Option<String>,
    /// Serial of the event that owns this session. Completions arriving with
    /// a stale epoch are dropped instead of applied.
    pub epoch: u64,
    pub opened_at: DateTime<Utc>,
}

impl AdTextSession {
    pub fn open(user_id: u64, text: String, epoch: u64) -> Self {
        Self {
            user_id,
            state: SessionState::AwaitingText,
            original_text: text,
            verdict: None,
            candidate: None,
            epoch,
            opened_at: Utc::now(),
        }
    }
}

// ============================================================================
// PRESENTATIONS
// ============================================================================

/// What the workflow asks the messaging side to render after an event.
/// The messaging adapter owns the wording; these carry only the facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    Rejected { reason: String },
    Held,
    ReadyToConfirm { text: String, local_only: bool, can_rewrite: bool },
    Busy,
    QuotaExceeded { used: u32, limit: u32 },
    RewriteReady { candidate: String },
    RewriteFailed,
    CandidateRejected { reason: String },
    Confirmed { text: String },
    Cancelled,
    NoActiveSession,
    NoCandidate,
}
