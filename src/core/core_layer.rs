// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "quota/quota_tracker.rs"]
pub mod quota;

#[path = "workflow/mod.rs"]
pub mod workflow;
