// This is the infra layer - an IN-MEMORY implementation of AdStore.
//
// Confirmed ads land here so the workflow can run end to end without a
// database. A persistent store would implement the same trait; nothing in
// core knows the difference.

use crate::core::workflow::{AdStore, WorkflowError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// One published ad.
#[derive(Debug, Clone)]
pub struct StoredAd {
    pub text: String,
    pub confirmed_at: DateTime<Utc>,
}

pub struct MemoryAdStore {
    /// Maps user_id -> that user's published ads, oldest first.
    ads: DashMap<u64, Vec<StoredAd>>,
}

impl MemoryAdStore {
    pub fn new() -> Self {
        Self {
            ads: DashMap::new(),
        }
    }

    /// All confirmed ads for one user, oldest first.
    pub fn confirmed_for(&self, user_id: u64) -> Vec<StoredAd> {
        self.ads
            .get(&user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AdStore for MemoryAdStore {
    async fn persist_confirmed(&self, user_id: u64, final_text: &str) -> Result<(), WorkflowError> {
        self.ads
            .entry(user_id)
            .or_insert_with(Vec::new)
            .push(StoredAd {
                text: final_text.to_string(),
                confirmed_at: Utc::now(),
            });
        tracing::info!(user_id, "confirmed ad stored");
        Ok(())
    }
}

impl Default for MemoryAdStore {
    fn default() -> Self {
        Self::new()
    }
}
