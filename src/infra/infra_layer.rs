// The infra module contains implementations of core ports.
// Each adapter goes in its own submodule.

#[path = "transport/selector.rs"]
pub mod transport;

#[path = "ai/anthropic_client.rs"]
pub mod ai;

#[path = "storage/memory_ad_store.rs"]
pub mod storage;
