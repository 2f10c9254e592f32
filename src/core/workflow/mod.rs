// Core workflow module - per-user ad sessions and the workflow service
// that drives them.

pub mod session;
pub mod workflow_service;

pub use session::*;
pub use workflow_service::*;
