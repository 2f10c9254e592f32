// Console layer - renders workflow updates and drives the line-based REPL.

#[path = "messenger.rs"]
pub mod messenger;

#[path = "repl.rs"]
pub mod repl;
