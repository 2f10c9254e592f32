// Core moderation module - lexicon, lexical filter and the two-tier pipeline.

pub mod filter;
pub mod lexicon;
pub mod pipeline;

pub use filter::*;
pub use lexicon::*;
pub use pipeline::*;
