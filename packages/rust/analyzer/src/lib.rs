//! Build-log analysis: failure signature extraction and evidence selection.
//!
//! This crate provides:
//! - [`SignatureExtractor`]: ordered pattern matching over log lines
//! - [`ContextSelector`]: bounded evidence windows around a match
//! - [`normalize_message`]: the dedup key used by aggregation
//!
//! Everything here is pure and synchronous; no function retains log text
//! beyond the borrow it was given.

pub mod context;
pub mod extract;
pub mod normalize;
mod patterns;

pub use context::{ContextSelector, select_context};
pub use extract::{Candidate, Matches, SignatureExtractor, extract};
pub use normalize::{MESSAGE_KEY_MAX_CHARS, normalize_message};
pub use patterns::PatternClass;
