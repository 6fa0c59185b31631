//! Countdown engine
//!
//! The background context's authoritative countdown state machine and its
//! per-key tick loops.

pub mod countdown;

// Re-export main types
pub use countdown::{CountdownEngine, DEFAULT_TICK};
