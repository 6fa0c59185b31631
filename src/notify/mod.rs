//! Expiry notification
//!
//! The page-context directory and the best-effort expiry fan-out the
//! countdown engine triggers when a timer reaches zero.

pub mod expiry;
pub mod registry;

// Re-export main types
pub use expiry::ExpiryNotifier;
pub use registry::{
    ContextId, ListenerInstaller, PageContextInfo, PageContexts, PageEvent, PageRegistry,
};
