//! reFocus - a state-managed attention timer service
//!
//! Runs per-site countdowns for managed websites, pushes expiry
//! notifications to the page contexts showing them, and enforces a cooldown
//! before a new countdown may start. The background context (the daemon)
//! owns the authoritative countdown; page contexts submit lifecycle requests
//! and render the blocking experience; all coordination goes through the
//! persisted timer store.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod hostname;
pub mod notify;
pub mod page;
pub mod state;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use engine::CountdownEngine;
pub use error::{DeliveryError, RequestError, StorageError, TimerError};
pub use notify::{ExpiryNotifier, PageContexts, PageEvent, PageRegistry};
pub use page::{ModalState, PageController, SiteDefaults, TimerGateway};
pub use state::AppState;
pub use store::{JsonFileBackend, MemoryBackend, TimerStore};
pub use utils::signals::shutdown_signal;
