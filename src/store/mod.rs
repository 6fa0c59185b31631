//! Persisted timer state
//!
//! Record types, storage backends, and the typed store facade shared by all
//! contexts.

pub mod backend;
pub mod records;
pub mod timer_store;

// Re-export main types
pub use backend::{JsonFileBackend, MemoryBackend, StorageBackend};
pub use records::{now_ms, CooldownRecord, DurationSetting, TimerRecord};
pub use timer_store::{StoreChange, TimerStore};
