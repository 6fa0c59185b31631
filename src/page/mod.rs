//! Page-context components
//!
//! The modal/cooldown controller that runs in each page context, and the
//! request gateway it uses to reach the background context.

pub mod controller;
pub mod gateway;

// Re-export main types
pub use controller::{ModalState, PageController, SiteDefaults};
pub use gateway::TimerGateway;
