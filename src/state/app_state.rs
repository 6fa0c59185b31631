//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use chrono::{DateTime, Utc};

use crate::engine::CountdownEngine;
use crate::notify::PageRegistry;
use crate::page::SiteDefaults;
use crate::store::TimerStore;

/// Shared state behind the HTTP surface: the store, the engine, the
/// page-context registry, and server metadata.
pub struct AppState {
    /// Persisted source of truth for timers, cooldowns, and preferences
    pub store: TimerStore,
    /// The authoritative countdown state machine
    pub engine: Arc<CountdownEngine>,
    /// Directory of live page contexts
    pub registry: Arc<PageRegistry>,
    /// Fallback durations for sites without saved preferences
    pub defaults: SiteDefaults,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Mutex<Option<String>>,
    pub last_action_time: Mutex<Option<DateTime<Utc>>>,
}

impl AppState {
    pub fn new(
        store: TimerStore,
        engine: Arc<CountdownEngine>,
        registry: Arc<PageRegistry>,
        defaults: SiteDefaults,
        host: String,
        port: u16,
    ) -> Self {
        Self {
            store,
            engine,
            registry,
            defaults,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
        }
    }

    /// Record the most recent mutating action for the status endpoint.
    pub fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
