//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::DurationSetting;

/// Outcome envelope for lifecycle and mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of one site's countdown, remaining time already derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStatusResponse {
    pub hostname: String,
    pub active: bool,
    pub paused: bool,
    pub remaining_ms: u64,
    pub total_ms: u64,
}

impl TimerStatusResponse {
    pub fn absent(hostname: String) -> Self {
        Self {
            hostname,
            active: false,
            paused: false,
            remaining_ms: 0,
            total_ms: 0,
        }
    }
}

/// Snapshot of one site's cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownStatusResponse {
    pub hostname: String,
    pub remaining_ms: u64,
    pub total_ms: u64,
}

/// The managed sites list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitesResponse {
    pub sites: Vec<String>,
}

/// A site's duration preferences, defaults filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub timer: DurationSetting,
    pub cooldown: DurationSetting,
}

/// Full service status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub sites: Vec<String>,
    pub timers: Vec<TimerStatusResponse>,
    pub cooldowns: Vec<CooldownStatusResponse>,
    pub page_contexts: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
