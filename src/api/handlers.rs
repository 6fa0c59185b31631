//! HTTP endpoint handlers
//!
//! The timer endpoints are the cross-context message contract
//! (START/STOP/PAUSE/RESUME); the sites and settings endpoints are the thin
//! management surface over the store. Precondition rejections come back as
//! `success: false`; storage failures are 500s.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::responses::{
    ActionResponse, CooldownStatusResponse, HealthResponse, SettingsResponse, SitesResponse,
    StatusResponse, TimerStatusResponse,
};
use crate::error::TimerError;
use crate::hostname;
use crate::state::AppState;
use crate::store::{now_ms, DurationSetting};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerRequest {
    pub duration_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddSiteRequest {
    pub hostname: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdateRequest {
    pub timer: Option<DurationSetting>,
    pub cooldown: Option<DurationSetting>,
}

fn storage_500(op: &str, e: &TimerError) -> StatusCode {
    error!("{} failed: {}", op, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Handle POST /timers/:hostname/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(request): Json<StartTimerRequest>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }
    if request.duration_ms <= 0 {
        return Ok(Json(ActionResponse::failed(TimerError::InvalidDuration)));
    }

    match state.engine.start(&key, request.duration_ms as u64).await {
        Ok(()) => {
            state.record_action("start");
            Ok(Json(ActionResponse::ok()))
        }
        Err(e @ TimerError::Storage(_)) => Err(storage_500("start", &e)),
        Err(e) => Ok(Json(ActionResponse::failed(e))),
    }
}

/// Handle POST /timers/:hostname/stop
pub async fn stop_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }

    match state.engine.stop(&key).await {
        Ok(()) => {
            state.record_action("stop");
            Ok(Json(ActionResponse::ok()))
        }
        Err(e @ TimerError::Storage(_)) => Err(storage_500("stop", &e)),
        Err(e) => Ok(Json(ActionResponse::failed(e))),
    }
}

/// Handle POST /timers/:hostname/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }

    match state.engine.pause(&key).await {
        Ok(()) => {
            state.record_action("pause");
            Ok(Json(ActionResponse::ok()))
        }
        Err(e @ TimerError::Storage(_)) => Err(storage_500("pause", &e)),
        Err(e) => Ok(Json(ActionResponse::failed(e))),
    }
}

/// Handle POST /timers/:hostname/resume
pub async fn resume_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }

    match state.engine.resume(&key).await {
        Ok(()) => {
            state.record_action("resume");
            Ok(Json(ActionResponse::ok()))
        }
        Err(e @ TimerError::Storage(_)) => Err(storage_500("resume", &e)),
        Err(e) => Ok(Json(ActionResponse::failed(e))),
    }
}

/// Handle GET /timers/:hostname - countdown snapshot with derived remaining
pub async fn timer_status_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<TimerStatusResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    match state.store.timer(&key).await {
        Ok(Some(record)) => Ok(Json(TimerStatusResponse {
            hostname: key,
            active: true,
            paused: record.is_paused,
            remaining_ms: record.remaining_at(now_ms()),
            total_ms: record.total_ms,
        })),
        Ok(None) => Ok(Json(TimerStatusResponse::absent(key))),
        Err(e) => {
            error!("timer lookup failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /sites
pub async fn list_sites_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SitesResponse>, StatusCode> {
    match state.store.sites_list().await {
        Ok(sites) => Ok(Json(SitesResponse { sites })),
        Err(e) => {
            error!("sites list lookup failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /sites - add a managed site
pub async fn add_site_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddSiteRequest>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&request.hostname);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }

    let mut sites = match state.store.sites_list().await {
        Ok(sites) => sites,
        Err(e) => {
            error!("sites list lookup failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    if sites.iter().any(|s| s == &key) {
        return Ok(Json(ActionResponse::failed("site already listed")));
    }
    sites.push(key.clone());

    match state.store.set_sites_list(&sites).await {
        Ok(()) => {
            info!("managed site added: {}", key);
            state.record_action("add-site");
            Ok(Json(ActionResponse::ok()))
        }
        Err(e) => {
            error!("sites list update failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle DELETE /sites/:hostname - remove a managed site along with its
/// countdown and cooldown
pub async fn remove_site_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }

    if let Err(e) = state.engine.stop(&key).await {
        warn!("stopping timer while removing {} failed: {}", key, e);
    }
    if let Err(e) = state.store.remove_cooldown(&key).await {
        warn!("clearing cooldown while removing {} failed: {}", key, e);
    }

    let sites = match state.store.sites_list().await {
        Ok(sites) => sites,
        Err(e) => {
            error!("sites list lookup failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let remaining: Vec<String> = sites.into_iter().filter(|s| s != &key).collect();

    match state.store.set_sites_list(&remaining).await {
        Ok(()) => {
            info!("managed site removed: {}", key);
            state.record_action("remove-site");
            Ok(Json(ActionResponse::ok()))
        }
        Err(e) => {
            error!("sites list update failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle GET /sites/:hostname/settings
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<SettingsResponse>, StatusCode> {
    let key = hostname::normalize(&raw);

    let timer = match state.store.timer_setting(&key).await {
        Ok(setting) => setting.unwrap_or(state.defaults.timer),
        Err(e) => {
            error!("timer setting lookup failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let cooldown = match state.store.cooldown_setting(&key).await {
        Ok(setting) => setting.unwrap_or(state.defaults.cooldown),
        Err(e) => {
            error!("cooldown setting lookup failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok(Json(SettingsResponse { timer, cooldown }))
}

/// Handle PUT /sites/:hostname/settings
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(request): Json<SettingsUpdateRequest>,
) -> Result<Json<ActionResponse>, StatusCode> {
    let key = hostname::normalize(&raw);
    if key.is_empty() {
        return Ok(Json(ActionResponse::failed("empty hostname")));
    }

    if let Some(timer) = request.timer {
        if let Err(e) = state.store.save_timer_setting(&key, timer).await {
            error!("saving timer setting failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
    if let Some(cooldown) = request.cooldown {
        if let Err(e) = state.store.save_cooldown_setting(&key, cooldown).await {
            error!("saving cooldown setting failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    state.record_action("save-settings");
    Ok(Json(ActionResponse::ok()))
}

/// Handle GET /status - full service overview
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let sites = match state.store.sites_list().await {
        Ok(sites) => sites,
        Err(e) => {
            error!("sites list lookup failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let now = now_ms();
    let timers = match state.store.persisted_timers().await {
        Ok(timers) => timers
            .into_iter()
            .map(|(hostname, record)| TimerStatusResponse {
                hostname,
                active: true,
                paused: record.is_paused,
                remaining_ms: record.remaining_at(now),
                total_ms: record.total_ms,
            })
            .collect(),
        Err(e) => {
            error!("timer enumeration failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let cooldowns = match state.store.persisted_cooldowns().await {
        Ok(cooldowns) => cooldowns
            .into_iter()
            .filter(|(_, record)| record.in_effect(now))
            .map(|(hostname, record)| CooldownStatusResponse {
                hostname,
                remaining_ms: record.end_time.saturating_sub(now).max(0) as u64,
                total_ms: record.total_ms,
            })
            .collect(),
        Err(e) => {
            error!("cooldown enumeration failed: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        sites,
        timers,
        cooldowns,
        page_contexts: state.registry.len().await,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
