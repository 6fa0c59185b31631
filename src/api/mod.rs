//! HTTP API module
//!
//! The cross-context message contract and the thin management surface,
//! served by the background context.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers/:hostname/start", post(start_timer_handler))
        .route("/timers/:hostname/stop", post(stop_timer_handler))
        .route("/timers/:hostname/pause", post(pause_timer_handler))
        .route("/timers/:hostname/resume", post(resume_timer_handler))
        .route("/timers/:hostname", get(timer_status_handler))
        .route("/sites", get(list_sites_handler).post(add_site_handler))
        .route("/sites/:hostname", delete(remove_site_handler))
        .route(
            "/sites/:hostname/settings",
            get(get_settings_handler).put(update_settings_handler),
        )
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
