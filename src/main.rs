//! reFocus - a state-managed attention timer service
//!
//! This is the main entry point for the refocus daemon: the background
//! context hosting the countdown engine, the expiry notifier, and the HTTP
//! surface.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use refocus::{
    api::create_router,
    config::Config,
    engine::CountdownEngine,
    notify::{ExpiryNotifier, PageRegistry},
    state::AppState,
    store::{JsonFileBackend, TimerStore},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("refocus={},tower_http=info", config.log_level()))
        .init();

    info!("Starting refocus server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_file={}, tick={}ms",
        config.host,
        config.port,
        config.data_file.display(),
        config.tick_ms
    );

    // Open the persisted timer store
    let backend = JsonFileBackend::open(&config.data_file).await?;
    let store = TimerStore::new(Arc::new(backend));

    // Wire the background context: page directory, notifier, engine
    let registry = Arc::new(PageRegistry::new());
    let notifier = ExpiryNotifier::new(registry.clone());
    let engine = Arc::new(CountdownEngine::new(
        store.clone(),
        notifier,
        config.tick_interval(),
    ));

    // Re-establish tick loops for countdowns that survived a restart
    match engine.rearm_persisted().await {
        Ok(0) => {}
        Ok(count) => info!("re-armed {} persisted countdown(s)", count),
        Err(e) => warn!("could not re-arm persisted countdowns: {}", e),
    }

    // Create application state
    let state = Arc::new(AppState::new(
        store,
        engine,
        registry,
        config.site_defaults(),
        config.host.clone(),
        config.port,
    ));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers/:hostname/start  - Start (or reset) a countdown");
    info!("  POST   /timers/:hostname/stop   - Stop a countdown");
    info!("  POST   /timers/:hostname/pause  - Pause a countdown");
    info!("  POST   /timers/:hostname/resume - Resume a countdown");
    info!("  GET    /timers/:hostname        - Countdown snapshot");
    info!("  GET    /sites                   - List managed sites");
    info!("  POST   /sites                   - Add a managed site");
    info!("  DELETE /sites/:hostname         - Remove a managed site");
    info!("  GET    /sites/:hostname/settings - Site duration preferences");
    info!("  PUT    /sites/:hostname/settings - Update duration preferences");
    info!("  GET    /status                  - Check current status");
    info!("  GET    /health                  - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
