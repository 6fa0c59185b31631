//! Request gateway from page contexts to the background context
//!
//! Page contexts never mutate timer records directly; every lifecycle change
//! travels through this one-shot request/response contract. All operations
//! are asynchronous and may fail; callers treat failure as recoverable.

use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::CountdownEngine;
use crate::error::RequestError;

#[async_trait]
pub trait TimerGateway: Send + Sync {
    async fn start_timer(&self, key: &str, duration_ms: u64) -> Result<(), RequestError>;
    async fn stop_timer(&self, key: &str) -> Result<(), RequestError>;
    async fn pause_timer(&self, key: &str) -> Result<(), RequestError>;
    async fn resume_timer(&self, key: &str) -> Result<(), RequestError>;
}

/// In-process gateway: the page context holds a handle to the engine itself.
#[async_trait]
impl TimerGateway for Arc<CountdownEngine> {
    async fn start_timer(&self, key: &str, duration_ms: u64) -> Result<(), RequestError> {
        CountdownEngine::start(self, key, duration_ms)
            .await
            .map_err(RequestError::from)
    }

    async fn stop_timer(&self, key: &str) -> Result<(), RequestError> {
        self.stop(key).await.map_err(RequestError::from)
    }

    async fn pause_timer(&self, key: &str) -> Result<(), RequestError> {
        self.pause(key).await.map_err(RequestError::from)
    }

    async fn resume_timer(&self, key: &str) -> Result<(), RequestError> {
        self.resume(key).await.map_err(RequestError::from)
    }
}
