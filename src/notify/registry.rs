//! Page-context directory
//!
//! The background context's view of the live page contexts. The
//! [`PageContexts`] trait is the platform capability surface the core
//! consumes: enumerate contexts with their current URL, deliver an event to
//! one (which may fail), and (re)install the listener into one.
//! [`PageRegistry`] is the in-process implementation used by the daemon and
//! the test suites.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::DeliveryError;

pub type ContextId = u64;

/// An event pushed from the background context to a page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    TimerExpired,
}

/// A live page context as seen by the enumerator.
#[derive(Debug, Clone)]
pub struct PageContextInfo {
    pub id: ContextId,
    pub url: String,
}

/// Directory of live page contexts.
#[async_trait]
pub trait PageContexts: Send + Sync {
    async fn enumerate(&self) -> Vec<PageContextInfo>;

    /// Deliver `event` to the context. Fails when the context is gone, has
    /// no listener installed, or its listener has closed.
    async fn deliver(&self, id: ContextId, event: PageEvent) -> Result<(), DeliveryError>;

    /// (Re)install the listener into the context, the recovery path for a
    /// page whose listener is not registered yet.
    async fn install_listener(&self, id: ContextId) -> Result<(), DeliveryError>;
}

/// Creates a fresh listener channel for a context, standing in for injecting
/// listener code into a page.
pub trait ListenerInstaller: Send + Sync {
    fn install(&self) -> mpsc::UnboundedSender<PageEvent>;
}

impl<F> ListenerInstaller for F
where
    F: Fn() -> mpsc::UnboundedSender<PageEvent> + Send + Sync,
{
    fn install(&self) -> mpsc::UnboundedSender<PageEvent> {
        self()
    }
}

struct PageEntry {
    url: String,
    listener: Option<mpsc::UnboundedSender<PageEvent>>,
    installer: Option<Arc<dyn ListenerInstaller>>,
}

/// In-process page-context directory.
#[derive(Default)]
pub struct PageRegistry {
    entries: Mutex<HashMap<ContextId, PageEntry>>,
    next_id: AtomicU64,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page context that exists but has no listener yet (a page
    /// that is still loading).
    pub async fn register(&self, url: &str) -> ContextId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().await.insert(
            id,
            PageEntry {
                url: url.to_string(),
                listener: None,
                installer: None,
            },
        );
        id
    }

    /// Install the page's event listener, as a loaded page does on its own.
    pub async fn attach_listener(&self, id: ContextId, listener: mpsc::UnboundedSender<PageEvent>) {
        if let Some(entry) = self.entries.lock().await.get_mut(&id) {
            entry.listener = Some(listener);
        }
    }

    /// Provide the installer used for listener recovery on this context.
    pub async fn set_installer(&self, id: ContextId, installer: Arc<dyn ListenerInstaller>) {
        if let Some(entry) = self.entries.lock().await.get_mut(&id) {
            entry.installer = Some(installer);
        }
    }

    /// Record a navigation: the URL changes and the old listener is gone
    /// until the new page installs one.
    pub async fn navigate(&self, id: ContextId, url: &str) {
        if let Some(entry) = self.entries.lock().await.get_mut(&id) {
            entry.url = url.to_string();
            entry.listener = None;
        }
    }

    /// Drop a closed page context.
    pub async fn deregister(&self, id: ContextId) {
        self.entries.lock().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl PageContexts for PageRegistry {
    async fn enumerate(&self) -> Vec<PageContextInfo> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(id, entry)| PageContextInfo {
                id: *id,
                url: entry.url.clone(),
            })
            .collect()
    }

    async fn deliver(&self, id: ContextId, event: PageEvent) -> Result<(), DeliveryError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id).ok_or(DeliveryError::ContextGone)?;
        let listener = entry.listener.as_ref().ok_or(DeliveryError::NoListener)?;
        if listener.send(event).is_err() {
            entry.listener = None;
            return Err(DeliveryError::ListenerClosed);
        }
        Ok(())
    }

    async fn install_listener(&self, id: ContextId) -> Result<(), DeliveryError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id).ok_or(DeliveryError::ContextGone)?;
        let installer = entry.installer.clone().ok_or(DeliveryError::InstallFailed)?;
        entry.listener = Some(installer.install());
        Ok(())
    }
}
