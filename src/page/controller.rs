//! Per-page modal and lifecycle controller
//!
//! One controller instance runs per page context. It reacts to expiry
//! notifications and to the page's own lifecycle transitions (load,
//! visibility change, teardown) by submitting timer requests through the
//! gateway, and drives the blocking modal:
//!
//! ```text
//! NoModal -> ModalCooldown -> ModalAwaitingInput -> NoModal
//! ```
//!
//! While the modal is in `ModalCooldown` it blocks the page underneath and
//! cannot be dismissed; a ~1s poll flips it to `ModalAwaitingInput` once the
//! cooldown's end time has passed. Request failures are recoverable: logged,
//! surfaced as a status line, never a crash of the page context.

use tracing::{debug, info, warn};

use super::gateway::TimerGateway;
use crate::error::{RequestError, StorageError, TimerError};
use crate::hostname;
use crate::notify::PageEvent;
use crate::store::{now_ms, CooldownRecord, DurationSetting, TimerStore};

/// Modal state of one page context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalState {
    /// Page fully interactive, no overlay.
    NoModal,
    /// Blocking overlay shown, cooldown running, dismissal disallowed.
    Cooldown,
    /// Cooldown over; duration-entry controls revealed, start enabled.
    AwaitingInput,
}

/// Fallback durations for sites without saved preferences.
#[derive(Debug, Clone, Copy)]
pub struct SiteDefaults {
    pub timer: DurationSetting,
    pub cooldown: DurationSetting,
}

impl Default for SiteDefaults {
    fn default() -> Self {
        Self {
            timer: DurationSetting::DEFAULT_TIMER,
            cooldown: DurationSetting::DEFAULT_COOLDOWN,
        }
    }
}

pub struct PageController<G: TimerGateway> {
    /// Canonical key of the page itself.
    page_key: String,
    /// Key the records live under: the matched managed-list entry when one
    /// exists, otherwise the page's own key. Registering `example.com`
    /// governs `news.example.com` pages under the `example.com` records.
    record_key: String,
    is_managed: bool,
    gateway: G,
    store: TimerStore,
    defaults: SiteDefaults,
    modal: ModalState,
    prefill: Option<DurationSetting>,
    display_ms: Option<u64>,
    status: Option<String>,
}

impl<G: TimerGateway> PageController<G> {
    pub fn new(raw_host: &str, gateway: G, store: TimerStore, defaults: SiteDefaults) -> Self {
        let page_key = hostname::normalize(raw_host);
        Self {
            record_key: page_key.clone(),
            page_key,
            is_managed: false,
            gateway,
            store,
            defaults,
            modal: ModalState::NoModal,
            prefill: None,
            display_ms: None,
            status: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn modal(&self) -> ModalState {
        self.modal
    }

    pub fn site_key(&self) -> &str {
        &self.record_key
    }

    pub fn is_managed(&self) -> bool {
        self.is_managed
    }

    /// Saved duration pre-filled into the entry controls while awaiting
    /// input.
    pub fn prefill(&self) -> Option<DurationSetting> {
        self.prefill
    }

    /// Remaining countdown time as of the last poll, for display.
    pub fn remaining_display(&self) -> Option<u64> {
        self.display_ms
    }

    /// Last recoverable failure surfaced to the user, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    // ── Page lifecycle ───────────────────────────────────────────────

    /// Page finished loading.
    pub async fn handle_load(&mut self) {
        if self.page_key.is_empty() {
            debug!("empty site key, page not governed");
            return;
        }
        if let Err(e) = self.load_inner().await {
            warn!("page load handling failed for {}: {}", self.page_key, e);
            self.status = Some("could not start timer".to_string());
        }
    }

    async fn load_inner(&mut self) -> Result<(), RequestError> {
        let sites = self.store.sites_list().await.map_err(TimerError::from)?;
        match sites.iter().find(|s| hostname::keys_match(s, &self.page_key)) {
            Some(site) => {
                self.record_key = site.clone();
                self.is_managed = true;
            }
            None => {
                self.record_key = self.page_key.clone();
                self.is_managed = false;
            }
        }

        let now = now_ms();

        // an active cooldown found at load blocks immediately
        if let Some(cooldown) = self.active_cooldown(now).await.map_err(TimerError::from)? {
            self.enter_modal_cooldown(Some(cooldown), now).await?;
            return Ok(());
        }

        if let Some(timer) = self.store.timer(&self.record_key).await.map_err(TimerError::from)? {
            if timer.expired_at(now) {
                // expired while no page was around to see it
                if let Err(e) = self.gateway.stop_timer(&self.record_key).await {
                    debug!("cleanup of expired timer for {} failed: {}", self.record_key, e);
                }
                self.enter_modal_cooldown(None, now).await?;
            }
            // a live countdown just keeps running
            return Ok(());
        }

        if self.is_managed {
            let duration = self.timer_preference().await.map_err(TimerError::from)?.total_ms();
            if duration > 0 {
                self.gateway.start_timer(&self.record_key, duration).await?;
                info!("automatic timer started for {} ({}ms)", self.record_key, duration);
            }
        }
        Ok(())
    }

    /// Page became hidden: the countdown tracks attention, not wall clock.
    pub async fn handle_hidden(&mut self) {
        if self.record_key.is_empty() {
            return;
        }
        match self.gateway.pause_timer(&self.record_key).await {
            Ok(()) => debug!("countdown paused for {} (page hidden)", self.record_key),
            Err(RequestError::Timer(TimerError::NotPausable)) => {}
            Err(e) => warn!("pause request failed for {}: {}", self.record_key, e),
        }
    }

    /// Page became visible again.
    pub async fn handle_visible(&mut self) {
        if self.record_key.is_empty() {
            return;
        }
        match self.gateway.resume_timer(&self.record_key).await {
            Ok(()) => debug!("countdown resumed for {} (page visible)", self.record_key),
            Err(RequestError::Timer(TimerError::NotResumable)) => {}
            Err(e) => warn!("resume request failed for {}: {}", self.record_key, e),
        }
    }

    /// Page is going away. Best-effort; a failure is abandoned because the
    /// page is closing anyway.
    pub async fn handle_unload(&mut self) {
        if self.record_key.is_empty() {
            return;
        }
        if let Err(e) = self.gateway.stop_timer(&self.record_key).await {
            debug!("stop on teardown failed for {}: {}", self.record_key, e);
        }
    }

    /// An event pushed from the background context.
    pub async fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::TimerExpired => {
                let now = now_ms();
                let existing = match self.active_cooldown(now).await {
                    Ok(existing) => existing,
                    Err(e) => {
                        warn!("cooldown lookup failed for {}: {}", self.record_key, e);
                        None
                    }
                };
                if let Err(e) = self.enter_modal_cooldown(existing, now).await {
                    warn!("modal entry failed for {}: {}", self.record_key, e);
                    self.status = Some("could not enforce cooldown".to_string());
                }
            }
        }
    }

    /// ~1s display/cooldown poll.
    pub async fn poll(&mut self) {
        let now = now_ms();

        if self.modal == ModalState::Cooldown {
            match self.active_cooldown(now).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let prefill = match self.timer_preference().await {
                        Ok(setting) => setting,
                        Err(e) => {
                            warn!("preference lookup failed for {}: {}", self.record_key, e);
                            self.defaults.timer
                        }
                    };
                    self.prefill = Some(prefill);
                    self.modal = ModalState::AwaitingInput;
                    info!("cooldown over for {}, awaiting a new duration", self.record_key);
                }
                Err(e) => warn!("cooldown poll failed for {}: {}", self.record_key, e),
            }
        }

        self.display_ms = match self.store.timer(&self.record_key).await {
            Ok(Some(record)) => Some(record.remaining_at(now)),
            Ok(None) => None,
            Err(e) => {
                debug!("display refresh failed for {}: {}", self.record_key, e);
                self.display_ms
            }
        };
    }

    /// Submit a new duration from the modal's entry controls.
    ///
    /// Persists the preferences, requests a fresh countdown, and dismisses
    /// the modal. Rejects a zero duration without touching any state.
    pub async fn submit(
        &mut self,
        timer: DurationSetting,
        cooldown: Option<DurationSetting>,
    ) -> Result<(), RequestError> {
        if self.modal != ModalState::AwaitingInput {
            warn!("duration submitted outside the input state for {}", self.record_key);
            return Ok(());
        }
        let duration = timer.total_ms();
        if duration == 0 {
            return Err(RequestError::Timer(TimerError::InvalidDuration));
        }

        self.store
            .save_timer_setting(&self.record_key, timer)
            .await
            .map_err(TimerError::from)?;
        if let Some(cooldown) = cooldown {
            self.store
                .save_cooldown_setting(&self.record_key, cooldown)
                .await
                .map_err(TimerError::from)?;
        }

        self.gateway.start_timer(&self.record_key, duration).await?;
        self.modal = ModalState::NoModal;
        self.prefill = None;
        self.status = None;
        info!("modal dismissed for {}, new countdown {}ms", self.record_key, duration);
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    /// The cooldown for this page's key, if still in effect. A record read
    /// past its end time is deleted on the spot.
    async fn active_cooldown(&self, now: i64) -> Result<Option<CooldownRecord>, StorageError> {
        match self.store.cooldown(&self.record_key).await? {
            Some(cooldown) if cooldown.in_effect(now) => Ok(Some(cooldown)),
            Some(_) => {
                self.store.remove_cooldown(&self.record_key).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Show the blocking modal, starting a cooldown unless one is already
    /// running.
    async fn enter_modal_cooldown(
        &mut self,
        existing: Option<CooldownRecord>,
        now: i64,
    ) -> Result<(), RequestError> {
        if existing.is_none() {
            let preference = self.cooldown_preference().await.map_err(TimerError::from)?;
            let record = CooldownRecord::starting(preference.total_ms(), now);
            self.store
                .set_cooldown(&self.record_key, &record)
                .await
                .map_err(TimerError::from)?;
        }
        self.modal = ModalState::Cooldown;
        self.prefill = None;
        self.display_ms = None;
        info!("blocking modal shown for {} (cooldown running)", self.record_key);
        Ok(())
    }

    async fn timer_preference(&self) -> Result<DurationSetting, StorageError> {
        Ok(self
            .store
            .timer_setting(&self.record_key)
            .await?
            .unwrap_or(self.defaults.timer))
    }

    async fn cooldown_preference(&self) -> Result<DurationSetting, StorageError> {
        Ok(self
            .store
            .cooldown_setting(&self.record_key)
            .await?
            .unwrap_or(self.defaults.cooldown))
    }
}
