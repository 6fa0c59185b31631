//! Typed facade over the storage backend
//!
//! The single source of truth every context reads and writes through. It has
//! no timer logic of its own: get/set/remove per record family, plus a
//! one-way change-notification channel observers may subscribe to. The
//! notifications are for reactive re-rendering only, never part of the timer
//! correctness contract.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use super::backend::StorageBackend;
use super::records::{
    CooldownRecord, DurationSetting, TimerRecord, COOLDOWN_PREFIX, COOLDOWN_SETTINGS_KEY,
    SITES_LIST_KEY, TIMER_SETTINGS_KEY,
};
use crate::error::StorageError;

/// A single storage mutation, as observed on the notification channel.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

#[derive(Clone)]
pub struct TimerStore {
    backend: Arc<dyn StorageBackend>,
    change_tx: broadcast::Sender<StoreChange>,
}

impl TimerStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self { backend, change_tx }
    }

    /// Subscribe to storage change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }

    async fn read_value(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.backend.get(&[key]).await?.remove(key))
    }

    async fn write_value(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let old = self.read_value(key).await?;
        self.backend.set(key, value.clone()).await?;
        // observation channel only; no harm if nobody is listening
        let _ = self.change_tx.send(StoreChange {
            key: key.to_string(),
            old,
            new: Some(value),
        });
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<(), StorageError> {
        let old = self.read_value(key).await?;
        self.backend.remove(key).await?;
        if old.is_some() {
            let _ = self.change_tx.send(StoreChange {
                key: key.to_string(),
                old,
                new: None,
            });
        }
        Ok(())
    }

    async fn read_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.read_value(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StorageError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn write_record<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(record).map_err(|source| StorageError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.write_value(key, value).await
    }

    // ── Timer records ────────────────────────────────────────────────

    /// Read the timer record for a site key.
    ///
    /// A stored record with `isActive: false` is logically absent and reads
    /// back as `None`, so every reader treats the two identically.
    pub async fn timer(&self, key: &str) -> Result<Option<TimerRecord>, StorageError> {
        Ok(self
            .read_record::<TimerRecord>(key)
            .await?
            .filter(|r| r.is_active))
    }

    pub async fn set_timer(&self, key: &str, record: &TimerRecord) -> Result<(), StorageError> {
        self.write_record(key, record).await
    }

    pub async fn remove_timer(&self, key: &str) -> Result<(), StorageError> {
        self.remove_value(key).await
    }

    /// Bulk-read the timer records for `keys`. Absent and inactive records
    /// are omitted.
    pub async fn timers(&self, keys: &[String]) -> Result<HashMap<String, TimerRecord>, StorageError> {
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let raw = self.backend.get(&refs).await?;
        let mut out = HashMap::new();
        for (key, value) in raw {
            let record: TimerRecord =
                serde_json::from_value(value).map_err(|source| StorageError::Decode {
                    key: key.clone(),
                    source,
                })?;
            if record.is_active {
                out.insert(key, record);
            }
        }
        Ok(out)
    }

    /// Every persisted active timer record, keyed by site key. Reserved
    /// entries (sites list, settings maps, cooldowns) are skipped.
    pub async fn persisted_timers(&self) -> Result<Vec<(String, TimerRecord)>, StorageError> {
        let all = self.backend.all().await?;
        let mut out = Vec::new();
        for (key, value) in all {
            if key == SITES_LIST_KEY
                || key == TIMER_SETTINGS_KEY
                || key == COOLDOWN_SETTINGS_KEY
                || key.starts_with(COOLDOWN_PREFIX)
            {
                continue;
            }
            match serde_json::from_value::<TimerRecord>(value) {
                Ok(record) if record.is_active => out.push((key, record)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping undecodable timer record for '{}': {}", key, e);
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    // ── Cooldown records ─────────────────────────────────────────────

    fn cooldown_key(key: &str) -> String {
        format!("{COOLDOWN_PREFIX}{key}")
    }

    pub async fn cooldown(&self, key: &str) -> Result<Option<CooldownRecord>, StorageError> {
        Ok(self
            .read_record::<CooldownRecord>(&Self::cooldown_key(key))
            .await?
            .filter(|c| c.is_active))
    }

    pub async fn set_cooldown(&self, key: &str, record: &CooldownRecord) -> Result<(), StorageError> {
        self.write_record(&Self::cooldown_key(key), record).await
    }

    pub async fn remove_cooldown(&self, key: &str) -> Result<(), StorageError> {
        self.remove_value(&Self::cooldown_key(key)).await
    }

    /// Every persisted active cooldown record, keyed by site key (prefix
    /// stripped).
    pub async fn persisted_cooldowns(&self) -> Result<Vec<(String, CooldownRecord)>, StorageError> {
        let all = self.backend.all().await?;
        let mut out = Vec::new();
        for (key, value) in all {
            let Some(site_key) = key.strip_prefix(COOLDOWN_PREFIX) else {
                continue;
            };
            match serde_json::from_value::<CooldownRecord>(value) {
                Ok(record) if record.is_active => out.push((site_key.to_string(), record)),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping undecodable cooldown record for '{}': {}", key, e);
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    // ── Managed sites list ───────────────────────────────────────────

    pub async fn sites_list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .read_record::<Vec<String>>(SITES_LIST_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_sites_list(&self, sites: &[String]) -> Result<(), StorageError> {
        self.write_record(SITES_LIST_KEY, &sites).await
    }

    // ── Duration preferences ─────────────────────────────────────────

    async fn settings_map(
        &self,
        map_key: &str,
    ) -> Result<HashMap<String, DurationSetting>, StorageError> {
        Ok(self
            .read_record::<HashMap<String, DurationSetting>>(map_key)
            .await?
            .unwrap_or_default())
    }

    pub async fn timer_setting(&self, key: &str) -> Result<Option<DurationSetting>, StorageError> {
        Ok(self.settings_map(TIMER_SETTINGS_KEY).await?.remove(key))
    }

    pub async fn save_timer_setting(
        &self,
        key: &str,
        setting: DurationSetting,
    ) -> Result<(), StorageError> {
        let mut settings = self.settings_map(TIMER_SETTINGS_KEY).await?;
        settings.insert(key.to_string(), setting);
        self.write_record(TIMER_SETTINGS_KEY, &settings).await
    }

    pub async fn cooldown_setting(&self, key: &str) -> Result<Option<DurationSetting>, StorageError> {
        Ok(self.settings_map(COOLDOWN_SETTINGS_KEY).await?.remove(key))
    }

    pub async fn save_cooldown_setting(
        &self,
        key: &str,
        setting: DurationSetting,
    ) -> Result<(), StorageError> {
        let mut settings = self.settings_map(COOLDOWN_SETTINGS_KEY).await?;
        settings.insert(key.to_string(), setting);
        self.write_record(COOLDOWN_SETTINGS_KEY, &settings).await
    }
}
