//! Persisted record types and their time arithmetic
//!
//! Field names serialize in camelCase so the persisted layout matches the
//! flat key-value schema consumed by every context:
//!
//! - `<siteKey>` -> [`TimerRecord`]
//! - `cooldown_<siteKey>` -> [`CooldownRecord`]
//! - `refocus_sites_list` -> list of site keys
//! - `refocus_timer_settings` / `refocus_cooldown_settings` -> site key ->
//!   [`DurationSetting`]

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const SITES_LIST_KEY: &str = "refocus_sites_list";
pub const TIMER_SETTINGS_KEY: &str = "refocus_timer_settings";
pub const COOLDOWN_SETTINGS_KEY: &str = "refocus_cooldown_settings";
pub const COOLDOWN_PREFIX: &str = "cooldown_";

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// The per-site countdown record.
///
/// `remaining_ms` is authoritative only at the instant `last_update`; while
/// running, true remaining time at `t` is `remaining_ms - (t - last_update)`,
/// floored at zero. While paused it is exactly `remaining_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub is_active: bool,
    pub is_paused: bool,
    pub remaining_ms: u64,
    pub total_ms: u64,
    pub last_update: i64,
}

impl TimerRecord {
    /// A freshly started, running countdown.
    pub fn fresh(duration_ms: u64, now: i64) -> Self {
        Self {
            is_active: true,
            is_paused: false,
            remaining_ms: duration_ms,
            total_ms: duration_ms,
            last_update: now,
        }
    }

    /// True remaining time at wall-clock instant `now`.
    pub fn remaining_at(&self, now: i64) -> u64 {
        if !self.is_active {
            return 0;
        }
        if self.is_paused {
            return self.remaining_ms;
        }
        let elapsed = now.saturating_sub(self.last_update).max(0) as u64;
        self.remaining_ms.saturating_sub(elapsed)
    }

    /// Whether the countdown has reached zero as of `now`.
    pub fn expired_at(&self, now: i64) -> bool {
        self.is_active && self.remaining_at(now) == 0
    }

    /// Freeze the countdown, charging the time elapsed since `last_update`.
    /// Only meaningful when `is_active && !is_paused`; the engine checks that
    /// precondition before calling.
    pub fn paused_at(&self, now: i64) -> Self {
        Self {
            is_paused: true,
            remaining_ms: self.remaining_at(now),
            last_update: now,
            ..self.clone()
        }
    }

    /// Unfreeze the countdown. `remaining_ms` is unchanged; the accounting
    /// baseline restarts at `now`.
    pub fn resumed_at(&self, now: i64) -> Self {
        Self {
            is_paused: false,
            last_update: now,
            ..self.clone()
        }
    }

    /// Advance the accounting baseline to `now`, charging elapsed time.
    pub fn ticked_at(&self, now: i64) -> Self {
        Self {
            remaining_ms: self.remaining_at(now),
            last_update: now,
            ..self.clone()
        }
    }
}

/// The mandatory waiting period after expiry.
///
/// A site is in cooldown iff a record exists and `now < end_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownRecord {
    pub is_active: bool,
    pub end_time: i64,
    pub total_ms: u64,
}

impl CooldownRecord {
    /// A cooldown starting at `now` and lasting `total_ms`.
    pub fn starting(total_ms: u64, now: i64) -> Self {
        Self {
            is_active: true,
            end_time: now.saturating_add(total_ms as i64),
            total_ms,
        }
    }

    pub fn in_effect(&self, now: i64) -> bool {
        self.is_active && now < self.end_time
    }
}

/// A per-site duration preference (timer or cooldown). User preference, not
/// timer state; never conflated with the records above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationSetting {
    pub minutes: u64,
    pub seconds: u64,
}

impl DurationSetting {
    /// Fallback countdown duration when a site has no saved preference.
    pub const DEFAULT_TIMER: Self = Self { minutes: 5, seconds: 0 };
    /// Fallback cooldown duration when a site has no saved preference.
    pub const DEFAULT_COOLDOWN: Self = Self { minutes: 0, seconds: 20 };

    pub fn new(minutes: u64, seconds: u64) -> Self {
        Self { minutes, seconds }
    }

    pub fn total_ms(&self) -> u64 {
        (self.minutes * 60 + self.seconds) * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_running() {
        let r = TimerRecord::fresh(300_000, 1_000);
        assert!(r.is_active);
        assert!(!r.is_paused);
        assert_eq!(r.remaining_ms, 300_000);
        assert_eq!(r.total_ms, 300_000);
        assert_eq!(r.last_update, 1_000);
    }

    #[test]
    fn remaining_decreases_with_wall_clock_while_running() {
        let r = TimerRecord::fresh(300_000, 1_000);
        assert_eq!(r.remaining_at(1_000), 300_000);
        assert_eq!(r.remaining_at(11_000), 290_000);
        assert_eq!(r.remaining_at(301_000), 0);
        assert_eq!(r.remaining_at(999_999), 0);
    }

    #[test]
    fn remaining_is_frozen_while_paused() {
        let r = TimerRecord::fresh(300_000, 1_000).paused_at(11_000);
        assert_eq!(r.remaining_ms, 290_000);
        assert_eq!(r.remaining_at(500_000), 290_000);
    }

    #[test]
    fn pause_then_resume_conserves_remaining() {
        let r = TimerRecord::fresh(300_000, 0);
        let paused = r.paused_at(10_000);
        let resumed = paused.resumed_at(10_000);
        assert_eq!(resumed.remaining_at(10_000), 290_000);
        // the pre-pause elapsed time is charged exactly once
        assert_eq!(resumed.remaining_at(20_000), 280_000);
    }

    #[test]
    fn clock_going_backwards_charges_nothing() {
        let r = TimerRecord::fresh(300_000, 10_000);
        assert_eq!(r.remaining_at(5_000), 300_000);
    }

    #[test]
    fn inactive_record_reads_as_expired_nothing() {
        let mut r = TimerRecord::fresh(300_000, 0);
        r.is_active = false;
        assert_eq!(r.remaining_at(1), 0);
        assert!(!r.expired_at(1));
    }

    #[test]
    fn expiry_threshold() {
        let r = TimerRecord::fresh(500, 0);
        assert!(!r.expired_at(499));
        assert!(r.expired_at(500));
        assert!(r.expired_at(2_000));
    }

    #[test]
    fn persisted_layout_is_camel_case() {
        let r = TimerRecord::fresh(1_000, 42);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["isPaused"], false);
        assert_eq!(json["remainingMs"], 1_000);
        assert_eq!(json["totalMs"], 1_000);
        assert_eq!(json["lastUpdate"], 42);

        let c = CooldownRecord::starting(20_000, 5);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["endTime"], 20_005);
        assert_eq!(json["totalMs"], 20_000);
    }

    #[test]
    fn cooldown_in_effect_until_end_time() {
        let c = CooldownRecord::starting(20_000, 0);
        assert!(c.in_effect(0));
        assert!(c.in_effect(19_999));
        assert!(!c.in_effect(20_000));
        assert!(!c.in_effect(50_000));
    }

    #[test]
    fn duration_setting_totals() {
        assert_eq!(DurationSetting::new(5, 0).total_ms(), 300_000);
        assert_eq!(DurationSetting::new(0, 20).total_ms(), 20_000);
        assert_eq!(DurationSetting::new(0, 0).total_ms(), 0);
        assert_eq!(DurationSetting::new(1, 30).total_ms(), 90_000);
    }
}
