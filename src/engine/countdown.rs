//! Countdown engine
//!
//! The authoritative per-site countdown state machine. States per site key:
//! `Absent -> Active(running) <-> Active(paused) -> Absent` (via stop or
//! expiry); nothing else. The engine is the only writer of
//! `remainingMs`/`lastUpdate` during normal ticking; every other context
//! submits whole-lifecycle requests through [`start`](CountdownEngine::start)
//! / [`stop`](CountdownEngine::stop) / [`pause`](CountdownEngine::pause) /
//! [`resume`](CountdownEngine::resume).
//!
//! Ticking is interval-based rather than a one-shot deadline alarm: pause and
//! resume need elapsed real time tracked against a mutable baseline, which a
//! fixed wall-clock deadline cannot express without cancel-and-recompute.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::TimerError;
use crate::notify::ExpiryNotifier;
use crate::store::{now_ms, TimerRecord, TimerStore};

/// Default tick cadence. Granularity below one second is not a goal.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// A running tick task. The generation stamp lets a task that terminates on
/// its own remove exactly its own registry entry, never a successor's.
struct TickHandle {
    generation: u64,
    task: JoinHandle<()>,
}

enum TickFlow {
    Continue,
    Finished,
}

pub struct CountdownEngine {
    store: TimerStore,
    notifier: ExpiryNotifier,
    tick_interval: Duration,
    ticks: Mutex<HashMap<String, TickHandle>>,
    generations: AtomicU64,
}

impl CountdownEngine {
    pub fn new(store: TimerStore, notifier: ExpiryNotifier, tick_interval: Duration) -> Self {
        Self {
            store,
            notifier,
            tick_interval,
            ticks: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &TimerStore {
        &self.store
    }

    /// Number of live tick loops.
    pub async fn active_tick_count(&self) -> usize {
        self.ticks.lock().await.len()
    }

    /// Start a countdown for `key`, unconditionally replacing any prior
    /// record and tick loop. Starting an already-active timer resets it;
    /// callers that do not want restart semantics must check for an active
    /// record first.
    pub async fn start(self: &Arc<Self>, key: &str, duration_ms: u64) -> Result<(), TimerError> {
        if duration_ms == 0 {
            return Err(TimerError::InvalidDuration);
        }
        let record = TimerRecord::fresh(duration_ms, now_ms());
        self.store.set_timer(key, &record).await?;
        self.arm(key).await;
        info!("started timer for {}: {}ms", key, duration_ms);
        Ok(())
    }

    /// Cancel the tick loop and delete the record. No-op when absent.
    pub async fn stop(&self, key: &str) -> Result<(), TimerError> {
        // disarm before removal so an aborted in-flight tick cannot outlive
        // the record
        self.disarm(key).await;
        self.store.remove_timer(key).await?;
        info!("stopped timer for {}", key);
        Ok(())
    }

    /// Freeze a running countdown, charging the time elapsed since its last
    /// update. Rejected with `NotPausable` unless the record is active and
    /// running.
    pub async fn pause(&self, key: &str) -> Result<(), TimerError> {
        match self.store.timer(key).await? {
            Some(record) if !record.is_paused => {
                let paused = record.paused_at(now_ms());
                self.store.set_timer(key, &paused).await?;
                info!("paused timer for {}: {}ms remaining", key, paused.remaining_ms);
                Ok(())
            }
            _ => Err(TimerError::NotPausable),
        }
    }

    /// Unfreeze a paused countdown. `remainingMs` is untouched; the
    /// accounting baseline restarts now. Rejected with `NotResumable` unless
    /// the record is active and paused.
    pub async fn resume(&self, key: &str) -> Result<(), TimerError> {
        match self.store.timer(key).await? {
            Some(record) if record.is_paused => {
                let resumed = record.resumed_at(now_ms());
                self.store.set_timer(key, &resumed).await?;
                info!("resumed timer for {}: {}ms remaining", key, resumed.remaining_ms);
                Ok(())
            }
            _ => Err(TimerError::NotResumable),
        }
    }

    /// Re-arm tick loops for countdowns that survived a process restart.
    ///
    /// Running records get a fresh `lastUpdate` so the time the process was
    /// down is not charged against the budget; paused records re-arm frozen,
    /// untouched. Returns the number of re-armed countdowns.
    pub async fn rearm_persisted(self: &Arc<Self>) -> Result<usize, TimerError> {
        let persisted = self.store.persisted_timers().await?;
        let now = now_ms();
        let mut rearmed = 0;
        for (key, record) in persisted {
            if !record.is_paused {
                let refreshed = TimerRecord {
                    last_update: now,
                    ..record
                };
                self.store.set_timer(&key, &refreshed).await?;
            }
            self.arm(&key).await;
            rearmed += 1;
        }
        Ok(rearmed)
    }

    /// Spawn the tick loop for `key`, cancelling any predecessor.
    async fn arm(self: &Arc<Self>, key: &str) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let engine = Arc::clone(self);
        let task_key = key.to_string();
        let task = tokio::spawn(async move {
            engine.run_ticks(task_key, generation).await;
        });

        let mut ticks = self.ticks.lock().await;
        if let Some(previous) = ticks.insert(key.to_string(), TickHandle { generation, task }) {
            previous.task.abort();
            debug!("replaced tick loop for {}", key);
        }
    }

    async fn disarm(&self, key: &str) {
        let mut ticks = self.ticks.lock().await;
        if let Some(handle) = ticks.remove(key) {
            handle.task.abort();
            debug!("cancelled tick loop for {}", key);
        }
    }

    async fn run_ticks(self: Arc<Self>, key: String, generation: u64) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first interval tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            match self.tick_once(&key).await {
                TickFlow::Continue => {}
                TickFlow::Finished => break,
            }
        }

        self.release(&key, generation).await;
    }

    /// One tick cycle. A storage failure never terminates the loop; the next
    /// cycle retries naturally.
    async fn tick_once(&self, key: &str) -> TickFlow {
        let record = match self.store.timer(key).await {
            Ok(record) => record,
            Err(e) => {
                warn!("tick for {}: storage read failed, retrying next cycle: {}", key, e);
                return TickFlow::Continue;
            }
        };

        // record deleted or deactivated externally: the loop heals itself
        let Some(record) = record else {
            debug!("tick for {}: record gone, countdown cancelled", key);
            return TickFlow::Finished;
        };

        if record.is_paused {
            return TickFlow::Continue;
        }

        let next = record.ticked_at(now_ms());
        if next.remaining_ms == 0 {
            info!("timer expired for {}", key);
            self.notifier.notify(key).await;
            if let Err(e) = self.store.remove_timer(key).await {
                warn!("failed to clear expired timer for {}: {}", key, e);
            }
            return TickFlow::Finished;
        }

        if let Err(e) = self.store.set_timer(key, &next).await {
            // remaining time stays accounted from the old baseline; the next
            // cycle charges the full elapsed span
            warn!("tick for {}: persist failed, retrying next cycle: {}", key, e);
        }
        TickFlow::Continue
    }

    /// Remove this task's own registry entry, unless a newer generation has
    /// already taken the key.
    async fn release(&self, key: &str, generation: u64) {
        let mut ticks = self.ticks.lock().await;
        if ticks.get(key).is_some_and(|h| h.generation == generation) {
            ticks.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;
    use tokio::time::sleep;

    use super::*;
    use crate::notify::{PageEvent, PageRegistry};
    use crate::store::MemoryBackend;

    const TICK: Duration = Duration::from_millis(20);

    struct Harness {
        engine: Arc<CountdownEngine>,
        store: TimerStore,
        registry: Arc<PageRegistry>,
    }

    fn harness() -> Harness {
        let store = TimerStore::new(Arc::new(MemoryBackend::new()));
        let registry = Arc::new(PageRegistry::new());
        let notifier = ExpiryNotifier::new(registry.clone());
        let engine = Arc::new(CountdownEngine::new(store.clone(), notifier, TICK));
        Harness {
            engine,
            store,
            registry,
        }
    }

    #[tokio::test]
    async fn rejects_zero_duration() {
        let h = harness();
        match h.engine.start("example.com", 0).await {
            Err(TimerError::InvalidDuration) => {}
            other => panic!("expected InvalidDuration, got {other:?}"),
        }
        assert!(h.store.timer("example.com").await.unwrap().is_none());
        assert_eq!(h.engine.active_tick_count().await, 0);
    }

    #[tokio::test]
    async fn start_writes_a_fresh_running_record() {
        let h = harness();
        h.engine.start("example.com", 300_000).await.unwrap();

        let record = h.store.timer("example.com").await.unwrap().unwrap();
        assert!(record.is_active);
        assert!(!record.is_paused);
        assert_eq!(record.total_ms, 300_000);
        assert_eq!(h.engine.active_tick_count().await, 1);

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn ticks_decrement_remaining_time() {
        let h = harness();
        h.engine.start("example.com", 10_000).await.unwrap();
        sleep(TICK * 5).await;

        let record = h.store.timer("example.com").await.unwrap().unwrap();
        assert!(record.remaining_ms < 10_000, "no tick landed");
        assert!(record.remaining_ms > 9_000);

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn restart_resets_the_countdown() {
        let h = harness();
        h.engine.start("example.com", 10_000).await.unwrap();
        sleep(TICK * 4).await;
        h.engine.start("example.com", 10_000).await.unwrap();

        let record = h.store.timer("example.com").await.unwrap().unwrap();
        assert_eq!(record.total_ms, 10_000);
        assert!(record.remaining_at(now_ms()) > 9_900);
        // the superseded loop is gone, exactly one remains
        assert_eq!(h.engine.active_tick_count().await, 1);

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let h = harness();
        h.engine.stop("example.com").await.unwrap();

        h.engine.start("example.com", 10_000).await.unwrap();
        h.engine.stop("example.com").await.unwrap();
        h.engine.stop("example.com").await.unwrap();

        assert!(h.engine.store().timer("example.com").await.unwrap().is_none());
        assert_eq!(h.engine.active_tick_count().await, 0);
    }

    #[tokio::test]
    async fn pause_charges_elapsed_and_freezes() {
        let h = harness();
        h.engine.start("example.com", 5_000).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        h.engine.pause("example.com").await.unwrap();

        let paused = h.store.timer("example.com").await.unwrap().unwrap();
        assert!(paused.is_paused);
        assert!(paused.remaining_ms <= 4_960);
        assert!(paused.remaining_ms >= 4_700);

        // frozen: ticks keep running but charge nothing
        sleep(TICK * 4).await;
        let later = h.store.timer("example.com").await.unwrap().unwrap();
        assert_eq!(later.remaining_ms, paused.remaining_ms);

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn resume_conserves_remaining_across_the_boundary() {
        let h = harness();
        h.engine.start("example.com", 5_000).await.unwrap();
        sleep(Duration::from_millis(60)).await;
        h.engine.pause("example.com").await.unwrap();
        let frozen = h.store.timer("example.com").await.unwrap().unwrap().remaining_ms;

        sleep(Duration::from_millis(60)).await;
        h.engine.resume("example.com").await.unwrap();
        let resumed = h.store.timer("example.com").await.unwrap().unwrap();
        assert!(!resumed.is_paused);
        // the paused span is not charged
        assert!(frozen - resumed.remaining_at(now_ms()) < 100);

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn pause_preconditions() {
        let h = harness();
        match h.engine.pause("example.com").await {
            Err(TimerError::NotPausable) => {}
            other => panic!("expected NotPausable, got {other:?}"),
        }

        h.engine.start("example.com", 10_000).await.unwrap();
        h.engine.pause("example.com").await.unwrap();
        match h.engine.pause("example.com").await {
            Err(TimerError::NotPausable) => {}
            other => panic!("expected NotPausable, got {other:?}"),
        }

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn resume_preconditions() {
        let h = harness();
        match h.engine.resume("example.com").await {
            Err(TimerError::NotResumable) => {}
            other => panic!("expected NotResumable, got {other:?}"),
        }

        h.engine.start("example.com", 10_000).await.unwrap();
        match h.engine.resume("example.com").await {
            Err(TimerError::NotResumable) => {}
            other => panic!("expected NotResumable, got {other:?}"),
        }

        h.engine.stop("example.com").await.unwrap();
    }

    #[tokio::test]
    async fn expiry_fires_exactly_once_and_clears_the_record() {
        let h = harness();
        let id = h.registry.register("https://example.com/").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        h.registry.attach_listener(id, tx).await;

        h.engine.start("example.com", 50).await.unwrap();
        sleep(TICK * 10).await;

        assert!(h.store.timer("example.com").await.unwrap().is_none());
        assert_eq!(h.engine.active_tick_count().await, 0);
        assert_eq!(rx.try_recv(), Ok(PageEvent::TimerExpired));
        // never a second delivery from an already-absent key
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tick_loop_heals_after_external_deletion() {
        let h = harness();
        h.engine.start("example.com", 60_000).await.unwrap();
        assert_eq!(h.engine.active_tick_count().await, 1);

        // a management context removed the record behind the engine's back
        h.store.remove_timer("example.com").await.unwrap();
        sleep(TICK * 4).await;

        assert_eq!(h.engine.active_tick_count().await, 0);
    }

    #[tokio::test]
    async fn rearm_refreshes_running_records_and_freezes_nothing() {
        let h = harness();
        let stale = now_ms() - 60_000;
        h.store
            .set_timer("running.com", &TimerRecord::fresh(300_000, stale))
            .await
            .unwrap();
        let paused = TimerRecord::fresh(300_000, stale).paused_at(stale + 10_000);
        h.store.set_timer("paused.com", &paused).await.unwrap();

        let rearmed = h.engine.rearm_persisted().await.unwrap();
        assert_eq!(rearmed, 2);
        assert_eq!(h.engine.active_tick_count().await, 2);

        // downtime is not charged against the running record
        let running = h.store.timer("running.com").await.unwrap().unwrap();
        assert!(running.remaining_at(now_ms()) > 299_000);

        // the paused record is untouched
        let frozen = h.store.timer("paused.com").await.unwrap().unwrap();
        assert!(frozen.is_paused);
        assert_eq!(frozen.remaining_ms, 290_000);

        h.engine.stop("running.com").await.unwrap();
        h.engine.stop("paused.com").await.unwrap();
    }

    #[tokio::test]
    async fn paused_countdown_outlives_its_deadline_then_expires_on_resume() {
        let h = harness();
        h.engine.start("example.com", 100).await.unwrap();
        h.engine.pause("example.com").await.unwrap();

        // frozen well past the would-be deadline
        sleep(Duration::from_millis(200)).await;
        let frozen = h.store.timer("example.com").await.unwrap().unwrap();
        assert!(frozen.is_paused);

        h.engine.resume("example.com").await.unwrap();
        sleep(TICK * 10).await;
        assert!(h.store.timer("example.com").await.unwrap().is_none());
        assert_eq!(h.engine.active_tick_count().await, 0);
    }
}
