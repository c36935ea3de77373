//! Keyed refresh coalescing
//!
//! Panels that can refresh part of their content (one tree node, one table
//! row) collect the keys touched during a burst and receive them as a single
//! batch once the burst settles.

use crate::debounce::{ActionScheduler, ScheduleHandle};
use ahash::AHashSet;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;
use ui_core::config::SchedulerConfig;
use ui_core::UiHandle;

/// Keys requested since the last firing, in first-request order
struct PendingKeys<K> {
    order: Vec<K>,
    seen: AHashSet<K>,
}

impl<K: Eq + Hash + Clone> PendingKeys<K> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            seen: AHashSet::new(),
        }
    }

    fn insert(&mut self, key: K) {
        if self.seen.insert(key.clone()) {
            self.order.push(key);
        }
    }

    fn drain(&mut self) -> Vec<K> {
        self.seen.clear();
        std::mem::take(&mut self.order)
    }

    fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

/// Debounced scheduler that aggregates keys across a burst
///
/// Shares one quiet window across all keys: the action runs once per burst
/// with every distinct key requested during it. An empty batch never
/// reaches the action.
pub struct KeyedScheduler<K> {
    keys: Arc<Mutex<PendingKeys<K>>>,
    scheduler: ActionScheduler,
}

impl<K> KeyedScheduler<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Bind a batch action with an explicit delay
    pub fn with_delay<F>(ui: UiHandle, delay: Duration, action: F) -> Self
    where
        F: Fn(Vec<K>) + Send + Sync + 'static,
    {
        let keys = Arc::new(Mutex::new(PendingKeys::new()));
        let scheduler = ActionScheduler::with_delay(ui, delay, Self::batch_action(&keys, action));
        Self { keys, scheduler }
    }

    /// Bind a batch action with the delay configured for `name`
    pub fn from_config<F>(ui: UiHandle, config: &SchedulerConfig, name: &str, action: F) -> Self
    where
        F: Fn(Vec<K>) + Send + Sync + 'static,
    {
        let keys = Arc::new(Mutex::new(PendingKeys::new()));
        let scheduler =
            ActionScheduler::from_config(ui, config, name, Self::batch_action(&keys, action));
        Self { keys, scheduler }
    }

    fn batch_action<F>(keys: &Arc<Mutex<PendingKeys<K>>>, action: F) -> impl Fn() + Send + Sync + 'static
    where
        F: Fn(Vec<K>) + Send + Sync + 'static,
    {
        let keys = keys.clone();
        move || {
            let batch = keys.lock().drain();
            if !batch.is_empty() {
                action(batch);
            }
        }
    }

    /// Request a refresh of `key`
    ///
    /// Returns `false` if no firing could be armed; the key is discarded.
    pub fn schedule(&self, key: K) -> bool {
        self.keys.lock().insert(key);
        arm_or_discard(&self.keys, || self.scheduler.schedule())
    }

    /// Request a refresh of several keys in one call
    pub fn schedule_all<I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
    {
        {
            let mut pending = self.keys.lock();
            for key in keys {
                pending.insert(key);
            }
        }
        arm_or_discard(&self.keys, || self.scheduler.schedule())
    }

    /// Drop the pending firing and forget collected keys
    pub fn cancel(&self) -> bool {
        self.keys.lock().clear();
        self.scheduler.cancel()
    }

    /// Number of distinct keys waiting for the next firing
    pub fn pending_keys(&self) -> usize {
        self.keys.lock().order.len()
    }

    /// Whether a firing is outstanding
    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Quiet window of this scheduler
    pub fn delay(&self) -> Duration {
        self.scheduler.delay()
    }

    /// Number of times the underlying scheduler has fired
    pub fn fire_count(&self) -> u64 {
        self.scheduler.fire_count()
    }

    /// Weak trigger for event handlers
    pub fn handle(&self) -> KeyedHandle<K> {
        KeyedHandle {
            keys: Arc::downgrade(&self.keys),
            trigger: self.scheduler.handle(),
        }
    }
}

/// Weak, cloneable trigger for a [`KeyedScheduler`]
pub struct KeyedHandle<K> {
    keys: Weak<Mutex<PendingKeys<K>>>,
    trigger: ScheduleHandle,
}

impl<K> Clone for KeyedHandle<K> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            trigger: self.trigger.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedHandle<K> {
    /// Request a refresh of `key`
    ///
    /// Returns `false` once the scheduler has been dropped.
    pub fn schedule(&self, key: K) -> bool {
        if !self.trigger.is_alive() {
            return false;
        }
        match self.keys.upgrade() {
            Some(keys) => {
                keys.lock().insert(key);
                arm_or_discard(&keys, || self.trigger.schedule())
            }
            None => false,
        }
    }
}

/// Arm the shared window; if that fails no firing will ever drain the
/// collected keys, so drop them
fn arm_or_discard<K: Eq + Hash + Clone>(
    keys: &Mutex<PendingKeys<K>>,
    arm: impl FnOnce() -> bool,
) -> bool {
    let armed = arm();
    if !armed {
        keys.lock().clear();
    }
    armed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use ui_core::{DispatchConfig, UiThread};

    fn spawn_ui() -> UiThread {
        UiThread::spawn(&DispatchConfig::default()).unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<Vec<u32>>>>, impl Fn(Vec<u32>) + Send + Sync + 'static) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let b = batches.clone();
        (batches, move |batch| b.lock().push(batch))
    }

    #[test]
    fn test_pending_keys_dedup_in_order() {
        let mut keys = PendingKeys::new();
        keys.insert(3);
        keys.insert(1);
        keys.insert(3);
        keys.insert(2);

        assert_eq!(keys.drain(), vec![3, 1, 2]);
        assert!(keys.drain().is_empty());
    }

    #[test]
    fn test_burst_delivers_one_deduplicated_batch() {
        let ui_thread = spawn_ui();
        let (batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui_thread.handle(), Duration::from_millis(40), action);

        scheduler.schedule(7);
        scheduler.schedule(2);
        scheduler.schedule_all([7, 9, 2]);
        assert_eq!(scheduler.pending_keys(), 3);

        thread::sleep(Duration::from_millis(150));

        assert_eq!(*batches.lock(), vec![vec![7, 2, 9]]);
        assert_eq!(scheduler.pending_keys(), 0);
        assert_eq!(scheduler.fire_count(), 1);
    }

    #[test]
    fn test_separate_bursts_get_separate_batches() {
        let ui_thread = spawn_ui();
        let (batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui_thread.handle(), Duration::from_millis(20), action);

        scheduler.schedule(1);
        thread::sleep(Duration::from_millis(100));
        scheduler.schedule(1);
        scheduler.schedule(4);
        thread::sleep(Duration::from_millis(100));

        assert_eq!(*batches.lock(), vec![vec![1], vec![1, 4]]);
    }

    #[test]
    fn test_cancel_forgets_keys() {
        let ui_thread = spawn_ui();
        let (batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui_thread.handle(), Duration::from_millis(20), action);

        scheduler.schedule(5);
        assert!(scheduler.cancel());
        assert_eq!(scheduler.pending_keys(), 0);

        thread::sleep(Duration::from_millis(80));
        assert!(batches.lock().is_empty());
    }

    #[test]
    fn test_handle_feeds_scheduler_from_other_thread() {
        let ui_thread = spawn_ui();
        let (batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui_thread.handle(), Duration::from_millis(30), action);
        let handle = scheduler.handle();

        thread::spawn(move || {
            for key in [10, 11, 10] {
                assert!(handle.schedule(key));
            }
        })
        .join()
        .unwrap();

        thread::sleep(Duration::from_millis(120));
        assert_eq!(*batches.lock(), vec![vec![10, 11]]);
    }

    #[test]
    fn test_keys_discarded_once_ui_thread_is_gone() {
        let ui_thread = spawn_ui();
        let (batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui_thread.handle(), Duration::from_millis(20), action);
        let handle = scheduler.handle();

        ui_thread.shutdown().unwrap();

        for key in 0..10_000 {
            assert!(!scheduler.schedule(key));
        }
        assert!(!scheduler.schedule_all([1, 2, 3]));
        assert!(!handle.schedule(99_999));

        assert_eq!(scheduler.pending_keys(), 0);
        assert!(!scheduler.is_pending());
        assert!(batches.lock().is_empty());
    }

    #[test]
    fn test_drop_with_keys_pending_skips_batch() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();
        let (batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui.clone(), Duration::from_millis(30), action);

        assert!(scheduler.schedule(4));
        assert!(scheduler.schedule(8));
        assert_eq!(scheduler.pending_keys(), 2);
        drop(scheduler);

        thread::sleep(Duration::from_millis(120));
        assert!(batches.lock().is_empty());
        assert_eq!(ui.stats().timers_fired, 0);
    }

    #[test]
    fn test_handle_after_drop() {
        let ui_thread = spawn_ui();
        let (_batches, action) = recorder();
        let scheduler = KeyedScheduler::with_delay(ui_thread.handle(), Duration::from_millis(30), action);
        let handle = scheduler.handle();

        drop(scheduler);
        assert!(!handle.schedule(1));
    }
}
