//! Debounced action scheduling
//!
//! Prevents redundant panel refreshes when domain events arrive in bursts:
//! every `schedule()` restarts one quiet window, and the bound action runs
//! once on the UI thread after the window elapses without another request.

use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};
use ui_core::config::{SchedulerConfig, DEFAULT_DELAY_MS};
use ui_core::{TimerHandle, UiHandle};

/// Quiet window used by [`ActionScheduler::new`]
pub const DEFAULT_DELAY: Duration = Duration::from_millis(DEFAULT_DELAY_MS);

type Action = Box<dyn Fn() + Send + Sync + 'static>;

/// Coalesces bursts of refresh requests into one deferred action
///
/// At most one firing is pending at any time. Calling [`schedule`] while one
/// is pending supersedes it: the old timer is cancelled and a new one is
/// armed `delay` from the new call.
///
/// Dropping the scheduler cancels any pending firing, so the action never
/// runs after its owner is gone.
///
/// [`schedule`]: ActionScheduler::schedule
pub struct ActionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    name: Cow<'static, str>,
    ui: UiHandle,
    action: Action,
    delay: Duration,
    state: Mutex<State>,
    fired: AtomicU64,
}

#[derive(Default)]
struct State {
    /// Bumped on every schedule(); identifies the live timer
    generation: u64,
    pending: Option<Pending>,
    disposed: bool,
}

struct Pending {
    generation: u64,
    timer: TimerHandle,
}

impl ActionScheduler {
    /// Bind `action` with the default delay
    pub fn new<F>(ui: UiHandle, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_delay(ui, DEFAULT_DELAY, action)
    }

    /// Bind `action` with an explicit delay
    pub fn with_delay<F>(ui: UiHandle, delay: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::build(Cow::Borrowed("refresh"), ui, delay, Box::new(action))
    }

    /// Bind `action` with the delay configured for `name`
    pub fn from_config<F>(ui: UiHandle, config: &SchedulerConfig, name: &str, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let delay = config.delay_for(name);
        Self::build(Cow::Owned(name.to_string()), ui, delay, Box::new(action))
    }

    fn build(name: Cow<'static, str>, ui: UiHandle, delay: Duration, action: Action) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                ui,
                action,
                delay,
                state: Mutex::new(State::default()),
                fired: AtomicU64::new(0),
            }),
        }
    }

    /// Request that the action run once, `delay` from now
    ///
    /// Never blocks and may be called from any thread. Returns `false` if
    /// nothing could be armed (scheduler disposed or UI thread gone).
    pub fn schedule(&self) -> bool {
        self.inner.schedule()
    }

    /// Drop the pending firing, if any
    ///
    /// Returns `true` if a firing was pending.
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    /// Whether a firing is outstanding
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Quiet window of this scheduler
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Number of times the action has been started
    pub fn fire_count(&self) -> u64 {
        self.inner.fired.load(Ordering::Relaxed)
    }

    /// Name used in logs ("refresh" unless built from config)
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Weak trigger for event handlers
    ///
    /// The handle does not keep the scheduler alive.
    pub fn handle(&self) -> ScheduleHandle {
        ScheduleHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Drop for ActionScheduler {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for ActionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionScheduler")
            .field("name", &self.inner.name)
            .field("delay", &self.inner.delay)
            .field("pending", &self.is_pending())
            .field("fired", &self.fire_count())
            .finish()
    }
}

impl Inner {
    fn schedule(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock();
        if state.disposed {
            return false;
        }

        state.generation += 1;
        let generation = state.generation;

        if let Some(previous) = state.pending.take() {
            previous.timer.cancel();
            trace!(scheduler = %self.name, generation, "superseded pending refresh");
        }

        let weak = Arc::downgrade(self);
        let armed = self.ui.invoke_after(self.delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation);
            }
        });

        match armed {
            Ok(timer) => {
                state.pending = Some(Pending { generation, timer });
                true
            }
            Err(e) => {
                warn!(scheduler = %self.name, "cannot arm refresh: {}", e);
                false
            }
        }
    }

    /// Runs on the UI thread when a timer expires
    fn fire(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            match &state.pending {
                Some(pending) if pending.generation == generation => state.pending = None,
                _ => return,
            }
        }

        let count = self.fired.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(scheduler = %self.name, count, "running coalesced refresh");

        // Lock released: the action may call schedule() again
        (self.action)();
    }

    fn cancel(&self) -> bool {
        let pending = self.state.lock().pending.take();
        match pending {
            Some(pending) => {
                pending.timer.cancel();
                trace!(scheduler = %self.name, "cancelled pending refresh");
                true
            }
            None => false,
        }
    }

    fn dispose(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.disposed = true;
            state.pending.take()
        };
        if let Some(pending) = pending {
            pending.timer.cancel();
        }
    }
}

/// Weak, cloneable trigger for an [`ActionScheduler`]
#[derive(Clone)]
pub struct ScheduleHandle {
    inner: Weak<Inner>,
}

impl ScheduleHandle {
    /// Schedule the owning scheduler
    ///
    /// Returns `false` once the scheduler has been dropped.
    pub fn schedule(&self) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.schedule(),
            None => false,
        }
    }

    /// Whether the owning scheduler still exists
    pub fn is_alive(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| !inner.state.lock().disposed)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
