//! Single logical UI thread
//!
//! Every task posted through a [`UiHandle`] and every timer callback runs on
//! one dedicated OS thread, one at a time, in arrival order. The thread hosts
//! a current-thread tokio runtime so that delayed callbacks are plain local
//! tasks: they wake on the UI thread and never on the caller's.

use crate::config::DispatchConfig;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::LocalSet;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

/// Unit of work executed on the UI thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors raised by the UI dispatcher
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("UI thread is no longer running")]
    Closed,

    #[error("blocking call issued from the UI thread itself")]
    WouldDeadlock,

    #[error("failed to spawn UI thread")]
    Spawn(#[source] std::io::Error),

    #[error("failed to build UI runtime")]
    Runtime(#[source] std::io::Error),

    #[error("UI task panicked before producing a result")]
    Panicked,
}

/// Counters describing what the UI thread has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Tasks and timer callbacks that ran to completion
    pub executed: u64,
    /// Timer callbacks that started
    pub timers_fired: u64,
    /// Timers cancelled before their deadline
    pub timers_cancelled: u64,
    /// Tasks or callbacks that panicked
    pub panics: u64,
}

enum Command {
    Run(Task),
    Timer {
        deadline: Instant,
        timer: Arc<TimerState>,
        task: Task,
    },
}

/// State shared between handles and the UI thread
struct Shared {
    thread_id: OnceLock<ThreadId>,
    closed: AtomicBool,
    shutdown: Notify,
    executed: AtomicU64,
    timers_fired: AtomicU64,
    timers_cancelled: AtomicU64,
    panics: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            thread_id: OnceLock::new(),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            executed: AtomicU64::new(0),
            timers_fired: AtomicU64::new(0),
            timers_cancelled: AtomicU64::new(0),
            panics: AtomicU64::new(0),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // notify_one stores a permit if the loop is not parked yet
            self.shutdown.notify_one();
        }
    }

    /// Run a task, catching panics so the loop keeps going
    fn run_guarded(&self, task: Task) {
        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => {
                self.executed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.panics.fetch_add(1, Ordering::Relaxed);
                error!(panic = %panic_message(payload.as_ref()), "UI task panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

const TIMER_PENDING: u8 = 0;
const TIMER_FIRED: u8 = 1;
const TIMER_CANCELLED: u8 = 2;

struct TimerState {
    status: AtomicU8,
    wake: Notify,
}

/// Handle to one delayed callback armed with [`UiHandle::invoke_after`]
///
/// Dropping the handle does not cancel the timer.
#[derive(Clone)]
pub struct TimerHandle {
    state: Arc<TimerState>,
}

impl TimerHandle {
    /// Cancel the timer
    ///
    /// Returns `true` if the callback had not started yet; it will never run.
    /// Returns `false` if it already started or was cancelled before.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .state
            .status
            .compare_exchange(
                TIMER_PENDING,
                TIMER_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if cancelled {
            self.state.wake.notify_one();
        }
        cancelled
    }

    /// True until the callback starts or the timer is cancelled
    pub fn is_pending(&self) -> bool {
        self.state.status.load(Ordering::Acquire) == TIMER_PENDING
    }

    /// True once the callback has started
    pub fn has_fired(&self) -> bool {
        self.state.status.load(Ordering::Acquire) == TIMER_FIRED
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.state.status.load(Ordering::Acquire) {
            TIMER_PENDING => "pending",
            TIMER_FIRED => "fired",
            _ => "cancelled",
        };
        f.debug_struct("TimerHandle").field("status", &status).finish()
    }
}

/// Cloneable, thread-safe handle for posting work onto the UI thread
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl UiHandle {
    /// Enqueue a task to run on the UI thread
    pub fn invoke_later<F>(&self, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::Run(Box::new(task)))
    }

    /// Run `f` on the UI thread and wait for its result
    ///
    /// Fails with [`DispatchError::WouldDeadlock`] when called from the UI
    /// thread, since the task could never be dequeued.
    pub fn invoke_and_wait<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_ui_thread() {
            return Err(DispatchError::WouldDeadlock);
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        self.invoke_later(move || {
            let _ = tx.send(f());
        })?;

        rx.recv().map_err(|_| {
            if self.is_closed() {
                DispatchError::Closed
            } else {
                DispatchError::Panicked
            }
        })
    }

    /// Run `f` on the UI thread and await its result from async code
    pub async fn invoke<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.invoke_later(move || {
            let _ = tx.send(f());
        })?;

        rx.await.map_err(|_| {
            if self.is_closed() {
                DispatchError::Closed
            } else {
                DispatchError::Panicked
            }
        })
    }

    /// Arm a toolkit timer: `task` runs on the UI thread once `delay` has
    /// elapsed, measured from this call
    pub fn invoke_after<F>(&self, delay: Duration, task: F) -> Result<TimerHandle, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let timer = Arc::new(TimerState {
            status: AtomicU8::new(TIMER_PENDING),
            wake: Notify::new(),
        });

        self.send(Command::Timer {
            deadline,
            timer: timer.clone(),
            task: Box::new(task),
        })?;

        Ok(TimerHandle { state: timer })
    }

    /// Whether the calling thread is the UI thread
    pub fn is_ui_thread(&self) -> bool {
        self.shared.thread_id.get() == Some(&thread::current().id())
    }

    /// Id of the UI thread
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.shared.thread_id.get().copied()
    }

    /// Whether the UI thread has been shut down
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst) || self.tx.is_closed()
    }

    /// Snapshot of the dispatcher counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            executed: self.shared.executed.load(Ordering::Relaxed),
            timers_fired: self.shared.timers_fired.load(Ordering::Relaxed),
            timers_cancelled: self.shared.timers_cancelled.load(Ordering::Relaxed),
            panics: self.shared.panics.load(Ordering::Relaxed),
        }
    }

    fn send(&self, command: Command) -> Result<(), DispatchError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(DispatchError::Closed);
        }
        self.tx.send(command).map_err(|_| DispatchError::Closed)
    }
}

impl std::fmt::Debug for UiHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiHandle")
            .field("thread_id", &self.thread_id())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owner of the UI thread
///
/// Dropping it shuts the thread down; timers still pending at that point
/// never fire.
pub struct UiThread {
    handle: UiHandle,
    thread: Option<JoinHandle<()>>,
}

impl UiThread {
    /// Spawn the UI thread and wait until it is ready to accept work
    pub fn spawn(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_loop(thread_shared, rx, ready_tx))
            .map_err(DispatchError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(DispatchError::Runtime(e));
            }
            Err(_) => {
                let _ = thread.join();
                return Err(DispatchError::Panicked);
            }
        }

        debug!(thread = %config.thread_name, "UI thread started");

        Ok(Self {
            handle: UiHandle { tx, shared },
            thread: Some(thread),
        })
    }

    /// Get a handle for posting work
    pub fn handle(&self) -> UiHandle {
        self.handle.clone()
    }

    /// Stop the UI thread and wait for it to exit
    ///
    /// Work already queued but not yet started is dropped.
    pub fn shutdown(mut self) -> Result<(), DispatchError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), DispatchError> {
        self.handle.shared.close();

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };

        if thread.thread().id() == thread::current().id() {
            // Joining ourselves would hang; the loop exits after this task
            return Err(DispatchError::WouldDeadlock);
        }

        thread.join().map_err(|_| DispatchError::Panicked)?;
        debug!("UI thread stopped");
        Ok(())
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("UI thread did not stop cleanly: {}", e);
        }
    }
}

fn run_loop(
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    ready: crossbeam_channel::Sender<std::io::Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let _ = shared.thread_id.set(thread::current().id());
    let _ = ready.send(Ok(()));

    let local = LocalSet::new();
    local.block_on(&runtime, async {
        loop {
            tokio::select! {
                biased;
                _ = shared.shutdown.notified() => break,
                command = rx.recv() => match command {
                    Some(Command::Run(task)) => shared.run_guarded(task),
                    Some(Command::Timer { deadline, timer, task }) => {
                        arm_timer(shared.clone(), deadline, timer, task);
                    }
                    None => break,
                },
            }
        }
    });

    // Dropping the LocalSet discards timers that have not fired
    drop(local);
    rx.close();
    trace!("UI loop exited");
}

fn arm_timer(shared: Arc<Shared>, deadline: Instant, timer: Arc<TimerState>, task: Task) {
    tokio::task::spawn_local(async move {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = timer.wake.notified() => {}
        }

        let fired = timer
            .status
            .compare_exchange(TIMER_PENDING, TIMER_FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if fired {
            shared.timers_fired.fetch_add(1, Ordering::Relaxed);
            shared.run_guarded(task);
        } else {
            shared.timers_cancelled.fetch_add(1, Ordering::Relaxed);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn spawn_ui() -> UiThread {
        UiThread::spawn(&DispatchConfig::default()).unwrap()
    }

    /// Wait until every task queued before this call has run
    fn flush(ui: &UiHandle) {
        ui.invoke_and_wait(|| ()).unwrap();
    }

    #[test]
    fn test_tasks_run_on_ui_thread() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();

        let ran_on = ui.invoke_and_wait(|| thread::current().id()).unwrap();

        assert_eq!(Some(ran_on), ui.thread_id());
        assert_ne!(ran_on, thread::current().id());
        assert!(!ui.is_ui_thread());
    }

    #[test]
    fn test_thread_is_named_from_config() {
        let config = DispatchConfig {
            thread_name: "campaign-ui".to_string(),
        };
        let ui_thread = UiThread::spawn(&config).unwrap();

        let name = ui_thread
            .handle()
            .invoke_and_wait(|| thread::current().name().map(str::to_string))
            .unwrap();

        assert_eq!(name.as_deref(), Some("campaign-ui"));
    }

    #[test]
    fn test_tasks_run_in_order() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let log = log.clone();
            ui.invoke_later(move || log.lock().push(i)).unwrap();
        }
        flush(&ui);

        assert_eq!(*log.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_invoke_and_wait_from_ui_thread_is_rejected() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();

        let inner = ui.clone();
        let rejected = ui
            .invoke_and_wait(move || {
                matches!(inner.invoke_and_wait(|| ()), Err(DispatchError::WouldDeadlock))
            })
            .unwrap();

        assert!(rejected);
    }

    #[tokio::test]
    async fn test_invoke_from_async_context() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();

        let on_ui = ui.invoke({
            let ui = ui.clone();
            move || ui.is_ui_thread()
        })
        .await
        .unwrap();

        assert!(on_ui);
    }

    #[test]
    fn test_timer_fires_after_delay() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let timer = ui
            .invoke_after(Duration::from_millis(30), move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(timer.is_pending());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(150));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(timer.has_fired());
        assert!(!timer.cancel());
        assert_eq!(ui.stats().timers_fired, 1);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let timer = ui
            .invoke_after(Duration::from_millis(30), move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(timer.cancel());
        assert!(!timer.cancel());

        thread::sleep(Duration::from_millis(100));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!timer.has_fired());
        assert_eq!(ui.stats().timers_cancelled, 1);
    }

    #[test]
    fn test_panicking_task_does_not_stop_loop() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();

        ui.invoke_later(|| panic!("refresh failed")).unwrap();
        let value = ui.invoke_and_wait(|| 7).unwrap();

        assert_eq!(value, 7);
        assert_eq!(ui.stats().panics, 1);
    }

    #[test]
    fn test_invoke_and_wait_reports_panic() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();

        let result: Result<(), _> = ui.invoke_and_wait(|| panic!("boom"));

        assert!(matches!(result, Err(DispatchError::Panicked)));
    }

    #[test]
    fn test_shutdown_rejects_new_work_and_drops_timers() {
        let ui_thread = spawn_ui();
        let ui = ui_thread.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let timer = ui
            .invoke_after(Duration::from_millis(50), move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        ui_thread.shutdown().unwrap();

        assert!(ui.is_closed());
        assert!(matches!(ui.invoke_later(|| ()), Err(DispatchError::Closed)));

        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!timer.has_fired());
    }
}
