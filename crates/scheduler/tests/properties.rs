//! Timing and ordering properties of the coalesced refresh scheduler
//!
//! These tests run against a real UI thread and wall-clock timers, with
//! margins wide enough for a loaded CI machine.

use parking_lot::Mutex;
use scheduler::ActionScheduler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use ui_core::{DispatchConfig, UiThread};

fn spawn_ui() -> UiThread {
    UiThread::spawn(&DispatchConfig::default()).unwrap()
}

fn counting_scheduler(ui: &UiThread, delay: Duration) -> (ActionScheduler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let scheduler = ActionScheduler::with_delay(ui.handle(), delay, move || {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (scheduler, count)
}

/// Sleep until `offset` after `start`
fn sleep_until(start: Instant, offset: Duration) {
    if let Some(remaining) = offset.checked_sub(start.elapsed()) {
        thread::sleep(remaining);
    }
}

#[test]
fn test_burst_coalesces_to_single_run_after_last_call() {
    let ui = spawn_ui();
    let delay = Duration::from_millis(200);
    let fired_at = Arc::new(Mutex::new(Vec::new()));

    let f = fired_at.clone();
    let scheduler = ActionScheduler::with_delay(ui.handle(), delay, move || {
        f.lock().push(Instant::now());
    });

    let mut last_call = Instant::now();
    for _ in 0..20 {
        last_call = Instant::now();
        scheduler.schedule();
        thread::sleep(Duration::from_millis(5));
    }

    thread::sleep(delay * 3);

    let fired_at = fired_at.lock();
    assert_eq!(fired_at.len(), 1);
    assert!(fired_at[0].duration_since(last_call) >= delay);
}

#[test]
fn test_instances_are_isolated() {
    let ui = spawn_ui();
    let (first, first_count) = counting_scheduler(&ui, Duration::from_millis(20));
    let (_second, second_count) = counting_scheduler(&ui, Duration::from_millis(20));

    first.schedule();
    first.schedule();
    thread::sleep(Duration::from_millis(120));

    assert_eq!(first_count.load(Ordering::SeqCst), 1);
    assert_eq!(second_count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_scheduler_rearms_after_firing() {
    let ui = spawn_ui();
    let (scheduler, count) = counting_scheduler(&ui, Duration::from_millis(20));

    for expected in 1..=3 {
        scheduler.schedule();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), expected);
    }
}

#[test]
fn test_action_runs_on_ui_thread_regardless_of_caller() {
    let ui = spawn_ui();
    let ran_on: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));

    let r = ran_on.clone();
    let scheduler = Arc::new(ActionScheduler::with_delay(
        ui.handle(),
        Duration::from_millis(20),
        move || r.lock().push(thread::current().id()),
    ));

    // From a background "event bus" thread
    let s = scheduler.clone();
    thread::spawn(move || s.schedule()).join().unwrap();
    thread::sleep(Duration::from_millis(100));

    // From the test thread
    scheduler.schedule();
    thread::sleep(Duration::from_millis(100));

    // From the UI thread itself
    let s = scheduler.clone();
    ui.handle().invoke_and_wait(move || s.schedule()).unwrap();
    thread::sleep(Duration::from_millis(100));

    let ui_id = ui.handle().thread_id().unwrap();
    let ran_on = ran_on.lock();
    assert_eq!(ran_on.len(), 3);
    assert!(ran_on.iter().all(|id| *id == ui_id));
}

#[test]
fn test_concurrent_callers_still_coalesce() {
    let ui = spawn_ui();
    let (scheduler, count) = counting_scheduler(&ui, Duration::from_millis(150));
    let scheduler = Arc::new(scheduler);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let s = scheduler.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    s.schedule();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    thread::sleep(Duration::from_millis(450));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.fire_count(), 1);
}

#[test]
fn test_scenario_a_three_quick_calls_fire_once() {
    let ui = spawn_ui();
    let (scheduler, count) = counting_scheduler(&ui, Duration::from_millis(50));
    let start = Instant::now();

    scheduler.schedule();
    sleep_until(start, Duration::from_millis(10));
    scheduler.schedule();
    sleep_until(start, Duration::from_millis(20));
    scheduler.schedule();

    sleep_until(start, Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scenario_b_spaced_calls_fire_twice() {
    let ui = spawn_ui();
    let (scheduler, count) = counting_scheduler(&ui, Duration::from_millis(50));
    let start = Instant::now();

    scheduler.schedule();
    sleep_until(start, Duration::from_millis(60));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    sleep_until(start, Duration::from_millis(70));
    scheduler.schedule();
    sleep_until(start, Duration::from_millis(130));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_scenario_c_cancel_or_dispose_prevents_run() {
    let ui = spawn_ui();

    let (cancelled, cancelled_count) = counting_scheduler(&ui, Duration::from_millis(50));
    cancelled.schedule();
    assert!(cancelled.cancel());

    let (disposed, disposed_count) = counting_scheduler(&ui, Duration::from_millis(50));
    disposed.schedule();
    drop(disposed);

    thread::sleep(Duration::from_millis(150));
    assert_eq!(cancelled_count.load(Ordering::SeqCst), 0);
    assert_eq!(disposed_count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_schedule_does_not_block_on_busy_ui_thread() {
    let ui = spawn_ui();
    let (scheduler, count) = counting_scheduler(&ui, Duration::from_millis(10));

    // Keep the UI thread busy for a while
    ui.handle()
        .invoke_later(|| thread::sleep(Duration::from_millis(200)))
        .unwrap();

    let start = Instant::now();
    for _ in 0..1000 {
        scheduler.schedule();
    }
    assert!(start.elapsed() < Duration::from_millis(150));

    thread::sleep(Duration::from_millis(350));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
