//! Coalesced refresh scheduling for UI panels
//!
//! This crate provides:
//! - [`ActionScheduler`]: debounces bursts of refresh requests into a single
//!   execution of a bound action, run on the UI thread
//! - [`KeyedScheduler`]: the same quiet window, but the action receives the
//!   deduplicated set of keys requested during the burst
//!
//! Both are driven by the toolkit timer in [`ui_core::dispatch`], so the bound
//! action never runs on the thread that called `schedule()` unless that
//! thread is the UI thread.

pub mod coalesce;
pub mod debounce;

pub use coalesce::{KeyedHandle, KeyedScheduler};
pub use debounce::{ActionScheduler, ScheduleHandle, DEFAULT_DELAY};
