//! Core runtime pieces for the campaign UI layer
//!
//! This crate provides:
//! - The single logical UI thread ([`UiThread`] / [`UiHandle`])
//! - A toolkit timer that fires its callback on that thread ([`TimerHandle`])
//! - Injected configuration ([`UiConfig`]) instead of process-wide registries

pub mod config;
pub mod dispatch;

// Re-exports
pub use config::{ConfigError, DispatchConfig, SchedulerConfig, UiConfig};
pub use dispatch::{DispatchError, DispatchStats, TimerHandle, UiHandle, UiThread};
