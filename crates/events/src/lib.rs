//! Domain-change notifications for the campaign UI
//!
//! This crate provides:
//! - A typed publish/subscribe bus with explicit, guard-based subscriptions
//! - The campaign event taxonomy panels subscribe to

pub mod bus;
pub mod campaign;

// Re-exports
pub use bus::{EventBus, Subscription};
pub use campaign::{CampaignEvent, ForceId, PersonId, ScenarioId, Topic, UnitId};
