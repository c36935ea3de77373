//! Campaign event taxonomy
//!
//! One variant per kind of domain change a panel may care about. Panels
//! subscribe by [`Topic`] and re-read the campaign model when they refresh,
//! so events carry identifiers rather than snapshots.

use crate::bus::{EventBus, Subscription};
use chrono::NaiveDate;
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a unit in the campaign roster
    UnitId, "unit"
);
id_type!(
    /// Identifier of a person in the campaign personnel list
    PersonId, "person"
);
id_type!(
    /// Identifier of a force in the table of organization
    ForceId, "force"
);
id_type!(
    /// Identifier of a scenario
    ScenarioId, "scenario"
);

/// Coarse event category used for subscription filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Funds and transactions
    Finances,
    /// Unit status and repairs
    Units,
    /// People on the roster: wounds, experience
    Personnel,
    /// Table of organization
    Forces,
    /// Scenario outcomes
    Scenarios,
    /// Passage of campaign days
    Calendar,
    /// Daily report log
    Reports,
}

impl Topic {
    /// Every topic, in display order
    pub const ALL: [Topic; 7] = [
        Topic::Finances,
        Topic::Units,
        Topic::Personnel,
        Topic::Forces,
        Topic::Scenarios,
        Topic::Calendar,
        Topic::Reports,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Topic::Finances => "finances",
            Topic::Units => "units",
            Topic::Personnel => "personnel",
            Topic::Forces => "forces",
            Topic::Scenarios => "scenarios",
            Topic::Calendar => "calendar",
            Topic::Reports => "reports",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that some part of the campaign changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignEvent {
    /// Funds moved; `amount` is signed, in C-bills
    TransactionRecorded { amount: i64, description: String },
    /// A unit was damaged, repaired or destroyed
    UnitStatusChanged { unit: UnitId },
    /// A person was wounded, healed or gained experience
    PersonnelChanged { person: PersonId },
    /// Units were added to or withdrawn from a force
    ForceReorganized { force: ForceId },
    /// A scenario finished
    ScenarioResolved { scenario: ScenarioId, victory: bool },
    /// The campaign moved to `date`
    DayAdvanced { date: NaiveDate },
    /// A line was added to the daily report
    ReportAppended { line: String },
}

impl CampaignEvent {
    pub fn topic(&self) -> Topic {
        match self {
            CampaignEvent::TransactionRecorded { .. } => Topic::Finances,
            CampaignEvent::UnitStatusChanged { .. } => Topic::Units,
            CampaignEvent::PersonnelChanged { .. } => Topic::Personnel,
            CampaignEvent::ForceReorganized { .. } => Topic::Forces,
            CampaignEvent::ScenarioResolved { .. } => Topic::Scenarios,
            CampaignEvent::DayAdvanced { .. } => Topic::Calendar,
            CampaignEvent::ReportAppended { .. } => Topic::Reports,
        }
    }

    /// Unit touched by this event, if any
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            CampaignEvent::UnitStatusChanged { unit } => Some(*unit),
            _ => None,
        }
    }
}

impl EventBus<CampaignEvent> {
    /// Register a handler for events in any of `topics`
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_topics<F>(&self, topics: &[Topic], handler: F) -> Subscription
    where
        F: Fn(&CampaignEvent) + Send + Sync + 'static,
    {
        let topics = topics.to_vec();
        self.subscribe_filtered(move |event| topics.contains(&event.topic()), handler)
    }
}
