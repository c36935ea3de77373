//! In-memory campaign model driven by the simulator
//!
//! Stands in for the real campaign engine: every mutation returns the
//! events it produced so the caller can publish them.

use chrono::{Duration as Days, NaiveDate};
use events::{CampaignEvent, ForceId, PersonId, ScenarioId, UnitId};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

const CHASSIS: [&str; 12] = [
    "Atlas", "Marauder", "Warhammer", "Phoenix Hawk", "Wasp", "Locust", "Catapult", "Rifleman",
    "Griffin", "Shadow Hawk", "Stinger", "Archer",
];

const FORCE_NAMES: [&str; 6] = ["Alpha", "Bravo", "Charlie", "Delta", "Echo", "Foxtrot"];

/// Units per lance
const LANCE_SIZE: usize = 4;

/// Daily salary per person (C-bills)
const SALARY: i64 = 1_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Operational,
    Damaged,
    Repairing,
    Destroyed,
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub status: UnitStatus,
}

#[derive(Debug, Clone)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub wounded: bool,
    pub xp: u32,
}

#[derive(Debug, Clone)]
pub struct Force {
    pub id: ForceId,
    pub name: String,
    /// Set for allied forces attached to the campaign but not owned by it
    pub owner: Option<String>,
    pub units: Vec<UnitId>,
}

pub struct Campaign {
    pub date: NaiveDate,
    pub funds: i64,
    pub transactions: usize,
    pub last_transaction: Option<String>,
    pub units: BTreeMap<UnitId, Unit>,
    pub personnel: BTreeMap<PersonId, Person>,
    pub forces: Vec<Force>,
    pub report: Vec<String>,
    next_scenario: u32,
}

impl Campaign {
    /// Build a campaign with `units` units split into lances and `personnel` people
    pub fn new(start: NaiveDate, units: usize, personnel: usize) -> Self {
        let units: BTreeMap<UnitId, Unit> = (0..units)
            .map(|i| {
                let id = UnitId(i as u32 + 1);
                let unit = Unit {
                    id,
                    name: format!("{} {}", CHASSIS[i % CHASSIS.len()], i + 1),
                    status: UnitStatus::Operational,
                };
                (id, unit)
            })
            .collect();

        let ids: Vec<UnitId> = units.keys().copied().collect();
        let lance_count = ids.chunks(LANCE_SIZE).count();
        let forces = ids
            .chunks(LANCE_SIZE)
            .enumerate()
            .map(|(i, chunk)| {
                // The last lance of a company-sized roster is an allied detachment
                let allied = lance_count > 2 && i + 1 == lance_count;
                Force {
                    id: ForceId(i as u32 + 1),
                    name: format!("{} Lance", FORCE_NAMES[i % FORCE_NAMES.len()]),
                    owner: allied.then(|| "Allied Command".to_string()),
                    units: chunk.to_vec(),
                }
            })
            .collect();

        let personnel = (0..personnel)
            .map(|i| {
                let id = PersonId(i as u32 + 1);
                let person = Person {
                    id,
                    name: format!("MechWarrior {}", i + 1),
                    wounded: false,
                    xp: 0,
                };
                (id, person)
            })
            .collect();

        Self {
            date: start,
            funds: 5_000_000,
            transactions: 0,
            last_transaction: None,
            units,
            personnel,
            forces,
            report: Vec::new(),
            next_scenario: 1,
        }
    }

    /// Advance one day: pay salaries, progress repairs, heal the wounded
    pub fn advance_day(&mut self) -> Vec<CampaignEvent> {
        let mut events = Vec::new();

        self.date += Days::days(1);
        events.push(CampaignEvent::DayAdvanced { date: self.date });

        let payroll: Vec<(PersonId, String)> = self
            .personnel
            .values()
            .map(|p| (p.id, p.name.clone()))
            .collect();
        for (_, name) in payroll {
            events.push(self.record_transaction(-SALARY, format!("Salary: {}", name)));
        }

        for unit in self.units.values_mut() {
            let next = match unit.status {
                UnitStatus::Damaged => UnitStatus::Repairing,
                UnitStatus::Repairing => UnitStatus::Operational,
                other => other,
            };
            if next != unit.status {
                unit.status = next;
                events.push(CampaignEvent::UnitStatusChanged { unit: unit.id });
            }
        }

        for person in self.personnel.values_mut().filter(|p| p.wounded) {
            person.wounded = false;
            events.push(CampaignEvent::PersonnelChanged { person: person.id });
        }

        events.push(self.append_report(format!("{}: day begins", self.date)));
        events
    }

    /// Fight a scenario with one operational lance
    pub fn resolve_scenario(&mut self, rng: &mut ChaCha8Rng) -> Vec<CampaignEvent> {
        let mut events = Vec::new();

        let candidates: Vec<usize> = self
            .forces
            .iter()
            .enumerate()
            .filter(|(_, force)| {
                force.owner.is_none()
                    && force
                        .units
                        .iter()
                        .any(|id| self.units.get(id).map(|u| u.status) == Some(UnitStatus::Operational))
            })
            .map(|(i, _)| i)
            .collect();

        let Some(&force_idx) = candidates.choose(rng) else {
            events.push(self.append_report("No lance fit for deployment".to_string()));
            return events;
        };

        let scenario = ScenarioId(self.next_scenario);
        self.next_scenario += 1;
        let victory = rng.gen_bool(0.65);
        let force = self.forces[force_idx].clone();

        for unit_id in &force.units {
            let Some(unit) = self.units.get_mut(unit_id) else {
                continue;
            };
            if unit.status != UnitStatus::Operational {
                continue;
            }
            let roll: f64 = rng.gen();
            let status = if roll < 0.08 {
                UnitStatus::Destroyed
            } else if roll < 0.5 {
                UnitStatus::Damaged
            } else {
                UnitStatus::Operational
            };
            if status != unit.status {
                unit.status = status;
                events.push(CampaignEvent::UnitStatusChanged { unit: unit.id });
            }
        }

        for person in self.personnel.values_mut() {
            person.xp += 1;
            if rng.gen_bool(0.15) {
                person.wounded = true;
            }
            events.push(CampaignEvent::PersonnelChanged { person: person.id });
        }

        let (amount, description) = if victory {
            (rng.gen_range(200_000..400_000), format!("Contract payment: {}", scenario))
        } else {
            (rng.gen_range(20_000..60_000), format!("Salvage: {}", scenario))
        };
        events.push(self.record_transaction(amount, description));

        events.push(CampaignEvent::ScenarioResolved { scenario, victory });
        events.push(self.append_report(format!(
            "{}: {} {} {}",
            self.date,
            force.name,
            if victory { "won" } else { "lost" },
            scenario
        )));

        // Withdraw destroyed units from the lance
        let destroyed: Vec<UnitId> = force
            .units
            .iter()
            .copied()
            .filter(|id| self.units.get(id).map(|u| u.status) == Some(UnitStatus::Destroyed))
            .collect();
        if !destroyed.is_empty() {
            self.forces[force_idx].units.retain(|id| !destroyed.contains(id));
            events.push(CampaignEvent::ForceReorganized { force: force.id });
        }

        events
    }

    fn record_transaction(&mut self, amount: i64, description: String) -> CampaignEvent {
        self.funds += amount;
        self.transactions += 1;
        self.last_transaction = Some(description.clone());
        CampaignEvent::TransactionRecorded {
            amount,
            description,
        }
    }

    fn append_report(&mut self, line: String) -> CampaignEvent {
        self.report.push(line.clone());
        CampaignEvent::ReportAppended { line }
    }
}
