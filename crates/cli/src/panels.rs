//! Campaign panels
//!
//! Each panel subscribes to the topics it displays and funnels every matching
//! event into a scheduler. The scheduler re-renders the panel's view on the
//! UI thread once the burst is over.

use crate::campaign::{Campaign, UnitStatus};
use crate::tree::TreeNode;
use crate::util::format_cbills;
use events::{CampaignEvent, EventBus, Subscription, Topic, UnitId};
use parking_lot::{Mutex, RwLock};
use scheduler::{ActionScheduler, KeyedScheduler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ui_core::{DispatchError, SchedulerConfig, UiHandle};

/// Campaign model shared by the simulator and the panels
pub type SharedCampaign = Arc<RwLock<Campaign>>;

/// Number of report lines shown by the daily report panel
const REPORT_TAIL: usize = 5;

type RenderFn = fn(&Campaign) -> String;

/// Event and refresh counters for one panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelStats {
    pub name: &'static str,
    pub events: u64,
    pub refreshes: u64,
}

/// Panel that re-renders its whole view on refresh
pub struct Panel {
    // Declared first so the handler is gone before the scheduler is disposed
    _subscription: Subscription,
    name: &'static str,
    scheduler: ActionScheduler,
    view: Arc<Mutex<String>>,
    events: Arc<AtomicU64>,
}

impl Panel {
    fn attach(
        name: &'static str,
        topics: &[Topic],
        ui: &UiHandle,
        bus: &EventBus<CampaignEvent>,
        campaign: &SharedCampaign,
        config: &SchedulerConfig,
        render: RenderFn,
    ) -> Self {
        let view = Arc::new(Mutex::new(String::new()));

        let scheduler = {
            let view = view.clone();
            let campaign = campaign.clone();
            ActionScheduler::from_config(ui.clone(), config, name, move || {
                let text = render(&campaign.read());
                *view.lock() = text;
                debug!(panel = name, "panel refreshed");
            })
        };

        let events = Arc::new(AtomicU64::new(0));
        let subscription = {
            let events = events.clone();
            let trigger = scheduler.handle();
            bus.subscribe_topics(topics, move |_| {
                events.fetch_add(1, Ordering::Relaxed);
                trigger.schedule();
            })
        };

        debug!(panel = name, sub_id = subscription.id(), delay = ?scheduler.delay(), "panel attached");
        scheduler.schedule();

        Self {
            _subscription: subscription,
            name,
            scheduler,
            view,
            events,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> PanelStats {
        PanelStats {
            name: self.name,
            events: self.events.load(Ordering::Relaxed),
            refreshes: self.scheduler.fire_count(),
        }
    }
}

#[derive(Default)]
struct TreeState {
    nodes: Vec<TreeNode>,
    rendered: String,
}

impl TreeState {
    fn rebuild(&mut self, campaign: &Campaign) {
        self.nodes = TreeNode::build(campaign);
        self.render();
    }

    /// Patch the rows for `units`; returns how many were found
    fn refresh_rows(&mut self, campaign: &Campaign, units: &[UnitId]) -> usize {
        let mut patched = 0;
        for unit in units.iter().filter_map(|id| campaign.units.get(id)) {
            if self.nodes.iter_mut().any(|node| node.refresh_unit(unit)) {
                patched += 1;
            }
        }
        self.render();
        patched
    }

    fn render(&mut self) {
        let mut out = String::new();
        for node in &self.nodes {
            node.render(0, &mut out);
        }
        self.rendered = out;
    }
}

/// Table-of-organization panel
///
/// Status changes patch individual rows; reorganizations rebuild the tree.
pub struct UnitTreePanel {
    _subscription: Subscription,
    rows: KeyedScheduler<UnitId>,
    rebuild: ActionScheduler,
    state: Arc<Mutex<TreeState>>,
    events: Arc<AtomicU64>,
}

impl UnitTreePanel {
    pub const NAME: &'static str = "unit_tree";
    /// Config key of the row-patch window
    pub const ROWS: &'static str = "unit_tree_rows";
    /// Config key of the full-rebuild window
    pub const REBUILD: &'static str = "unit_tree_rebuild";

    fn attach(
        ui: &UiHandle,
        bus: &EventBus<CampaignEvent>,
        campaign: &SharedCampaign,
        config: &SchedulerConfig,
    ) -> Self {
        let state = Arc::new(Mutex::new(TreeState::default()));

        let rows = {
            let state = state.clone();
            let campaign = campaign.clone();
            KeyedScheduler::from_config(ui.clone(), config, Self::ROWS, move |units: Vec<UnitId>| {
                let patched = state.lock().refresh_rows(&campaign.read(), &units);
                debug!(scheduler = Self::ROWS, requested = units.len(), patched, "rows refreshed");
            })
        };

        let rebuild = {
            let state = state.clone();
            let campaign = campaign.clone();
            ActionScheduler::from_config(ui.clone(), config, Self::REBUILD, move || {
                state.lock().rebuild(&campaign.read());
                debug!(scheduler = Self::REBUILD, "tree rebuilt");
            })
        };

        let events = Arc::new(AtomicU64::new(0));
        let subscription = {
            let events = events.clone();
            let rows = rows.handle();
            let rebuild = rebuild.handle();
            bus.subscribe_topics(&[Topic::Units, Topic::Forces], move |event| {
                events.fetch_add(1, Ordering::Relaxed);
                if let Some(unit) = event.unit() {
                    rows.schedule(unit);
                } else if event.topic() == Topic::Forces {
                    rebuild.schedule();
                }
            })
        };

        debug!(panel = Self::NAME, sub_id = subscription.id(), "panel attached");
        rebuild.schedule();

        Self {
            _subscription: subscription,
            rows,
            rebuild,
            state,
            events,
        }
    }

    pub fn stats(&self) -> PanelStats {
        PanelStats {
            name: Self::NAME,
            events: self.events.load(Ordering::Relaxed),
            refreshes: self.rows.fire_count() + self.rebuild.fire_count(),
        }
    }
}

/// All panels of the campaign window
pub struct PanelSet {
    finances: Panel,
    personnel: Panel,
    daily_report: Panel,
    unit_tree: UnitTreePanel,
}

impl PanelSet {
    /// Subscribe every panel to `bus` and queue its first render
    pub fn attach(
        ui: &UiHandle,
        bus: &EventBus<CampaignEvent>,
        campaign: &SharedCampaign,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            finances: Panel::attach(
                "finances",
                &[Topic::Finances],
                ui,
                bus,
                campaign,
                config,
                render_finances,
            ),
            personnel: Panel::attach(
                "personnel",
                &[Topic::Personnel],
                ui,
                bus,
                campaign,
                config,
                render_personnel,
            ),
            daily_report: Panel::attach(
                "daily_report",
                &[Topic::Reports, Topic::Calendar],
                ui,
                bus,
                campaign,
                config,
                render_report,
            ),
            unit_tree: UnitTreePanel::attach(ui, bus, campaign, config),
        }
    }

    pub fn stats(&self) -> Vec<PanelStats> {
        vec![
            self.finances.stats(),
            self.personnel.stats(),
            self.daily_report.stats(),
            self.unit_tree.stats(),
        ]
    }

    /// Longest quiet window among the panels
    pub fn max_delay(&self) -> Duration {
        [
            self.finances.scheduler.delay(),
            self.personnel.scheduler.delay(),
            self.daily_report.scheduler.delay(),
            self.unit_tree.rows.delay(),
            self.unit_tree.rebuild.delay(),
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }

    /// Current text of every panel, read on the UI thread
    ///
    /// Runs behind any refresh already queued there.
    pub async fn views(&self, ui: &UiHandle) -> Result<Vec<(&'static str, String)>, DispatchError> {
        let panels: Vec<(&'static str, Arc<Mutex<String>>)> = [
            &self.finances,
            &self.personnel,
            &self.daily_report,
        ]
        .iter()
        .map(|panel| (panel.name(), panel.view.clone()))
        .collect();
        let tree = self.unit_tree.state.clone();

        ui.invoke(move || {
            let mut views: Vec<_> = panels
                .iter()
                .map(|(name, view)| (*name, view.lock().clone()))
                .collect();
            views.push((UnitTreePanel::NAME, tree.lock().rendered.clone()));
            views
        })
        .await
    }
}

fn render_finances(campaign: &Campaign) -> String {
    format!(
        "Funds: {}\nTransactions: {}\nLast: {}\n",
        format_cbills(campaign.funds),
        campaign.transactions,
        campaign.last_transaction.as_deref().unwrap_or("-"),
    )
}

fn render_personnel(campaign: &Campaign) -> String {
    let total = campaign.personnel.len();
    let wounded = campaign.personnel.values().filter(|p| p.wounded).count();
    let xp: u32 = campaign.personnel.values().map(|p| p.xp).sum();
    let operational = campaign
        .units
        .values()
        .filter(|u| u.status == UnitStatus::Operational)
        .count();
    format!(
        "Personnel: {} ({} wounded, {} total xp)\nOperational units: {}/{}\n",
        total,
        wounded,
        xp,
        operational,
        campaign.units.len(),
    )
}

fn render_report(campaign: &Campaign) -> String {
    let mut out = format!("{}\n", campaign.date);
    let skip = campaign.report.len().saturating_sub(REPORT_TAIL);
    for line in &campaign.report[skip..] {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}
