//! Simulate command - drive a campaign and watch the panels coalesce

use crate::campaign::Campaign;
use crate::panels::{PanelSet, SharedCampaign};
use crate::util;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use events::{EventBus, Topic};
use owo_colors::OwoColorize;
use parking_lot::RwLock;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use ui_core::UiThread;

/// Extra settle time after the longest quiet window
const SETTLE_MARGIN: Duration = Duration::from_millis(100);

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of campaign days to simulate
    #[arg(long, default_value = "10")]
    pub days: u32,

    /// Units in the roster (grouped into lances of four)
    #[arg(long, default_value = "12")]
    pub units: usize,

    /// People on the payroll
    #[arg(long, default_value = "40")]
    pub personnel: usize,

    /// Fight a scenario every N days (0 = never)
    #[arg(long, default_value = "3")]
    pub scenario_every: u32,

    /// Wall-clock pause between days in milliseconds
    #[arg(long, default_value = "150")]
    pub day_interval_ms: u64,

    /// Override scheduler.default_delay_ms for this run
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Campaign start date
    #[arg(long, default_value = "3025-01-01")]
    pub start: NaiveDate,

    /// Seed for scenario outcomes
    #[arg(long, default_value = "3025")]
    pub seed: u64,
}

pub async fn run(config_path: Option<&Path>, args: SimulateArgs) -> Result<()> {
    let (mut config, path) = util::load_config(config_path)?;
    if let Some(delay_ms) = args.delay_ms {
        config.scheduler.default_delay_ms = delay_ms;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        config = %path.display(),
        delay_ms = config.scheduler.default_delay_ms,
        days = args.days,
        "Starting simulation"
    );

    let ui = UiThread::spawn(&config.dispatch).context("Failed to start UI thread")?;
    let handle = ui.handle();
    let bus = EventBus::new();
    let campaign: SharedCampaign = Arc::new(RwLock::new(Campaign::new(
        args.start,
        args.units,
        args.personnel,
    )));
    let panels = PanelSet::attach(&handle, &bus, &campaign, &config.scheduler);

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut published = 0usize;
    let mut by_topic: BTreeMap<Topic, usize> = BTreeMap::new();
    let mut simulated = 0u32;

    for day in 1..=args.days {
        let mut events = campaign.write().advance_day();
        if args.scenario_every > 0 && day % args.scenario_every == 0 {
            events.extend(campaign.write().resolve_scenario(&mut rng));
        }

        debug!(day, events = events.len(), "Publishing day");
        for event in &events {
            *by_topic.entry(event.topic()).or_default() += 1;
            bus.publish(event);
        }
        published += events.len();
        simulated = day;

        if args.day_interval_ms > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(args.day_interval_ms)) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!(day, "Interrupted, stopping early");
                    break;
                }
            }
        }
    }

    // Let the final burst go quiet before reading the panels
    tokio::time::sleep(panels.max_delay() * 2 + SETTLE_MARGIN).await;

    let views = panels.views(&handle).await.context("UI thread went away")?;
    let stats = panels.stats();
    let dispatch = handle.stats();

    println!(
        "{} {} days ({} to {})",
        "Simulated".green().bold(),
        simulated,
        args.start,
        campaign.read().date
    );
    let breakdown: Vec<String> = Topic::ALL
        .iter()
        .map(|topic| format!("{} {}", topic, by_topic.get(topic).copied().unwrap_or(0)))
        .collect();
    println!(
        "{} {} events {}\n",
        "Published".green().bold(),
        published,
        format!("({})", breakdown.join(", ")).dimmed()
    );

    println!("{:<14} {:>8} {:>10}", "PANEL".bold(), "EVENTS".bold(), "REFRESHES".bold());
    for s in &stats {
        println!("{:<14} {:>8} {:>10}", s.name.cyan(), s.events, s.refreshes);
    }
    println!(
        "\n{} {} tasks, {} timers fired, {} cancelled, {} panics",
        "UI thread:".dimmed(),
        dispatch.executed,
        dispatch.timers_fired,
        dispatch.timers_cancelled,
        dispatch.panics
    );

    for (name, view) in &views {
        println!("\n{}", format!("[{}]", name).yellow());
        print!("{}", view);
    }

    drop(panels);
    tokio::task::spawn_blocking(move || ui.shutdown())
        .await
        .context("UI shutdown task failed")?
        .context("Failed to stop UI thread")?;

    Ok(())
}
