//! Headless match runner.
//!
//! Opens every configured match, fills it with scripted players and plays a
//! fixed number of rounds of damage and kills, then prints a JSON summary.
//!
//! ```text
//! skirmish-simtest [config.json]
//! RUST_LOG=skirmish_core=debug skirmish-simtest
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use skirmish_core::event::DamageSource;
use skirmish_core::host::MatchHost;
use skirmish_core::simulation::TickReport;
use skirmish_core::{Participant, ParticipantId, PluginManager, SimConfig};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

/// Damage dealt by the scripted attacker before each kill.
const ROUND_DAMAGE: f32 = 30.0;

#[derive(Debug, Serialize)]
struct MatchSummary {
    mode: String,
    map: String,
    plugin: String,
    ticks: u64,
    events: usize,
    faults: usize,
    participants: Vec<Participant>,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config() -> Result<SimConfig> {
    match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => SimConfig::from_path(&path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(SimConfig::default()),
    }
}

/// Queues one round: the victim rotates through the roster and is hit and
/// then killed by the next participant.
fn queue_round(host: &mut MatchHost, players: &[Vec<ParticipantId>], round: u32) {
    for (sim, ids) in host.iter_mut().zip(players) {
        let round = round as usize;
        let victim = ids[round % ids.len()];
        let killer = ids[(round + 1) % ids.len()];
        sim.damage(victim, Some(DamageSource::Participant(killer)), ROUND_DAMAGE, None);
        sim.kill(victim, Some(DamageSource::Participant(killer)), None);
    }
}

fn tally(reports: &[TickReport], events: &mut [usize], faults: &mut [usize]) {
    for (index, report) in reports.iter().enumerate() {
        events[index] += report.dispatched.len();
        faults[index] += report.faults();
    }
}

fn main() -> Result<()> {
    init_tracing();
    let config = load_config()?;

    let catalog = Arc::new(config.load_catalog().context("loading catalog")?);
    let tables = Arc::new(config.load_tables().context("loading resource tables")?);
    let plugins = PluginManager::with_builtin_modes(&config.modes);
    let mut host = MatchHost::new(catalog, tables);

    let mut players = Vec::with_capacity(config.matches.len());
    for match_config in &config.matches {
        let index = host
            .open(match_config.clone(), &plugins)
            .with_context(|| format!("opening {} on {}", match_config.mode, match_config.map))?;
        let sim = host
            .get_mut(index)
            .context("match missing right after opening")?;
        let ids: Vec<_> = (0..config.players_per_match)
            .map(|n| sim.join(&format!("bot-{n}")))
            .collect();
        players.push(ids);
    }
    info!(
        matches = host.len(),
        players = config.players_per_match,
        rounds = config.rounds,
        "matches opened"
    );

    let mut events = vec![0; host.len()];
    let mut faults = vec![0; host.len()];
    tally(&host.step_all(), &mut events, &mut faults);
    for round in 0..config.rounds {
        queue_round(&mut host, &players, round);
        tally(&host.step_all(), &mut events, &mut faults);
    }

    let mut summaries = Vec::with_capacity(host.len());
    for (index, sim) in host.iter_mut().enumerate() {
        if faults[index] > 0 {
            warn!(mode = %sim.config().mode, faults = faults[index], "match had handler faults");
        }
        summaries.push(MatchSummary {
            mode: sim.config().mode.to_string(),
            map: sim.config().map.to_string(),
            plugin: sim
                .plugin()
                .map_or_else(|| "none".to_string(), |handle| handle.plugin().to_string()),
            ticks: sim.tick(),
            events: events[index],
            faults: faults[index],
            participants: Vec::new(),
        });
    }
    for (summary, roster) in summaries.iter_mut().zip(host.close_all()) {
        summary.participants = roster.iter().cloned().collect();
    }

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
