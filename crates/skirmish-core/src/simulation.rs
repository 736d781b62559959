//! Match simulation: the tick loop that publishes lifecycle events.
//!
//! `MatchSimulation` stands in for the game server's simulation core. It
//! owns one match's roster and event bus, activates the mode plugin when the
//! match is created, and publishes queued lifecycle events once per tick:
//!
//! 1. **QUEUE**: `join`, `kill` and `damage` record transitions in arrival
//!    order. `join` creates the participant first, so handlers always see
//!    the record.
//! 2. **PUBLISH**: `step` publishes every queued event FIFO. Each publish is
//!    isolated; a faulting handler affects only its own event.
//! 3. **SYNC**: dirty flags are drained into the [`TickReport`] for the
//!    transport layer, and the tick counter advances.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use skirmish_core::catalog::Catalog;
//! use skirmish_core::config::{MatchConfig, ModesConfig};
//! use skirmish_core::participant::WeaponSlot;
//! use skirmish_core::plugin::PluginManager;
//! use skirmish_core::simulation::MatchSimulation;
//! use skirmish_core::tables::ResourceTables;
//!
//! let plugins = PluginManager::with_builtin_modes(&ModesConfig::default());
//! let mut sim = MatchSimulation::new(
//!     MatchConfig::new("deathmatch", "main"),
//!     Arc::new(Catalog::standard()),
//!     Arc::new(ResourceTables::standard()),
//!     &plugins,
//! )
//! .unwrap();
//!
//! let ada = sim.join("ada");
//! let report = sim.step();
//! assert_eq!(report.tick, 0);
//! assert_eq!(report.faults(), 0);
//! assert_eq!(sim.participant(ada).unwrap().current_slot(), WeaponSlot::Primary);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bus::{DispatchReport, EventBus};
use crate::catalog::{Catalog, ItemId, MapDef};
use crate::config::MatchConfig;
use crate::error::BusError;
use crate::event::{DamageSource, LifecycleEvent};
use crate::participant::{DirtyFlags, Participant, ParticipantId};
use crate::plugin::{PluginHandle, PluginManager};
use crate::roster::Roster;
use crate::tables::ResourceTables;
use crate::world::World;

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick that was processed.
    pub tick: u64,
    /// One report per published event, in publish order.
    pub dispatched: Vec<DispatchReport>,
    /// Participants whose state changed, with what changed.
    pub synced: Vec<(ParticipantId, DirtyFlags)>,
}

impl TickReport {
    /// Number of publishes aborted by a handler fault.
    #[must_use]
    pub fn faults(&self) -> usize {
        self.dispatched.iter().filter(|report| !report.is_clean()).count()
    }
}

/// One running match.
pub struct MatchSimulation {
    config: MatchConfig,
    catalog: Arc<Catalog>,
    tables: Arc<ResourceTables>,
    map: MapDef,
    roster: Roster,
    bus: EventBus,
    plugin: Option<PluginHandle>,
    pending: VecDeque<LifecycleEvent>,
    tick: u64,
}

impl fmt::Debug for MatchSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchSimulation")
            .field("config", &self.config)
            .field("map", &self.map)
            .field("roster", &self.roster)
            .field("bus", &self.bus)
            .field("plugin", &self.plugin)
            .field("pending", &self.pending.len())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl MatchSimulation {
    /// Creates a match, activates its plugin and closes the bus to further
    /// subscriptions.
    ///
    /// A map missing from the catalog runs with default map settings.
    ///
    /// # Errors
    ///
    /// Any [`BusError`] raised while the plugin subscribes its handlers.
    pub fn new(
        config: MatchConfig,
        catalog: Arc<Catalog>,
        tables: Arc<ResourceTables>,
        plugins: &PluginManager,
    ) -> Result<Self, BusError> {
        let map = catalog.map(&config.map).cloned().unwrap_or_else(|| {
            debug!(map = %config.map, "map not in catalog; using default map settings");
            MapDef {
                id: config.map.clone(),
                ..MapDef::default()
            }
        });

        let mut bus = EventBus::new();
        let handle = plugins.activate(&config.mode, &config.map, &mut bus)?;
        bus.seal();
        info!(mode = %config.mode, map = %config.map, plugin = %handle.plugin(), "match started");

        Ok(Self {
            config,
            catalog,
            tables,
            map,
            roster: Roster::new(),
            bus,
            plugin: Some(handle),
            pending: VecDeque::new(),
            tick: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Creates a participant at default state and queues its join event.
    pub fn join(&mut self, name: &str) -> ParticipantId {
        let id = self.roster.join(name);
        self.pending
            .push_back(LifecycleEvent::PlayerJoined { participant: id });
        id
    }

    /// Queues a kill. Returns `false` and queues nothing if the victim is
    /// not in the match.
    pub fn kill(
        &mut self,
        victim: ParticipantId,
        killer: Option<DamageSource>,
        weapon: Option<ItemId>,
    ) -> bool {
        self.enqueue(LifecycleEvent::PlayerKilled {
            victim,
            killer,
            weapon,
        })
    }

    /// Queues damage. Returns `false` and queues nothing if the victim is
    /// not in the match.
    pub fn damage(
        &mut self,
        victim: ParticipantId,
        source: Option<DamageSource>,
        amount: f32,
        weapon: Option<ItemId>,
    ) -> bool {
        self.enqueue(LifecycleEvent::PlayerDamaged {
            victim,
            source,
            amount,
            weapon,
        })
    }

    fn enqueue(&mut self, event: LifecycleEvent) -> bool {
        if !self.roster.contains(event.primary_participant()) {
            debug!(participant = %event.primary_participant(), kind = %event.kind(), "event for unknown participant dropped");
            return false;
        }
        self.pending.push_back(event);
        true
    }

    /// Removes a participant immediately. Queued events that name it reach
    /// handlers as unknown participants.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        self.roster.leave(id)
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Publishes every queued event in order, then drains dirty flags.
    #[tracing::instrument(level = "debug", skip_all, fields(mode = %self.config.mode, tick = self.tick))]
    pub fn step(&mut self) -> TickReport {
        let tick = self.tick;
        let mut dispatched = Vec::with_capacity(self.pending.len());

        while let Some(event) = self.pending.pop_front() {
            let mut world = World {
                roster: &mut self.roster,
                catalog: self.catalog.as_ref(),
                tables: self.tables.as_ref(),
                map: &self.map,
                tick,
            };
            dispatched.push(self.bus.publish(&event, &mut world));
        }

        let synced = self.roster.drain_dirty();
        self.tick += 1;
        TickReport {
            tick,
            dispatched,
            synced,
        }
    }

    /// Detaches the plugin mid-match. Events published afterwards reach no
    /// handler of it. Returns how many handlers were removed.
    pub fn deactivate_plugin(&mut self) -> usize {
        self.plugin
            .take()
            .map_or(0, |handle| handle.detach(&mut self.bus))
    }

    /// Ends the match: detaches the plugin and returns the final roster.
    pub fn end(mut self) -> Roster {
        self.deactivate_plugin();
        info!(mode = %self.config.mode, map = %self.config.map, ticks = self.tick, "match ended");
        self.roster
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Returns the match configuration.
    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Returns the next tick to be processed.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns the roster.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Returns a participant by identifier.
    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.roster.get(id)
    }

    /// Returns a participant mutably, for game logic outside the plugin.
    #[must_use]
    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.roster.get_mut(id)
    }

    /// Returns the active plugin, if still attached.
    #[must_use]
    pub const fn plugin(&self) -> Option<&PluginHandle> {
        self.plugin.as_ref()
    }

    /// Returns the event bus.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the static definitions.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Number of events waiting for the next tick.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
