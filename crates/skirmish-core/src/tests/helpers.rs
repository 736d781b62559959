//! Shared fixtures: a standalone handler context, plugin activation on a
//! fresh bus, and constructors for lifecycle events.

use crate::bus::{DispatchReport, EventBus};
use crate::catalog::{Catalog, MapDef, MapId, ModeId};
use crate::event::{DamageSource, LifecycleEvent};
use crate::participant::{Participant, ParticipantId};
use crate::plugin::{PluginHandle, PluginManager};
use crate::roster::Roster;
use crate::tables::ResourceTables;
use crate::world::World;

// =============================================================================
// World Fixture
// =============================================================================

/// Owns everything a [`World`] borrows, so handlers can be driven directly
/// without a [`MatchSimulation`](crate::simulation::MatchSimulation).
pub struct Fixture {
    pub roster: Roster,
    pub catalog: Catalog,
    pub tables: ResourceTables,
    pub map: MapDef,
    pub tick: u64,
}

impl Fixture {
    /// Standard data on the `main` map.
    pub fn new() -> Self {
        Self::on_map("main")
    }

    /// Standard data on the named map. Maps missing from the standard
    /// catalog get default settings.
    pub fn on_map(map: &str) -> Self {
        let catalog = Catalog::standard();
        let map = catalog
            .map(&MapId::new(map))
            .cloned()
            .unwrap_or_else(|| MapDef::new(map));
        Self {
            roster: Roster::new(),
            catalog,
            tables: ResourceTables::standard(),
            map,
            tick: 0,
        }
    }

    /// Borrows the fixture as a handler context.
    pub fn world(&mut self) -> World<'_> {
        World {
            roster: &mut self.roster,
            catalog: &self.catalog,
            tables: &self.tables,
            map: &self.map,
            tick: self.tick,
        }
    }

    /// Publishes one event against the fixture.
    pub fn publish(&mut self, bus: &EventBus, event: &LifecycleEvent) -> DispatchReport {
        let mut world = self.world();
        bus.publish(event, &mut world)
    }

    /// Adds a participant and clears its initial dirty flags.
    pub fn join_clean(&mut self, name: &str) -> ParticipantId {
        let id = self.roster.join(name);
        if let Some(participant) = self.roster.get_mut(id) {
            participant.take_dirty();
        }
        id
    }

    /// Returns a participant that must exist.
    pub fn participant(&self, id: ParticipantId) -> &Participant {
        self.roster
            .get(id)
            .unwrap_or_else(|| panic!("participant {id} not in roster"))
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Activates `mode` on `map` against a fresh bus and seals it.
pub fn activate(manager: &PluginManager, mode: &str, map: &str) -> (EventBus, PluginHandle) {
    let mut bus = EventBus::new();
    let handle = manager
        .activate(&ModeId::new(mode), &MapId::new(map), &mut bus)
        .expect("activation succeeds");
    bus.seal();
    (bus, handle)
}

// =============================================================================
// Event Builders
// =============================================================================

pub fn joined(participant: ParticipantId) -> LifecycleEvent {
    LifecycleEvent::PlayerJoined { participant }
}

pub fn killed_by(victim: ParticipantId, killer: ParticipantId) -> LifecycleEvent {
    LifecycleEvent::PlayerKilled {
        victim,
        killer: Some(DamageSource::Participant(killer)),
        weapon: None,
    }
}

pub fn killed_by_environment(victim: ParticipantId) -> LifecycleEvent {
    LifecycleEvent::PlayerKilled {
        victim,
        killer: Some(DamageSource::Environment),
        weapon: None,
    }
}

pub fn damaged_by(victim: ParticipantId, source: ParticipantId, amount: f32) -> LifecycleEvent {
    LifecycleEvent::PlayerDamaged {
        victim,
        source: Some(DamageSource::Participant(source)),
        amount,
        weapon: None,
    }
}

pub fn environment_damage(victim: ParticipantId, amount: f32) -> LifecycleEvent {
    LifecycleEvent::PlayerDamaged {
        victim,
        source: Some(DamageSource::Environment),
        amount,
        weapon: None,
    }
}
