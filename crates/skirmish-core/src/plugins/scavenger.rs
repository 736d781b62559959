//! Scavenger mode: ammo is earned back, pain turns into adrenaline.
//!
//! - `PlayerKilled`: a participant killer's guns are topped up by the
//!   weapon's reload percentage (see [`ammo_to_give`](crate::tables::ammo_to_give)).
//!   Weapons with a zero percentage are left alone.
//! - `PlayerDamaged`: a victim hit by a participant gains boost in
//!   proportion to the damage taken.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::applied;
use crate::bus::HandlerResult;
use crate::error::BusError;
use crate::event::{EventKind, LifecycleEvent};
use crate::participant::WeaponSlot;
use crate::plugin::{GamePlugin, Listeners, PluginDeclaration};
use crate::world::World;

/// Scavenger tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScavengerConfig {
    /// Boost gained per point of damage taken.
    pub boost_per_damage: f32,
}

impl Default for ScavengerConfig {
    fn default() -> Self {
        Self {
            boost_per_damage: 0.25,
        }
    }
}

/// Ammo economy mode.
pub struct ScavengerPlugin {
    declaration: PluginDeclaration,
    config: Arc<ScavengerConfig>,
}

impl ScavengerPlugin {
    /// Mode identifier the plugin is registered under.
    pub const MODE: &'static str = "scavenger";

    /// Creates a new `ScavengerPlugin`.
    #[must_use]
    pub fn new(config: Arc<ScavengerConfig>) -> Self {
        Self {
            declaration: PluginDeclaration::new(
                Self::MODE,
                &[EventKind::PlayerKilled, EventKind::PlayerDamaged],
            ),
            config,
        }
    }
}

impl GamePlugin for ScavengerPlugin {
    fn declaration(&self) -> &PluginDeclaration {
        &self.declaration
    }

    fn init_listeners(&self, listeners: &mut Listeners<'_>) -> Result<(), BusError> {
        listeners.on(EventKind::PlayerKilled, top_up_killer)?;
        let config = Arc::clone(&self.config);
        listeners.on(EventKind::PlayerDamaged, move |event, world| {
            adrenaline(&config, event, world)
        })?;
        Ok(())
    }
}

fn top_up_killer(event: &LifecycleEvent, world: &mut World<'_>) -> HandlerResult {
    let Some(id) = event.attacker() else {
        return Ok(());
    };
    let (catalog, tables) = (world.catalog, world.tables);
    let Some(killer) = world.participant_mut(id) else {
        debug!(participant = %id, "killer not in roster");
        return Ok(());
    };
    for slot in WeaponSlot::GUNS {
        if !killer.weapon(slot).is_empty() {
            applied(killer.top_up(slot, catalog, tables), id, "top up");
        }
    }
    Ok(())
}

fn adrenaline(config: &ScavengerConfig, event: &LifecycleEvent, world: &mut World<'_>) -> HandlerResult {
    let LifecycleEvent::PlayerDamaged { victim, amount, .. } = event else {
        return Ok(());
    };
    if event.attacker().is_none() || !amount.is_finite() || *amount <= 0.0 {
        return Ok(());
    }
    if let Some(victim) = world.participant_mut(*victim) {
        victim.add_boost(amount * config.boost_per_damage);
    }
    Ok(())
}
