//! Built-in game-mode plugins.
//!
//! - [`DeathmatchPlugin`]: fixed loadout on join, perk stripping and kill
//!   rewards on death
//! - [`ScavengerPlugin`]: partial ammo top-ups for killers and adrenaline on
//!   damage
//!
//! # Registration
//!
//! Use [`PluginManager::with_builtin_modes`] to create a manager with both
//! modes registered from a [`ModesConfig`].

mod deathmatch;
mod scavenger;

pub use deathmatch::{DeathmatchConfig, DeathmatchPlugin, ItemGrant, LoadoutWeapon, Quantity};
pub use scavenger::{ScavengerConfig, ScavengerPlugin};

use std::sync::Arc;

use tracing::warn;

use crate::config::ModesConfig;
use crate::error::StateError;
use crate::participant::ParticipantId;
use crate::plugin::{MapSelector, PluginManager};

impl PluginManager {
    /// Creates a manager with the built-in modes registered.
    ///
    /// Deathmatch is registered for its configured map only; scavenger for
    /// every map.
    #[must_use]
    pub fn with_builtin_modes(modes: &ModesConfig) -> Self {
        let mut manager = Self::new();

        let deathmatch = Arc::new(modes.deathmatch.clone());
        manager.register(
            DeathmatchPlugin::MODE,
            MapSelector::Only(deathmatch.map.clone()),
            move || Box::new(DeathmatchPlugin::new(Arc::clone(&deathmatch))),
        );

        let scavenger = Arc::new(modes.scavenger.clone());
        manager.register(ScavengerPlugin::MODE, MapSelector::Any, move || {
            Box::new(ScavengerPlugin::new(Arc::clone(&scavenger)))
        });

        manager
    }
}

/// Logs a rejected participant mutation and converts it to `None`.
///
/// Handlers treat invalid identifiers as a no-op for that step and carry on
/// with the rest of the event.
fn applied<T>(result: Result<T, StateError>, participant: ParticipantId, step: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%participant, step, error = %err, "mutation rejected");
            None
        }
    }
}
