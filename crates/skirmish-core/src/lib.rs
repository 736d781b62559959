//! # Skirmish Core
//!
//! Combat-state engine for an authoritative multiplayer game server.
//!
//! This crate tracks each participant's weapons, inventory, armor and perks,
//! and lets game-mode plugins react to lifecycle events without touching the
//! simulation core.
//!
//! ## Architecture
//!
//! - **Static data**: [`catalog`] definitions and [`tables`] (capacity tiers,
//!   reload percentages), loaded once and shared across matches
//! - **State**: [`participant`] records stored in a per-match [`roster`]
//! - **Events**: [`event`] values published on an [`bus::EventBus`]
//! - **Modes**: [`plugin`] trait and manager, built-in [`plugins`]
//! - **Driver**: [`simulation::MatchSimulation`] and [`host::MatchHost`]
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use skirmish_core::{Catalog, MatchConfig, MatchSimulation, ModesConfig, PluginManager, ResourceTables};
//! use skirmish_core::event::DamageSource;
//!
//! let plugins = PluginManager::with_builtin_modes(&ModesConfig::default());
//! let mut sim = MatchSimulation::new(
//!     MatchConfig::new("deathmatch", "main"),
//!     Arc::new(Catalog::standard()),
//!     Arc::new(ResourceTables::standard()),
//!     &plugins,
//! )?;
//!
//! let ada = sim.join("ada");
//! let bob = sim.join("bob");
//! sim.kill(ada, Some(DamageSource::Participant(bob)), None);
//! let report = sim.step();
//!
//! assert_eq!(report.dispatched.len(), 3);
//! assert!(sim.participant(ada).unwrap().perks().is_empty());
//! # Ok::<(), skirmish_core::error::BusError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bus;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod participant;
pub mod plugin;
pub mod plugins;
pub mod roster;
pub mod simulation;
pub mod tables;
pub mod world;

pub use bus::EventBus;
pub use catalog::Catalog;
pub use config::{MatchConfig, ModesConfig, SimConfig};
pub use event::LifecycleEvent;
pub use participant::{Participant, ParticipantId};
pub use plugin::{GamePlugin, PluginManager};
pub use simulation::MatchSimulation;
pub use tables::ResourceTables;

#[cfg(test)]
mod tests;
