//! Error types for the combat-state engine.
//!
//! Errors are split by the layer that produces them:
//!
//! - [`StateError`]: a participant mutation was rejected (unknown identifier,
//!   wrong slot, duplicate perk). The participant is left unchanged.
//! - [`BusError`]: a structural contract violation at registration time
//!   (subscribing after match start, subscribing to an undeclared event).
//! - [`ConfigError`]: static definitions, resource tables, or configuration
//!   could not be loaded.
//!
//! Capacity overflow is deliberately absent: inventory writes clamp instead
//! of failing.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::{ItemId, PerkId};
use crate::event::EventKind;
use crate::participant::WeaponSlot;
use crate::plugin::PluginId;

/// A rejected mutation of participant combat state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The identifier is absent from the static definitions or tables.
    #[error("unknown item `{0}`")]
    UnknownItem(ItemId),

    /// The item exists but cannot occupy the requested weapon slot.
    #[error("item `{item}` cannot be placed in the {slot} slot")]
    WrongSlot {
        /// Offending item.
        item: ItemId,
        /// Requested slot.
        slot: WeaponSlot,
    },

    /// The slot holds no item.
    #[error("{0} slot is empty")]
    EmptySlot(WeaponSlot),

    /// The slot holds something other than a gun.
    #[error("item `{0}` is not a gun")]
    NotAGun(ItemId),

    /// The item is not armor.
    #[error("item `{0}` is not armor")]
    NotArmor(ItemId),

    /// The item is not a scope.
    #[error("item `{0}` is not a scope")]
    NotAScope(ItemId),

    /// The perk is absent from the static definitions.
    #[error("unknown perk `{0}`")]
    UnknownPerk(PerkId),

    /// The participant already holds this perk.
    #[error("perk `{0}` already held")]
    DuplicatePerk(PerkId),

    /// The participant does not hold this perk.
    #[error("perk `{0}` not held")]
    PerkNotHeld(PerkId),
}

/// A rejected handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The match has started; no further subscriptions are accepted.
    #[error("event bus is sealed; subscriptions close when the match starts")]
    Sealed,

    /// The plugin subscribed to an event kind it did not declare.
    #[error("plugin `{plugin}` subscribed to undeclared event {kind}")]
    UndeclaredEvent {
        /// Plugin that attempted the subscription.
        plugin: PluginId,
        /// Event kind it attempted to subscribe to.
        kind: EventKind,
    },
}

/// Failure to load definitions, tables, or configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON for the expected shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but is internally inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Reads a JSON document from disk, mapping failures to [`ConfigError`].
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}
