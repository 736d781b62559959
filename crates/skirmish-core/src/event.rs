//! Lifecycle events published by the simulation core.
//!
//! Events are immutable values. They name participants by
//! [`ParticipantId`]; handlers reach the mutable records through the
//! [`World`](crate::world::World) passed alongside the event.
//!
//! # Example
//!
//! ```
//! use skirmish_core::event::{DamageSource, EventKind, LifecycleEvent};
//! use skirmish_core::participant::ParticipantId;
//! use skirmish_core::catalog::ItemId;
//!
//! let event = LifecycleEvent::PlayerKilled {
//!     victim: ParticipantId::new(2),
//!     killer: Some(DamageSource::Participant(ParticipantId::new(1))),
//!     weapon: Some(ItemId::new("mosin")),
//! };
//!
//! assert_eq!(event.kind(), EventKind::PlayerKilled);
//! assert_eq!(event.primary_participant(), ParticipantId::new(2));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::ItemId;
use crate::participant::ParticipantId;

/// Discriminant of a [`LifecycleEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A participant entered the match.
    PlayerJoined,
    /// A participant was killed.
    PlayerKilled,
    /// A participant took damage.
    PlayerDamaged,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [Self; 3] = [Self::PlayerJoined, Self::PlayerKilled, Self::PlayerDamaged];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerJoined => write!(f, "PlayerJoined"),
            Self::PlayerKilled => write!(f, "PlayerKilled"),
            Self::PlayerDamaged => write!(f, "PlayerDamaged"),
        }
    }
}

/// What dealt damage or a killing blow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageSource {
    /// Another participant (or the victim itself).
    Participant(ParticipantId),
    /// Gas, falling, obstacles and other non-player sources.
    Environment,
}

impl DamageSource {
    /// Returns the participant behind this source, if any.
    #[must_use]
    pub const fn participant(self) -> Option<ParticipantId> {
        match self {
            Self::Participant(id) => Some(id),
            Self::Environment => None,
        }
    }
}

/// A lifecycle transition of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// The participant record exists and has default state.
    PlayerJoined {
        /// Joining participant.
        participant: ParticipantId,
    },
    /// The participant was killed.
    PlayerKilled {
        /// Participant that died.
        victim: ParticipantId,
        /// Source of the killing blow, if known.
        killer: Option<DamageSource>,
        /// Weapon used, if any.
        weapon: Option<ItemId>,
    },
    /// The participant took damage.
    PlayerDamaged {
        /// Participant that was hit.
        victim: ParticipantId,
        /// Source of the damage, if known.
        source: Option<DamageSource>,
        /// Damage amount.
        amount: f32,
        /// Weapon used, if any.
        weapon: Option<ItemId>,
    },
}

impl LifecycleEvent {
    /// Returns the subscription key of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PlayerJoined { .. } => EventKind::PlayerJoined,
            Self::PlayerKilled { .. } => EventKind::PlayerKilled,
            Self::PlayerDamaged { .. } => EventKind::PlayerDamaged,
        }
    }

    /// Returns the participant the event is about.
    #[must_use]
    pub const fn primary_participant(&self) -> ParticipantId {
        match self {
            Self::PlayerJoined { participant } => *participant,
            Self::PlayerKilled { victim, .. } | Self::PlayerDamaged { victim, .. } => *victim,
        }
    }

    /// Returns the participant credited with a kill or damage, if any.
    #[must_use]
    pub fn attacker(&self) -> Option<ParticipantId> {
        match self {
            Self::PlayerJoined { .. } => None,
            Self::PlayerKilled { killer, .. } => killer.and_then(DamageSource::participant),
            Self::PlayerDamaged { source, .. } => source.and_then(DamageSource::participant),
        }
    }
}
