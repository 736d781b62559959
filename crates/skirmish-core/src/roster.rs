//! Roster of participants in one match.
//!
//! The roster is the container for every [`Participant`] in a match. It
//! provides:
//! - Participant storage with deterministic iteration order (`BTreeMap`)
//! - Monotonic identifier assignment
//! - Join/leave lifecycle
//!
//! # Ownership
//!
//! A roster belongs to exactly one match and is only touched from that
//! match's tick. It is `Send` so matches can be stepped on worker threads,
//! but it is never shared between matches.
//!
//! # Example
//!
//! ```
//! use skirmish_core::roster::Roster;
//!
//! let mut roster = Roster::new();
//! let ada = roster.join("ada");
//! let bob = roster.join("bob");
//!
//! let ids: Vec<_> = roster.ids_sorted().collect();
//! assert_eq!(ids, vec![ada, bob]);
//! assert_eq!(roster.get(ada).unwrap().name(), "ada");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::participant::{DirtyFlags, Participant, ParticipantId};

/// Participants of a single match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    /// Monotonically increasing identifier counter.
    next_id: u64,
    /// Participant storage with deterministic iteration order.
    participants: BTreeMap<ParticipantId, Participant>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            participants: BTreeMap::new(),
        }
    }

    /// Creates a participant at default state and returns its identifier.
    ///
    /// Identifiers are never reused within a roster, even after leaves.
    pub fn join(&mut self, name: &str) -> ParticipantId {
        let id = ParticipantId::new(self.next_id);
        self.next_id += 1;
        self.participants.insert(id, Participant::new(id, name));
        id
    }

    /// Removes a participant, returning its final state.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        self.participants.remove(&id)
    }

    /// Returns a participant by identifier.
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    /// Returns a participant mutably by identifier.
    #[must_use]
    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    /// Returns `true` if the participant is present.
    #[must_use]
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Iterates over participant identifiers in ascending order.
    pub fn ids_sorted(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participants.keys().copied()
    }

    /// Iterates over participants in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns `true` if no participants are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Drains dirty flags from every participant, skipping clean ones.
    ///
    /// This is the transport side of the dirty-flag contract: the returned
    /// list says what to serialize; the participants are clean afterwards.
    pub fn drain_dirty(&mut self) -> Vec<(ParticipantId, DirtyFlags)> {
        self.participants
            .values_mut()
            .filter_map(|participant| {
                let flags = participant.take_dirty();
                (!flags.is_empty()).then_some((participant.id(), flags))
            })
            .collect()
    }
}
