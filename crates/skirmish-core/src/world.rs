//! Handler context passed alongside every published event.
//!
//! A [`World`] borrows the match's roster mutably and the shared read-only
//! data immutably for the duration of one publish call. Because the borrow
//! ends when the publish returns, a handler cannot keep references to
//! participants across events.

use crate::catalog::{Catalog, MapDef};
use crate::participant::{Participant, ParticipantId};
use crate::roster::Roster;
use crate::tables::ResourceTables;

/// Everything a handler may read or mutate during one publish call.
#[derive(Debug)]
pub struct World<'a> {
    /// Participants of the match.
    pub roster: &'a mut Roster,
    /// Static definitions.
    pub catalog: &'a Catalog,
    /// Capacity and reload tables.
    pub tables: &'a ResourceTables,
    /// Definition of the map the match runs on.
    pub map: &'a MapDef,
    /// Current match tick.
    pub tick: u64,
}

impl World<'_> {
    /// Returns a participant by identifier.
    #[must_use]
    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.roster.get(id)
    }

    /// Returns a participant mutably by identifier.
    #[must_use]
    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.roster.get_mut(id)
    }
}
