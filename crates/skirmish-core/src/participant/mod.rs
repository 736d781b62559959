//! Participant combat state.
//!
//! A [`Participant`] is the mutable per-player record: weapon slots,
//! inventory counts, armor, perks, scope and boost. It is created when a
//! player joins a match and dropped when the player leaves or the match ends.
//!
//! # Ownership
//!
//! Participants live in a [`Roster`](crate::roster::Roster) owned by exactly
//! one match. Only that match's tick, and the plugin handlers it invokes
//! synchronously, ever mutate them.
//!
//! # Invariants
//!
//! - The current weapon selection references a populated slot, except during
//!   the single-tick transition created by [`Participant::force_select`].
//! - No inventory count exceeds the cap for the participant's current
//!   backpack tier. Writes beyond the cap clamp silently.
//! - Perks are unique by identifier and are added or removed whole.
//! - Boost stays within `0.0..=100.0`.
//!
//! Every mutator sets the matching [`DirtyFlags`] bit. The transport layer
//! drains them with [`Participant::take_dirty`] after synchronizing.
//!
//! # Example
//!
//! ```
//! use skirmish_core::catalog::{Catalog, ItemId};
//! use skirmish_core::participant::{DirtyFlags, Participant, ParticipantId, WeaponSlot};
//! use skirmish_core::tables::ResourceTables;
//!
//! let catalog = Catalog::standard();
//! let tables = ResourceTables::standard();
//! let mut player = Participant::new(ParticipantId::new(1), "ada");
//! player.take_dirty();
//!
//! player.set_weapon(WeaponSlot::Primary, &ItemId::new("ak47"), 10, &catalog).unwrap();
//! player.select_weapon(WeaponSlot::Primary).unwrap();
//!
//! // Tier-0 backpack holds at most 3 frags.
//! let held = player.give_item(&ItemId::new("frag"), 10, &tables).unwrap();
//! assert_eq!(held, 3);
//! assert!(player.dirty().contains(DirtyFlags::WEAPONS | DirtyFlags::INVENTORY));
//! ```

pub mod components;

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::catalog::{ArmorSlotKind, Catalog, ItemDef, ItemId, PerkId, Tier};
use crate::error::StateError;
use crate::tables::{ammo_to_give, ResourceTables};

pub use components::{
    Armor, ArmorSlot, Inventory, Perk, PerkSet, WeaponSlot, WeaponSlots, WeaponState,
};

/// Melee weapon every participant starts with.
pub const DEFAULT_MELEE: &str = "fists";

/// Scope every participant starts with.
pub const DEFAULT_SCOPE: &str = "1xscope";

/// Upper bound of the boost meter.
pub const MAX_BOOST: f32 = 100.0;

/// Unique identifier of a participant within a match.
///
/// Identifiers are assigned monotonically by the roster and order
/// participants deterministically.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(u64);

impl ParticipantId {
    /// Creates a `ParticipantId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

bitflags! {
    /// Which parts of a participant changed since the last synchronization.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DirtyFlags: u8 {
        /// Inventory counts changed.
        const INVENTORY = 1 << 0;
        /// Weapon slots or the current selection changed.
        const WEAPONS = 1 << 1;
        /// Armor slots changed.
        const ARMOR = 1 << 2;
        /// Perk set changed.
        const PERKS = 1 << 3;
        /// Scope or boost changed.
        const STATS = 1 << 4;
    }
}

/// One player's combat state within a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    id: ParticipantId,
    name: String,
    weapons: WeaponSlots,
    inventory: Inventory,
    armor: Armor,
    perks: PerkSet,
    scope: ItemId,
    boost: f32,
    #[serde(skip, default = "DirtyFlags::all")]
    dirty: DirtyFlags,
}

impl Participant {
    /// Creates a participant at zeroed defaults: fists selected, empty
    /// inventory, no armor, no perks, 1x scope, no boost.
    ///
    /// Every dirty flag starts set so the first synchronization sends the
    /// full record.
    #[must_use]
    pub fn new(id: ParticipantId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            weapons: WeaponSlots::with_melee(ItemId::new(DEFAULT_MELEE)),
            inventory: Inventory::default(),
            armor: Armor::default(),
            perks: PerkSet::default(),
            scope: ItemId::new(DEFAULT_SCOPE),
            boost: 0.0,
            dirty: DirtyFlags::all(),
        }
    }

    /// Returns the participant's identifier.
    #[must_use]
    pub const fn id(&self) -> ParticipantId {
        self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // -------------------------------------------------------------------------
    // Weapons
    // -------------------------------------------------------------------------

    /// Returns all weapon slots.
    #[must_use]
    pub const fn weapons(&self) -> &WeaponSlots {
        &self.weapons
    }

    /// Returns the state of one weapon slot.
    #[must_use]
    pub fn weapon(&self, slot: WeaponSlot) -> &WeaponState {
        self.weapons.get(slot)
    }

    /// Returns the currently selected slot.
    #[must_use]
    pub const fn current_slot(&self) -> WeaponSlot {
        self.weapons.current()
    }

    /// Places `item` in `slot` with `ammo` loaded and no cooldown.
    ///
    /// # Errors
    ///
    /// - [`StateError::UnknownItem`] if the catalog does not define `item`
    /// - [`StateError::WrongSlot`] if the item cannot occupy `slot`
    ///
    /// The slot is unchanged on error.
    pub fn set_weapon(
        &mut self,
        slot: WeaponSlot,
        item: &ItemId,
        ammo: u32,
        catalog: &Catalog,
    ) -> Result<(), StateError> {
        let def = catalog
            .item(item)
            .ok_or_else(|| StateError::UnknownItem(item.clone()))?;
        let fits = match def {
            ItemDef::Gun(_) => WeaponSlot::GUNS.contains(&slot),
            ItemDef::Melee => slot == WeaponSlot::Melee,
            ItemDef::Throwable => slot == WeaponSlot::Throwable,
            _ => false,
        };
        if !fits {
            return Err(StateError::WrongSlot {
                item: item.clone(),
                slot,
            });
        }
        *self.weapons.get_mut(slot) = WeaponState::holding(item.clone(), ammo);
        self.dirty |= DirtyFlags::WEAPONS;
        Ok(())
    }

    /// Empties `slot`, zeroing ammo and cooldown.
    ///
    /// If the cleared slot was selected, the selection falls back to melee.
    /// Returns the previous contents.
    pub fn clear_weapon(&mut self, slot: WeaponSlot) -> WeaponState {
        let state = self.weapons.get_mut(slot);
        let previous = state.clone();
        state.clear();
        if self.weapons.current() == slot && slot != WeaponSlot::Melee {
            self.weapons.set_current(WeaponSlot::Melee);
        }
        self.dirty |= DirtyFlags::WEAPONS;
        previous
    }

    /// Selects a populated slot.
    ///
    /// # Errors
    ///
    /// [`StateError::EmptySlot`] if the slot holds nothing; the selection is
    /// unchanged.
    pub fn select_weapon(&mut self, slot: WeaponSlot) -> Result<(), StateError> {
        if self.weapons.get(slot).is_empty() {
            return Err(StateError::EmptySlot(slot));
        }
        self.weapons.set_current(slot);
        self.dirty |= DirtyFlags::WEAPONS;
        Ok(())
    }

    /// Selects a slot without checking that it is populated.
    ///
    /// Used for the transition after death or a mode-forced reset, where the
    /// selection may briefly point at an empty slot.
    pub fn force_select(&mut self, slot: WeaponSlot) {
        self.weapons.set_current(slot);
        self.dirty |= DirtyFlags::WEAPONS;
    }

    /// Overwrites the loaded ammo of an occupied slot. Item and cooldown are
    /// preserved.
    ///
    /// # Errors
    ///
    /// [`StateError::EmptySlot`] if the slot holds nothing.
    pub fn set_ammo(&mut self, slot: WeaponSlot, ammo: u32) -> Result<(), StateError> {
        let weapon = self.weapons.get_mut(slot);
        if weapon.is_empty() {
            return Err(StateError::EmptySlot(slot));
        }
        weapon.ammo = ammo;
        self.dirty |= DirtyFlags::WEAPONS;
        Ok(())
    }

    /// Sets the remaining cooldown of an occupied slot.
    ///
    /// # Errors
    ///
    /// [`StateError::EmptySlot`] if the slot holds nothing.
    pub fn set_cooldown(&mut self, slot: WeaponSlot, cooldown: Duration) -> Result<(), StateError> {
        let weapon = self.weapons.get_mut(slot);
        if weapon.is_empty() {
            return Err(StateError::EmptySlot(slot));
        }
        weapon.cooldown = cooldown;
        self.dirty |= DirtyFlags::WEAPONS;
        Ok(())
    }

    fn gun_in(&self, slot: WeaponSlot, catalog: &Catalog) -> Result<(ItemId, u32), StateError> {
        let item = self
            .weapons
            .get(slot)
            .item
            .clone()
            .ok_or(StateError::EmptySlot(slot))?;
        match catalog.item(&item) {
            None => Err(StateError::UnknownItem(item)),
            Some(ItemDef::Gun(gun)) => Ok((item, gun.max_clip)),
            Some(_) => Err(StateError::NotAGun(item)),
        }
    }

    /// Loads the gun in `slot` to its maximum clip. Returns the new ammo.
    ///
    /// # Errors
    ///
    /// [`StateError::EmptySlot`], [`StateError::UnknownItem`] or
    /// [`StateError::NotAGun`]; the slot is unchanged on error.
    pub fn refill(&mut self, slot: WeaponSlot, catalog: &Catalog) -> Result<u32, StateError> {
        let (_, max_clip) = self.gun_in(slot, catalog)?;
        self.set_ammo(slot, max_clip)?;
        Ok(max_clip)
    }

    /// Applies a partial top-up to the gun in `slot` using the reload table.
    /// Returns the new ammo.
    ///
    /// # Errors
    ///
    /// Same as [`Participant::refill`].
    pub fn top_up(
        &mut self,
        slot: WeaponSlot,
        catalog: &Catalog,
        tables: &ResourceTables,
    ) -> Result<u32, StateError> {
        let (item, max_clip) = self.gun_in(slot, catalog)?;
        let current = self.weapons.get(slot).ammo;
        let ammo = ammo_to_give(&item, current, max_clip, &tables.reload);
        if ammo != current {
            self.set_ammo(slot, ammo)?;
        }
        Ok(ammo)
    }

    // -------------------------------------------------------------------------
    // Inventory
    // -------------------------------------------------------------------------

    /// Returns the inventory.
    #[must_use]
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Returns the count held for `item`.
    #[must_use]
    pub fn item_count(&self, item: &ItemId) -> u32 {
        self.inventory.get(item)
    }

    /// Returns the cap for `item` at the current backpack tier.
    #[must_use]
    pub fn item_cap(&self, item: &ItemId, tables: &ResourceTables) -> Option<u32> {
        tables.capacity.cap(item, self.backpack_tier())
    }

    /// Sets the count for `item`, clamped to the current cap. Returns the
    /// stored count.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownItem`] if the item has no capacity entry.
    pub fn set_item(
        &mut self,
        item: &ItemId,
        count: u32,
        tables: &ResourceTables,
    ) -> Result<u32, StateError> {
        let cap = self
            .item_cap(item, tables)
            .ok_or_else(|| StateError::UnknownItem(item.clone()))?;
        let stored = self.inventory.store(item, count, cap);
        self.dirty |= DirtyFlags::INVENTORY;
        Ok(stored)
    }

    /// Adds `amount` of `item`, clamped to the current cap. Returns the
    /// stored count.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownItem`] if the item has no capacity entry.
    pub fn give_item(
        &mut self,
        item: &ItemId,
        amount: u32,
        tables: &ResourceTables,
    ) -> Result<u32, StateError> {
        let total = self.inventory.get(item).saturating_add(amount);
        self.set_item(item, total, tables)
    }

    /// Removes up to `amount` of `item`. Returns how many were removed.
    pub fn take_item(&mut self, item: &ItemId, amount: u32) -> u32 {
        let held = self.inventory.get(item);
        let taken = held.min(amount);
        if taken > 0 {
            self.inventory.store(item, held - taken, held);
            self.dirty |= DirtyFlags::INVENTORY;
        }
        taken
    }

    // -------------------------------------------------------------------------
    // Armor
    // -------------------------------------------------------------------------

    /// Returns the armor slots.
    #[must_use]
    pub const fn armor(&self) -> &Armor {
        &self.armor
    }

    /// Returns the tier of the equipped backpack (0 without one).
    #[must_use]
    pub const fn backpack_tier(&self) -> Tier {
        self.armor.get(ArmorSlotKind::Backpack).tier
    }

    /// Equips an armor item in the slot its definition names.
    ///
    /// Equipping a backpack re-clamps every inventory count to the new
    /// tier's caps.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownItem`] or [`StateError::NotArmor`]; armor is
    /// unchanged on error.
    pub fn equip_armor(
        &mut self,
        item: &ItemId,
        catalog: &Catalog,
        tables: &ResourceTables,
    ) -> Result<ArmorSlotKind, StateError> {
        let def = catalog
            .item(item)
            .ok_or_else(|| StateError::UnknownItem(item.clone()))?;
        let armor = def
            .as_armor()
            .ok_or_else(|| StateError::NotArmor(item.clone()))?;
        *self.armor.get_mut(armor.slot) = ArmorSlot {
            item: Some(item.clone()),
            tier: armor.tier,
        };
        self.dirty |= DirtyFlags::ARMOR;
        if armor.slot == ArmorSlotKind::Backpack {
            self.reclamp_inventory(tables);
        }
        Ok(armor.slot)
    }

    /// Empties an armor slot. Removing the backpack re-clamps inventory.
    pub fn remove_armor(&mut self, kind: ArmorSlotKind, tables: &ResourceTables) -> ArmorSlot {
        let previous = std::mem::take(self.armor.get_mut(kind));
        self.dirty |= DirtyFlags::ARMOR;
        if kind == ArmorSlotKind::Backpack {
            self.reclamp_inventory(tables);
        }
        previous
    }

    fn reclamp_inventory(&mut self, tables: &ResourceTables) {
        let tier = self.backpack_tier();
        if self
            .inventory
            .reclamp(|item| tables.capacity.cap(item, tier).unwrap_or(0))
        {
            self.dirty |= DirtyFlags::INVENTORY;
        }
    }

    // -------------------------------------------------------------------------
    // Perks
    // -------------------------------------------------------------------------

    /// Returns the held perks.
    #[must_use]
    pub const fn perks(&self) -> &PerkSet {
        &self.perks
    }

    /// Returns `true` if the perk is held.
    #[must_use]
    pub fn has_perk(&self, id: &PerkId) -> bool {
        self.perks.contains(id)
    }

    /// Grants a perk.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownPerk`] or [`StateError::DuplicatePerk`]; the perk
    /// set is unchanged on error.
    pub fn add_perk(
        &mut self,
        id: &PerkId,
        droppable: bool,
        catalog: &Catalog,
    ) -> Result<(), StateError> {
        if !catalog.has_perk(id) {
            return Err(StateError::UnknownPerk(id.clone()));
        }
        if !self.perks.insert(Perk {
            id: id.clone(),
            droppable,
        }) {
            return Err(StateError::DuplicatePerk(id.clone()));
        }
        self.dirty |= DirtyFlags::PERKS;
        Ok(())
    }

    /// Removes one perk.
    ///
    /// # Errors
    ///
    /// [`StateError::PerkNotHeld`] if the perk is not held.
    pub fn remove_perk(&mut self, id: &PerkId) -> Result<Perk, StateError> {
        let perk = self
            .perks
            .remove(id)
            .ok_or_else(|| StateError::PerkNotHeld(id.clone()))?;
        self.dirty |= DirtyFlags::PERKS;
        Ok(perk)
    }

    // -------------------------------------------------------------------------
    // Scope and boost
    // -------------------------------------------------------------------------

    /// Returns the active scope.
    #[must_use]
    pub fn scope(&self) -> &ItemId {
        &self.scope
    }

    /// Activates a scope.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownItem`] or [`StateError::NotAScope`].
    pub fn set_scope(&mut self, item: &ItemId, catalog: &Catalog) -> Result<(), StateError> {
        match catalog.item(item) {
            None => Err(StateError::UnknownItem(item.clone())),
            Some(ItemDef::Scope { .. }) => {
                self.scope = item.clone();
                self.dirty |= DirtyFlags::STATS;
                Ok(())
            }
            Some(_) => Err(StateError::NotAScope(item.clone())),
        }
    }

    /// Returns the boost meter.
    #[must_use]
    pub const fn boost(&self) -> f32 {
        self.boost
    }

    /// Sets the boost meter, clamped to `0.0..=MAX_BOOST`. NaN reads as 0.
    pub fn set_boost(&mut self, boost: f32) {
        self.boost = if boost.is_nan() {
            0.0
        } else {
            boost.clamp(0.0, MAX_BOOST)
        };
        self.dirty |= DirtyFlags::STATS;
    }

    /// Adds to the boost meter, clamped.
    pub fn add_boost(&mut self, delta: f32) {
        self.set_boost(self.boost + delta);
    }

    // -------------------------------------------------------------------------
    // Synchronization
    // -------------------------------------------------------------------------

    /// Returns the pending dirty flags.
    #[must_use]
    pub const fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Marks parts of the record for resynchronization.
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    /// Returns and clears the pending dirty flags.
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::replace(&mut self.dirty, DirtyFlags::empty())
    }
}

// =============================================================================
// Tests
// =============================================================================
