//! Component structs that make up a participant's combat state.
//!
//! Each component owns one concern and enforces its local invariant:
//!
//! - [`WeaponSlots`]: four weapon slots plus the current-selection pointer
//! - [`Inventory`]: consumable counts, never above the supplied cap
//! - [`Armor`]: backpack, helmet and chest slots with cached tiers
//! - [`PerkSet`]: perks, unique by identifier
//!
//! Cross-component rules (backpack tier limiting inventory, dirty flags) live
//! on [`Participant`](super::Participant).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{ArmorSlotKind, ItemId, PerkId, Tier};

// =============================================================================
// Weapons
// =============================================================================

/// Weapon slot identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WeaponSlot {
    /// First gun slot.
    Primary,
    /// Second gun slot.
    Secondary,
    /// Melee weapon slot; never empty for a live participant.
    Melee,
    /// Equipped grenade type.
    Throwable,
}

impl WeaponSlot {
    /// All slots in index order.
    pub const ALL: [Self; 4] = [Self::Primary, Self::Secondary, Self::Melee, Self::Throwable];

    /// Slots that may hold guns.
    pub const GUNS: [Self; 2] = [Self::Primary, Self::Secondary];

    /// Returns the slot's index into [`WeaponSlots`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
            Self::Melee => 2,
            Self::Throwable => 3,
        }
    }
}

impl fmt::Display for WeaponSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "Primary"),
            Self::Secondary => write!(f, "Secondary"),
            Self::Melee => write!(f, "Melee"),
            Self::Throwable => write!(f, "Throwable"),
        }
    }
}

/// Contents of a single weapon slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponState {
    /// Occupying item, or `None` for an empty slot.
    pub item: Option<ItemId>,
    /// Rounds loaded.
    pub ammo: u32,
    /// Time until the weapon can be used again.
    pub cooldown: Duration,
}

impl WeaponState {
    /// Creates a slot holding `item` with `ammo` loaded and no cooldown.
    #[must_use]
    pub fn holding(item: ItemId, ammo: u32) -> Self {
        Self {
            item: Some(item),
            ammo,
            cooldown: Duration::ZERO,
        }
    }

    /// Returns `true` if no item occupies the slot.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    /// Returns `true` if the slot holds exactly `item`.
    #[must_use]
    pub fn holds(&self, item: &ItemId) -> bool {
        self.item.as_ref() == Some(item)
    }

    /// Empties the slot, zeroing ammo and cooldown.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The four weapon slots and the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSlots {
    slots: [WeaponState; 4],
    current: WeaponSlot,
}

impl WeaponSlots {
    /// Creates slots holding only `melee`, with melee selected.
    #[must_use]
    pub fn with_melee(melee: ItemId) -> Self {
        let mut slots: [WeaponState; 4] = Default::default();
        slots[WeaponSlot::Melee.index()] = WeaponState::holding(melee, 0);
        Self {
            slots,
            current: WeaponSlot::Melee,
        }
    }

    /// Returns the state of a slot.
    #[must_use]
    pub fn get(&self, slot: WeaponSlot) -> &WeaponState {
        &self.slots[slot.index()]
    }

    pub(crate) fn get_mut(&mut self, slot: WeaponSlot) -> &mut WeaponState {
        &mut self.slots[slot.index()]
    }

    /// Returns the currently selected slot.
    #[must_use]
    pub const fn current(&self) -> WeaponSlot {
        self.current
    }

    pub(crate) fn set_current(&mut self, slot: WeaponSlot) {
        self.current = slot;
    }

    /// Returns `true` if the current selection references a populated slot.
    #[must_use]
    pub fn selection_is_valid(&self) -> bool {
        !self.get(self.current).is_empty()
    }

    /// Iterates over `(slot, state)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (WeaponSlot, &WeaponState)> {
        WeaponSlot::ALL.into_iter().map(|slot| (slot, self.get(slot)))
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Consumable and throwable counts.
///
/// Counts are written only through [`Inventory::store`], which takes the cap
/// to respect; a stored count never exceeds it. Zero counts are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    counts: std::collections::BTreeMap<ItemId, u32>,
}

impl Inventory {
    /// Returns the count held for `item`.
    #[must_use]
    pub fn get(&self, item: &ItemId) -> u32 {
        self.counts.get(item).copied().unwrap_or(0)
    }

    /// Stores `min(count, cap)` and returns the stored value.
    pub(crate) fn store(&mut self, item: &ItemId, count: u32, cap: u32) -> u32 {
        let clamped = count.min(cap);
        if clamped == 0 {
            self.counts.remove(item);
        } else {
            self.counts.insert(item.clone(), clamped);
        }
        clamped
    }

    /// Re-clamps every count against `cap_for`. Returns `true` if any count
    /// changed.
    pub(crate) fn reclamp(&mut self, mut cap_for: impl FnMut(&ItemId) -> u32) -> bool {
        let mut changed = false;
        self.counts.retain(|item, count| {
            let cap = cap_for(item);
            if *count > cap {
                *count = cap;
                changed = true;
            }
            *count > 0
        });
        changed
    }

    /// Iterates over held items in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, u32)> {
        self.counts.iter().map(|(item, count)| (item, *count))
    }

    /// Returns `true` if nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// =============================================================================
// Armor
// =============================================================================

/// One armor slot: the occupying item and its tier (0 when empty).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmorSlot {
    /// Occupying item.
    pub item: Option<ItemId>,
    /// Cached tier of the occupying item.
    pub tier: Tier,
}

/// Backpack, helmet and chest slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    backpack: ArmorSlot,
    helmet: ArmorSlot,
    chest: ArmorSlot,
}

impl Armor {
    /// Returns the slot of the given kind.
    #[must_use]
    pub const fn get(&self, kind: ArmorSlotKind) -> &ArmorSlot {
        match kind {
            ArmorSlotKind::Backpack => &self.backpack,
            ArmorSlotKind::Helmet => &self.helmet,
            ArmorSlotKind::Chest => &self.chest,
        }
    }

    pub(crate) fn get_mut(&mut self, kind: ArmorSlotKind) -> &mut ArmorSlot {
        match kind {
            ArmorSlotKind::Backpack => &mut self.backpack,
            ArmorSlotKind::Helmet => &mut self.helmet,
            ArmorSlotKind::Chest => &mut self.chest,
        }
    }
}

// =============================================================================
// Perks
// =============================================================================

/// A held perk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perk {
    /// Perk identifier.
    pub id: PerkId,
    /// Whether the perk drops on the ground when the holder dies.
    pub droppable: bool,
}

/// Perks held by one participant, unique by identifier, in grant order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerkSet {
    perks: Vec<Perk>,
}

impl PerkSet {
    /// Returns `true` if a perk with this identifier is held.
    #[must_use]
    pub fn contains(&self, id: &PerkId) -> bool {
        self.perks.iter().any(|perk| &perk.id == id)
    }

    /// Adds a perk. Returns `false` (and changes nothing) on duplicates.
    pub(crate) fn insert(&mut self, perk: Perk) -> bool {
        if self.contains(&perk.id) {
            return false;
        }
        self.perks.push(perk);
        true
    }

    /// Removes a perk by identifier.
    pub(crate) fn remove(&mut self, id: &PerkId) -> Option<Perk> {
        let index = self.perks.iter().position(|perk| &perk.id == id)?;
        Some(self.perks.remove(index))
    }

    /// Snapshot of held perk identifiers in grant order.
    #[must_use]
    pub fn ids(&self) -> Vec<PerkId> {
        self.perks.iter().map(|perk| perk.id.clone()).collect()
    }

    /// Iterates over held perks in grant order.
    pub fn iter(&self) -> impl Iterator<Item = &Perk> {
        self.perks.iter()
    }

    /// Number of held perks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.perks.len()
    }

    /// Returns `true` if no perks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.perks.is_empty()
    }
}
