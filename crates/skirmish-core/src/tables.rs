//! Resource tables and numeric policy.
//!
//! Two immutable lookup structures drive the ammo and inventory economy:
//!
//! - [`CapacityTable`]: per-item inventory caps indexed by backpack tier
//! - [`ReloadTable`]: per-weapon reload percentage used by top-ups
//!
//! Both are loaded once and shared by reference across every running match.
//!
//! # Determinism
//!
//! [`ammo_to_give`] is computed in integer arithmetic. Identical inputs give
//! identical results on every platform, so clients can predict top-ups.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::{ItemId, Tier};
use crate::error::{read_json, ConfigError};

/// Reload percentage applied to weapons without a table entry.
pub const DEFAULT_RELOAD_PERCENT: u32 = 50;

// =============================================================================
// Capacity Table
// =============================================================================

/// Inventory caps keyed by item, indexed by tier.
///
/// A tier past the end of an item's list uses the last entry, so a table
/// written for tiers 0..=3 still answers for an unexpected tier 4.
///
/// # Example
///
/// ```
/// use skirmish_core::tables::CapacityTable;
/// use skirmish_core::catalog::ItemId;
///
/// let caps = CapacityTable::standard();
/// assert_eq!(caps.cap(&ItemId::new("frag"), 0), Some(3));
/// assert_eq!(caps.cap(&ItemId::new("frag"), 3), Some(12));
/// assert_eq!(caps.cap(&ItemId::new("mosin"), 3), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacityTable {
    caps: BTreeMap<ItemId, Vec<u32>>,
}

impl CapacityTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-tier caps for an item.
    pub fn insert(&mut self, item: &str, caps_by_tier: &[u32]) -> &mut Self {
        self.caps.insert(ItemId::new(item), caps_by_tier.to_vec());
        self
    }

    /// Returns the cap for `item` at `tier`, or `None` if the item has no
    /// capacity entry (and therefore cannot be held in inventory).
    #[must_use]
    pub fn cap(&self, item: &ItemId, tier: Tier) -> Option<u32> {
        let caps = self.caps.get(item)?;
        caps.get(usize::from(tier)).or_else(|| caps.last()).copied()
    }

    /// Returns `true` if the item can be held in inventory.
    #[must_use]
    pub fn contains(&self, item: &ItemId) -> bool {
        self.caps.contains_key(item)
    }

    /// The standard bag-size table.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        table
            .insert("9mm", &[120, 240, 330, 420])
            .insert("762mm", &[90, 180, 240, 300])
            .insert("556mm", &[90, 180, 240, 300])
            .insert("12gauge", &[15, 30, 60, 90])
            .insert("frag", &[3, 6, 9, 12])
            .insert("smoke", &[3, 6, 9, 12])
            .insert("strobe", &[2, 3, 4, 5])
            .insert("mirv", &[2, 4, 6, 8])
            .insert("bandage", &[5, 10, 15, 30])
            .insert("healthkit", &[1, 2, 3, 4])
            .insert("soda", &[2, 5, 10, 15])
            .insert("painkiller", &[1, 2, 3, 4])
            .insert("1xscope", &[1])
            .insert("2xscope", &[1])
            .insert("4xscope", &[1])
            .insert("8xscope", &[1]);
        table
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.caps.iter().find(|(_, caps)| caps.is_empty()) {
            Some((item, _)) => Err(ConfigError::Invalid(format!(
                "capacity entry for `{item}` lists no tiers"
            ))),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Reload Table
// =============================================================================

/// Per-weapon reload percentages.
///
/// Weapons without an entry use [`DEFAULT_RELOAD_PERCENT`]. A percentage of
/// zero marks weapons that must be reloaded manually and never receive a
/// partial top-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReloadTable {
    percents: BTreeMap<ItemId, u32>,
}

impl ReloadTable {
    /// Creates an empty table (every weapon uses the default).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reload percentage for a weapon.
    pub fn insert(&mut self, weapon: &str, percent: u32) -> &mut Self {
        self.percents.insert(ItemId::new(weapon), percent);
        self
    }

    /// Returns the reload percentage for a weapon.
    #[must_use]
    pub fn percent(&self, weapon: &ItemId) -> u32 {
        self.percents
            .get(weapon)
            .copied()
            .unwrap_or(DEFAULT_RELOAD_PERCENT)
    }

    /// The standard reload table.
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        table
            .insert("mosin", 0)
            .insert("m870", 0)
            .insert("spas12", 25)
            .insert("ak47", 40)
            .insert("mp5", 60)
            .insert("mac10", 75)
            .insert("m9", 100);
        table
    }
}

/// Computes the ammo a weapon holds after a partial top-up.
///
/// With reload percentage `p` for `weapon`:
/// - `p == 0`: returns `current` unchanged
/// - otherwise: `floor(min(current + max_clip * p / 100, max_clip))`
///
/// The function is pure and monotonically non-decreasing in `current`.
///
/// # Example
///
/// ```
/// use skirmish_core::tables::{ammo_to_give, ReloadTable};
/// use skirmish_core::catalog::ItemId;
///
/// let reload = ReloadTable::standard();
/// // Unlisted weapon: 50% of a 30 round clip on top of 4 rounds.
/// assert_eq!(ammo_to_give(&ItemId::new("famas"), 4, 30, &reload), 19);
/// // Manual-reload weapon: unchanged.
/// assert_eq!(ammo_to_give(&ItemId::new("mosin"), 2, 5, &reload), 2);
/// ```
#[must_use]
pub fn ammo_to_give(weapon: &ItemId, current: u32, max_clip: u32, reload: &ReloadTable) -> u32 {
    let percent = reload.percent(weapon);
    if percent == 0 {
        return current;
    }
    // current is integral, so floor(current + x) == current + floor(x).
    let top_up = u64::from(max_clip) * u64::from(percent) / 100;
    let filled = (u64::from(current) + top_up).min(u64::from(max_clip));
    // filled <= max_clip, which fits in u32.
    u32::try_from(filled).unwrap_or(max_clip)
}

// =============================================================================
// Resource Tables
// =============================================================================

/// Both lookup tables, as loaded at process start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceTables {
    /// Inventory caps by tier.
    pub capacity: CapacityTable,
    /// Reload percentages by weapon.
    pub reload: ReloadTable,
}

impl ResourceTables {
    /// The standard capacity and reload tables.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            capacity: CapacityTable::standard(),
            reload: ReloadTable::standard(),
        }
    }

    /// Parses tables from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::Invalid`] when a capacity entry lists no tiers.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let tables: Self = serde_json::from_str(json)?;
        tables.capacity.validate()?;
        Ok(tables)
    }

    /// Reads and parses a tables file.
    ///
    /// # Errors
    ///
    /// See [`ResourceTables::from_json_str`]; also fails with [`ConfigError::Io`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let tables: Self = read_json(path)?;
        tables.capacity.validate()?;
        Ok(tables)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod capacity_tests {
        use super::*;

        #[test]
        fn cap_by_tier() {
            let caps = CapacityTable::standard();
            let bandage = ItemId::new("bandage");
            assert_eq!(caps.cap(&bandage, 0), Some(5));
            assert_eq!(caps.cap(&bandage, 1), Some(10));
            assert_eq!(caps.cap(&bandage, 3), Some(30));
        }

        #[test]
        fn tier_past_end_uses_last_entry() {
            let caps = CapacityTable::standard();
            assert_eq!(caps.cap(&ItemId::new("4xscope"), 2), Some(1));
            assert_eq!(caps.cap(&ItemId::new("frag"), 9), Some(12));
        }

        #[test]
        fn unknown_item_has_no_cap() {
            let caps = CapacityTable::standard();
            assert!(caps.cap(&ItemId::new("mosin"), 0).is_none());
            assert!(!caps.contains(&ItemId::new("mosin")));
        }
    }

    mod reload_tests {
        use super::*;

        #[test]
        fn default_percent_for_unlisted_weapon() {
            let reload = ReloadTable::standard();
            assert_eq!(reload.percent(&ItemId::new("famas")), DEFAULT_RELOAD_PERCENT);
        }

        #[test]
        fn zero_percent_returns_current_even_above_clip() {
            let reload = ReloadTable::standard();
            assert_eq!(ammo_to_give(&ItemId::new("m870"), 7, 5, &reload), 7);
        }

        #[test]
        fn top_up_clamps_to_clip() {
            let reload = ReloadTable::standard();
            // mac10: 75% of 32 = 24; 20 + 24 clamps to 32.
            assert_eq!(ammo_to_give(&ItemId::new("mac10"), 20, 32, &reload), 32);
        }

        #[test]
        fn fractional_top_up_rounds_down() {
            let reload = ReloadTable::standard();
            // spas12: 25% of 9 = 2.25 -> 2.
            assert_eq!(ammo_to_give(&ItemId::new("spas12"), 0, 9, &reload), 2);
        }

        #[test]
        fn empty_clip_weapon_stays_empty() {
            let reload = ReloadTable::standard();
            assert_eq!(ammo_to_give(&ItemId::new("famas"), 0, 0, &reload), 0);
        }
    }

    mod loading_tests {
        use super::*;

        #[test]
        fn json_roundtrip() {
            let tables = ResourceTables::standard();
            let json = serde_json::to_string(&tables).unwrap();
            assert_eq!(ResourceTables::from_json_str(&json).unwrap(), tables);
        }

        #[test]
        fn empty_tier_list_is_invalid() {
            let json = r#"{ "capacity": { "frag": [] } }"#;
            assert!(matches!(
                ResourceTables::from_json_str(json),
                Err(ConfigError::Invalid(_))
            ));
        }

        #[test]
        fn missing_reload_section_uses_defaults() {
            let json = r#"{ "capacity": { "frag": [1, 2] } }"#;
            let tables = ResourceTables::from_json_str(json).unwrap();
            assert_eq!(tables.reload.percent(&ItemId::new("mosin")), 50);
        }
    }

    proptest! {
        #[test]
        fn zero_percent_is_identity(current in 0u32..10_000, max_clip in 0u32..10_000) {
            let mut reload = ReloadTable::new();
            reload.insert("bolt", 0);
            prop_assert_eq!(ammo_to_give(&ItemId::new("bolt"), current, max_clip, &reload), current);
        }

        #[test]
        fn positive_percent_matches_formula(
            current in 0u32..10_000,
            max_clip in 0u32..10_000,
            percent in 1u32..=200,
        ) {
            let mut reload = ReloadTable::new();
            reload.insert("gun", percent);
            let expected = (f64::from(current) + f64::from(max_clip) * f64::from(percent) / 100.0)
                .min(f64::from(max_clip))
                .floor();
            let got = ammo_to_give(&ItemId::new("gun"), current, max_clip, &reload);
            prop_assert_eq!(f64::from(got), expected);
        }

        #[test]
        fn monotonic_in_current(
            a in 0u32..10_000,
            b in 0u32..10_000,
            max_clip in 0u32..10_000,
            percent in 1u32..=100,
        ) {
            let mut reload = ReloadTable::new();
            reload.insert("gun", percent);
            let weapon = ItemId::new("gun");
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                ammo_to_give(&weapon, lo, max_clip, &reload)
                    <= ammo_to_give(&weapon, hi, max_clip, &reload)
            );
        }
    }
}
