//! Static definitions: the read-only content lookup consumed by the engine.
//!
//! The catalog answers the questions handlers need about an identifier:
//! what kind of item it is, a gun's maximum clip, an armor piece's slot and
//! tier, whether an item belongs to the default unlock set, whether a perk
//! exists, and how a map is configured.
//!
//! The catalog is loaded once at process start and shared by `Arc` across
//! every running match. Nothing in it is ever mutated after loading.
//!
//! # Invalid identifiers
//!
//! Every lookup returns `Option`. An identifier absent from the catalog is
//! an invalid item; callers leave state unchanged rather than synthesizing
//! behavior for it.
//!
//! # Example
//!
//! ```
//! use skirmish_core::catalog::{Catalog, ItemId};
//!
//! let catalog = Catalog::standard();
//! assert_eq!(catalog.max_clip(&ItemId::new("mosin")), Some(5));
//! assert!(catalog.is_loadout_item(&ItemId::new("mosin"), "gun"));
//! assert!(catalog.item(&ItemId::new("laser_sword")).is_none());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{read_json, ConfigError};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from a string.
            #[must_use]
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of an item definition (`"mosin"`, `"frag"`, `"helmet03"`).
    ItemId
);
string_id!(
    /// Identifier of a perk definition (`"endless_ammo"`).
    PerkId
);
string_id!(
    /// Identifier of a map (`"main"`, `"cobalt"`).
    MapId
);
string_id!(
    /// Identifier of a game mode (`"deathmatch"`).
    ModeId
);

/// Armor or backpack upgrade level. `0` means no item.
pub type Tier = u8;

/// Highest tier any capacity table is expected to describe.
pub const MAX_TIER: Tier = 3;

// =============================================================================
// Item Definitions
// =============================================================================

/// Which armor slot an armor item occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorSlotKind {
    /// Backpack; its tier selects inventory capacity.
    Backpack,
    /// Helmet.
    Helmet,
    /// Chest armor.
    Chest,
}

impl fmt::Display for ArmorSlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backpack => write!(f, "Backpack"),
            Self::Helmet => write!(f, "Helmet"),
            Self::Chest => write!(f, "Chest"),
        }
    }
}

/// Gun statistics relevant to ammo bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GunDef {
    /// Rounds held by a full clip.
    pub max_clip: u32,
    /// Inventory item consumed when reloading.
    pub ammo: ItemId,
}

/// Armor statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmorDef {
    /// Slot the piece occupies.
    pub slot: ArmorSlotKind,
    /// Upgrade level, `1..=MAX_TIER` for real items.
    pub tier: Tier,
}

/// Classification of a static item definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDef {
    /// Firearm; occupies Primary or Secondary.
    Gun(GunDef),
    /// Melee weapon; occupies Melee.
    Melee,
    /// Grenade-type item; counted in inventory, equipped in Throwable.
    Throwable,
    /// Healing consumable.
    Heal,
    /// Adrenaline consumable.
    Boost,
    /// Loose ammunition.
    Ammo,
    /// Sight attachment.
    Scope {
        /// Magnification level.
        zoom: u8,
    },
    /// Backpack, helmet or chest piece.
    Armor(ArmorDef),
}

impl ItemDef {
    /// Returns the gun definition, if this item is a gun.
    #[must_use]
    pub const fn as_gun(&self) -> Option<&GunDef> {
        match self {
            Self::Gun(gun) => Some(gun),
            _ => None,
        }
    }

    /// Returns the armor definition, if this item is armor.
    #[must_use]
    pub const fn as_armor(&self) -> Option<&ArmorDef> {
        match self {
            Self::Armor(armor) => Some(armor),
            _ => None,
        }
    }

    /// Returns `true` for gun definitions.
    #[must_use]
    pub const fn is_gun(&self) -> bool {
        matches!(self, Self::Gun(_))
    }
}

// =============================================================================
// Map Definitions
// =============================================================================

/// Per-map settings that affect mode plugins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDef {
    /// Map identifier.
    pub id: MapId,
    /// The map runs its own perk-granting system.
    pub perk_mode: bool,
    /// Perks the map's own perk system grants.
    pub perk_mode_perks: BTreeSet<PerkId>,
}

impl MapDef {
    /// Creates a map without a perk system.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: MapId::new(id),
            perk_mode: false,
            perk_mode_perks: BTreeSet::new(),
        }
    }

    /// Returns `true` if the map's own perk system hands out `perk`.
    #[must_use]
    pub fn grants_perk(&self, perk: &PerkId) -> bool {
        self.perk_mode && self.perk_mode_perks.contains(perk)
    }
}

impl Default for MapId {
    fn default() -> Self {
        Self::new("main")
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Read-only lookup of all static definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    items: BTreeMap<ItemId, ItemDef>,
    perks: BTreeSet<PerkId>,
    /// Default unlock set, keyed by category (`"gun"`, `"melee"`, ...).
    loadout: BTreeMap<String, BTreeSet<ItemId>>,
    maps: BTreeMap<MapId, MapDef>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::Invalid`] if a gun references an ammo item that is not
    /// itself defined.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reads and parses a catalog file.
    ///
    /// # Errors
    ///
    /// See [`Catalog::from_json_str`]; also fails with [`ConfigError::Io`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let catalog: Self = read_json(path)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (id, def) in &self.items {
            if let ItemDef::Gun(gun) = def {
                if !self.items.contains_key(&gun.ammo) {
                    return Err(ConfigError::Invalid(format!(
                        "gun `{id}` uses undefined ammo `{}`",
                        gun.ammo
                    )));
                }
            }
        }
        Ok(())
    }

    /// Adds or replaces an item definition.
    pub fn insert_item(&mut self, id: &str, def: ItemDef) -> &mut Self {
        self.items.insert(ItemId::new(id), def);
        self
    }

    /// Adds a perk definition.
    pub fn insert_perk(&mut self, id: &str) -> &mut Self {
        self.perks.insert(PerkId::new(id));
        self
    }

    /// Adds an item to the default unlock set of `category`.
    pub fn insert_loadout_item(&mut self, category: &str, id: &str) -> &mut Self {
        self.loadout
            .entry(category.to_string())
            .or_default()
            .insert(ItemId::new(id));
        self
    }

    /// Adds or replaces a map definition.
    pub fn insert_map(&mut self, map: MapDef) -> &mut Self {
        self.maps.insert(map.id.clone(), map);
        self
    }

    /// Looks up an item definition.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// Looks up a gun definition.
    #[must_use]
    pub fn gun(&self, id: &ItemId) -> Option<&GunDef> {
        self.item(id).and_then(ItemDef::as_gun)
    }

    /// Returns a gun's maximum clip size.
    #[must_use]
    pub fn max_clip(&self, id: &ItemId) -> Option<u32> {
        self.gun(id).map(|gun| gun.max_clip)
    }

    /// Looks up an armor definition.
    #[must_use]
    pub fn armor(&self, id: &ItemId) -> Option<&ArmorDef> {
        self.item(id).and_then(ItemDef::as_armor)
    }

    /// Returns `true` if `id` is a defined gun.
    #[must_use]
    pub fn is_gun(&self, id: &ItemId) -> bool {
        self.item(id).is_some_and(ItemDef::is_gun)
    }

    /// Returns `true` if `id` is in the default unlock set for `category`.
    #[must_use]
    pub fn is_loadout_item(&self, id: &ItemId, category: &str) -> bool {
        self.loadout
            .get(category)
            .is_some_and(|items| items.contains(id))
    }

    /// Returns `true` if the perk is defined.
    #[must_use]
    pub fn has_perk(&self, id: &PerkId) -> bool {
        self.perks.contains(id)
    }

    /// Looks up a map definition.
    #[must_use]
    pub fn map(&self, id: &MapId) -> Option<&MapDef> {
        self.maps.get(id)
    }

    /// Returns the number of item definitions.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Builds the standard content set shipped with the server.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();

        for ammo in ["9mm", "762mm", "12gauge", "556mm"] {
            catalog.insert_item(ammo, ItemDef::Ammo);
        }

        let guns: [(&str, u32, &str, bool); 8] = [
            ("mosin", 5, "762mm", true),
            ("spas12", 9, "12gauge", true),
            ("m870", 5, "12gauge", true),
            ("ak47", 30, "762mm", true),
            ("mp5", 30, "9mm", true),
            ("famas", 25, "556mm", false),
            ("m9", 15, "9mm", false),
            ("mac10", 32, "9mm", false),
        ];
        for (id, max_clip, ammo, in_loadout) in guns {
            catalog.insert_item(
                id,
                ItemDef::Gun(GunDef {
                    max_clip,
                    ammo: ItemId::new(ammo),
                }),
            );
            if in_loadout {
                catalog.insert_loadout_item("gun", id);
            }
        }

        for melee in ["fists", "machete", "karambit"] {
            catalog.insert_item(melee, ItemDef::Melee);
        }
        catalog.insert_loadout_item("melee", "fists");

        for throwable in ["frag", "smoke", "strobe", "mirv"] {
            catalog.insert_item(throwable, ItemDef::Throwable);
        }
        for heal in ["bandage", "healthkit"] {
            catalog.insert_item(heal, ItemDef::Heal);
        }
        for boost in ["soda", "painkiller"] {
            catalog.insert_item(boost, ItemDef::Boost);
        }
        for (scope, zoom) in [("1xscope", 1), ("2xscope", 2), ("4xscope", 4), ("8xscope", 8)] {
            catalog.insert_item(scope, ItemDef::Scope { zoom });
        }

        for (prefix, slot) in [
            ("backpack", ArmorSlotKind::Backpack),
            ("helmet", ArmorSlotKind::Helmet),
            ("chest", ArmorSlotKind::Chest),
        ] {
            for tier in 1..=MAX_TIER {
                catalog.insert_item(
                    &format!("{prefix}0{tier}"),
                    ItemDef::Armor(ArmorDef { slot, tier }),
                );
            }
        }

        for perk in [
            "endless_ammo",
            "self_revive",
            "takedown",
            "firepower",
            "windwalk",
            "field_medic",
        ] {
            catalog.insert_perk(perk);
        }

        catalog.insert_map(MapDef::new("main"));
        catalog.insert_map(MapDef::new("woods"));
        catalog.insert_map(MapDef {
            id: MapId::new("cobalt"),
            perk_mode: true,
            perk_mode_perks: ["takedown", "firepower", "windwalk", "field_medic"]
                .into_iter()
                .map(PerkId::new)
                .collect(),
        });

        catalog
    }
}

// =============================================================================
// Tests
// =============================================================================
