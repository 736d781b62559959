//! Deathmatch mode: everyone spawns with the same kit, kills pay out.
//!
//! # Handlers
//!
//! - `PlayerJoined`: on the configured map, equips the fixed loadout
//!   (weapons, tier-3 armor, starting inventory, scope, boost, perks).
//! - `PlayerKilled`, first: strips the victim's perks one at a time,
//!   switches to melee and empties slots holding loadout guns.
//! - `PlayerKilled`, second: rewards a participant killer with throwables
//!   and refills its guns to a full clip.
//!
//! The kill handlers are subscribed in that order, so the reward handler
//! always sees the victim already stripped. This matters for self-kills.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::applied;
use crate::bus::HandlerResult;
use crate::catalog::{ItemId, MapId, PerkId, Tier};
use crate::error::BusError;
use crate::event::{DamageSource, EventKind, LifecycleEvent};
use crate::participant::{DirtyFlags, WeaponSlot};
use crate::plugin::{GamePlugin, Listeners, PluginDeclaration};
use crate::world::World;

/// Catalog category of guns that are part of the default unlock set.
const LOADOUT_GUN_CATEGORY: &str = "gun";

// =============================================================================
// Configuration
// =============================================================================

/// A weapon granted on join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadoutWeapon {
    /// Weapon identifier.
    pub item: ItemId,
    /// Ammo loaded on spawn.
    pub ammo: u32,
}

/// How many of an item to grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// An exact count.
    Fixed(u32),
    /// The item's capacity at the given backpack tier.
    TierCap(Tier),
}

/// An inventory grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    /// Item identifier.
    pub item: ItemId,
    /// Amount to grant.
    pub quantity: Quantity,
}

impl ItemGrant {
    fn fixed(item: &str, count: u32) -> Self {
        Self {
            item: ItemId::new(item),
            quantity: Quantity::Fixed(count),
        }
    }

    fn tier_cap(item: &str, tier: Tier) -> Self {
        Self {
            item: ItemId::new(item),
            quantity: Quantity::TierCap(tier),
        }
    }
}

/// Deathmatch loadout and rewards. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathmatchConfig {
    /// Map the join loadout applies to.
    pub map: MapId,
    /// Primary weapon on join.
    pub primary: LoadoutWeapon,
    /// Secondary weapon on join.
    pub secondary: LoadoutWeapon,
    /// Armor equipped on join, before inventory is filled.
    pub armor: Vec<ItemId>,
    /// Inventory set on join.
    pub inventory: Vec<ItemGrant>,
    /// Scope activated on join.
    pub scope: ItemId,
    /// Boost meter on join.
    pub boost: f32,
    /// Non-droppable perks granted on join unless the map grants them itself.
    pub perks: Vec<PerkId>,
    /// Items given to a killer.
    pub kill_rewards: Vec<ItemGrant>,
    /// Throwable equipped for a killer who held none of it before the reward.
    pub auto_equip: Option<ItemId>,
}

impl Default for DeathmatchConfig {
    fn default() -> Self {
        const BAG_TIER: Tier = 3;
        Self {
            map: MapId::default(),
            primary: LoadoutWeapon {
                item: ItemId::new("mosin"),
                ammo: 5,
            },
            secondary: LoadoutWeapon {
                item: ItemId::new("spas12"),
                ammo: 9,
            },
            armor: ["backpack03", "helmet03", "chest03"]
                .into_iter()
                .map(ItemId::new)
                .collect(),
            inventory: vec![
                ItemGrant::fixed("frag", 3),
                ItemGrant::fixed("smoke", 1),
                ItemGrant::fixed("strobe", 1),
                ItemGrant::fixed("mirv", 1),
                ItemGrant::tier_cap("bandage", BAG_TIER),
                ItemGrant::tier_cap("healthkit", BAG_TIER),
                ItemGrant::tier_cap("soda", BAG_TIER),
                ItemGrant::tier_cap("painkiller", BAG_TIER),
                ItemGrant::fixed("1xscope", 1),
                ItemGrant::fixed("2xscope", 1),
                ItemGrant::fixed("4xscope", 1),
            ],
            scope: ItemId::new("4xscope"),
            boost: 100.0,
            perks: ["endless_ammo", "self_revive", "takedown"]
                .into_iter()
                .map(PerkId::new)
                .collect(),
            kill_rewards: vec![ItemGrant::fixed("frag", 2), ItemGrant::fixed("mirv", 1)],
            auto_equip: Some(ItemId::new("frag")),
        }
    }
}

// =============================================================================
// Plugin
// =============================================================================

/// Fixed-loadout deathmatch.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use skirmish_core::plugin::GamePlugin;
/// use skirmish_core::plugins::{DeathmatchConfig, DeathmatchPlugin};
///
/// let plugin = DeathmatchPlugin::new(Arc::new(DeathmatchConfig::default()));
/// assert_eq!(plugin.declaration().id.as_str(), "deathmatch");
/// ```
pub struct DeathmatchPlugin {
    declaration: PluginDeclaration,
    config: Arc<DeathmatchConfig>,
}

impl DeathmatchPlugin {
    /// Mode identifier the plugin is registered under.
    pub const MODE: &'static str = "deathmatch";

    /// Creates a new `DeathmatchPlugin`.
    #[must_use]
    pub fn new(config: Arc<DeathmatchConfig>) -> Self {
        Self {
            declaration: PluginDeclaration::new(
                Self::MODE,
                &[EventKind::PlayerJoined, EventKind::PlayerKilled],
            ),
            config,
        }
    }
}

impl GamePlugin for DeathmatchPlugin {
    fn declaration(&self) -> &PluginDeclaration {
        &self.declaration
    }

    fn init_listeners(&self, listeners: &mut Listeners<'_>) -> Result<(), BusError> {
        let config = Arc::clone(&self.config);
        listeners.on(EventKind::PlayerJoined, move |event, world| {
            equip_loadout(&config, event, world)
        })?;
        listeners.on(EventKind::PlayerKilled, strip_victim)?;
        let config = Arc::clone(&self.config);
        listeners.on(EventKind::PlayerKilled, move |event, world| {
            reward_killer(&config, event, world)
        })?;
        Ok(())
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn equip_loadout(
    config: &DeathmatchConfig,
    event: &LifecycleEvent,
    world: &mut World<'_>,
) -> HandlerResult {
    if world.map.id != config.map {
        return Ok(());
    }
    let (catalog, tables, map) = (world.catalog, world.tables, world.map);
    let id = event.primary_participant();
    let Some(player) = world.participant_mut(id) else {
        debug!(participant = %id, "joined participant not in roster");
        return Ok(());
    };

    for (slot, weapon) in [
        (WeaponSlot::Primary, &config.primary),
        (WeaponSlot::Secondary, &config.secondary),
    ] {
        applied(
            player.set_weapon(slot, &weapon.item, weapon.ammo, catalog),
            id,
            "loadout weapon",
        );
    }

    // Armor first: the backpack tier decides inventory caps.
    for item in &config.armor {
        applied(player.equip_armor(item, catalog, tables), id, "loadout armor");
    }

    for grant in &config.inventory {
        let count = match grant.quantity {
            Quantity::Fixed(count) => Some(count),
            Quantity::TierCap(tier) => tables.capacity.cap(&grant.item, tier),
        };
        let Some(count) = count else {
            debug!(participant = %id, item = %grant.item, "no capacity entry for starting item");
            continue;
        };
        applied(player.set_item(&grant.item, count, tables), id, "starting item");
    }

    applied(player.set_scope(&config.scope, catalog), id, "scope");
    player.set_boost(config.boost);
    applied(player.select_weapon(WeaponSlot::Primary), id, "select primary");

    for perk in &config.perks {
        if map.grants_perk(perk) {
            debug!(participant = %id, %perk, map = %map.id, "perk left to the map's perk system");
            continue;
        }
        applied(player.add_perk(perk, false, catalog), id, "loadout perk");
    }
    Ok(())
}

fn strip_victim(event: &LifecycleEvent, world: &mut World<'_>) -> HandlerResult {
    let catalog = world.catalog;
    let id = event.primary_participant();
    let Some(victim) = world.participant_mut(id) else {
        debug!(participant = %id, "killed participant not in roster");
        return Ok(());
    };

    for perk in victim.perks().ids() {
        applied(victim.remove_perk(&perk), id, "strip perk");
    }

    victim.force_select(WeaponSlot::Melee);

    for slot in WeaponSlot::GUNS {
        let is_loadout_gun = victim
            .weapon(slot)
            .item
            .as_ref()
            .is_some_and(|item| catalog.is_loadout_item(item, LOADOUT_GUN_CATEGORY));
        if is_loadout_gun {
            victim.clear_weapon(slot);
        }
    }
    Ok(())
}

fn reward_killer(
    config: &DeathmatchConfig,
    event: &LifecycleEvent,
    world: &mut World<'_>,
) -> HandlerResult {
    let LifecycleEvent::PlayerKilled {
        killer: Some(DamageSource::Participant(id)),
        ..
    } = event
    else {
        return Ok(());
    };
    let id = *id;
    let (catalog, tables) = (world.catalog, world.tables);
    let Some(killer) = world.participant_mut(id) else {
        debug!(participant = %id, "killer not in roster");
        return Ok(());
    };

    if let Some(throwable) = &config.auto_equip {
        if killer.item_count(throwable) == 0 {
            applied(
                killer.set_weapon(WeaponSlot::Throwable, throwable, 0, catalog),
                id,
                "auto-equip throwable",
            );
        }
    }

    for grant in &config.kill_rewards {
        let amount = match grant.quantity {
            Quantity::Fixed(count) => Some(count),
            Quantity::TierCap(tier) => tables.capacity.cap(&grant.item, tier),
        };
        if let Some(amount) = amount {
            applied(killer.give_item(&grant.item, amount, tables), id, "kill reward");
        }
    }
    killer.mark_dirty(DirtyFlags::INVENTORY | DirtyFlags::WEAPONS);

    for slot in WeaponSlot::GUNS {
        if !killer.weapon(slot).is_empty() {
            applied(killer.refill(slot, catalog), id, "refill");
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::ParticipantId;
    use crate::plugin::PluginManager;
    use crate::tests::{activate, damaged_by, joined, killed_by, killed_by_environment, Fixture};

    fn manager() -> PluginManager {
        PluginManager::with_builtin_modes(&crate::config::ModesConfig::default())
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id)
    }

    mod config_tests {
        use super::*;

        #[test]
        fn defaults_describe_the_classic_loadout() {
            let config = DeathmatchConfig::default();
            assert_eq!(config.map.as_str(), "main");
            assert_eq!(config.primary.item.as_str(), "mosin");
            assert_eq!(config.secondary.ammo, 9);
            assert_eq!(config.inventory.len(), 11);
            assert_eq!(config.perks.len(), 3);
        }

        #[test]
        fn partial_json_keeps_defaults() {
            let config: DeathmatchConfig =
                serde_json::from_str(r#"{ "map": "woods", "boost": 40.0 }"#).unwrap();
            assert_eq!(config.map.as_str(), "woods");
            assert!((config.boost - 40.0).abs() < f32::EPSILON);
            assert_eq!(config.scope.as_str(), "4xscope");
        }

        #[test]
        fn quantity_parses_both_forms() {
            let grants: Vec<ItemGrant> = serde_json::from_str(
                r#"[{ "item": "frag", "quantity": { "fixed": 2 } },
                    { "item": "soda", "quantity": { "tier_cap": 1 } }]"#,
            )
            .unwrap();
            assert_eq!(grants[0].quantity, Quantity::Fixed(2));
            assert_eq!(grants[1].quantity, Quantity::TierCap(1));
        }
    }

    mod join_tests {
        use super::*;

        #[test]
        fn join_equips_full_loadout() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let id = fx.join_clean("ada");

            let report = fx.publish(&bus, &joined(id));
            assert!(report.is_clean());

            let p = fx.participant(id);
            assert!(p.weapon(WeaponSlot::Primary).holds(&item("mosin")));
            assert_eq!(p.weapon(WeaponSlot::Primary).ammo, 5);
            assert!(p.weapon(WeaponSlot::Secondary).holds(&item("spas12")));
            assert_eq!(p.weapon(WeaponSlot::Secondary).ammo, 9);
            assert_eq!(p.current_slot(), WeaponSlot::Primary);

            assert_eq!(p.backpack_tier(), 3);
            assert_eq!(p.item_count(&item("frag")), 3);
            assert_eq!(p.item_count(&item("smoke")), 1);
            assert_eq!(p.item_count(&item("strobe")), 1);
            assert_eq!(p.item_count(&item("mirv")), 1);
            assert_eq!(p.item_count(&item("bandage")), 30);
            assert_eq!(p.item_count(&item("healthkit")), 4);
            assert_eq!(p.item_count(&item("soda")), 15);
            assert_eq!(p.item_count(&item("painkiller")), 4);
            assert_eq!(p.item_count(&item("2xscope")), 1);

            assert_eq!(p.scope().as_str(), "4xscope");
            assert!((p.boost() - 100.0).abs() < f32::EPSILON);
            assert_eq!(
                p.perks().ids(),
                vec![
                    PerkId::new("endless_ammo"),
                    PerkId::new("self_revive"),
                    PerkId::new("takedown")
                ]
            );
            assert!(p.perks().iter().all(|perk| !perk.droppable));
        }

        #[test]
        fn perk_mode_map_keeps_its_own_perks() {
            let modes = crate::config::ModesConfig {
                deathmatch: DeathmatchConfig {
                    map: MapId::new("cobalt"),
                    ..DeathmatchConfig::default()
                },
                ..crate::config::ModesConfig::default()
            };
            let manager = PluginManager::with_builtin_modes(&modes);
            let mut fx = Fixture::on_map("cobalt");
            let (bus, _handle) = activate(&manager, "deathmatch", "cobalt");
            let id = fx.join_clean("ada");

            fx.publish(&bus, &joined(id));

            let p = fx.participant(id);
            assert!(p.has_perk(&PerkId::new("endless_ammo")));
            assert!(p.has_perk(&PerkId::new("self_revive")));
            assert!(!p.has_perk(&PerkId::new("takedown")));
        }

        #[test]
        fn other_maps_are_ignored() {
            let mut bus = crate::bus::EventBus::new();
            let plugin = DeathmatchPlugin::new(Arc::new(DeathmatchConfig::default()));
            let declaration = plugin.declaration().clone();
            let mut listeners = Listeners::new(&mut bus, crate::bus::OwnerId::new(99), &declaration);
            plugin.init_listeners(&mut listeners).unwrap();
            bus.seal();

            let mut fx = Fixture::on_map("woods");
            let id = fx.join_clean("ada");
            fx.publish(&bus, &joined(id));

            let p = fx.participant(id);
            assert!(p.weapon(WeaponSlot::Primary).is_empty());
            assert!(p.perks().is_empty());
            assert!(p.dirty().is_empty());
        }

        #[test]
        fn invalid_loadout_item_skips_only_that_step() {
            let config = DeathmatchConfig {
                primary: LoadoutWeapon {
                    item: item("laser_rifle"),
                    ammo: 5,
                },
                ..DeathmatchConfig::default()
            };
            let mut bus = crate::bus::EventBus::new();
            let plugin = DeathmatchPlugin::new(Arc::new(config));
            let declaration = plugin.declaration().clone();
            let mut listeners = Listeners::new(&mut bus, crate::bus::OwnerId::new(7), &declaration);
            plugin.init_listeners(&mut listeners).unwrap();

            let mut fx = Fixture::on_map("main");
            let id = fx.join_clean("ada");
            let report = fx.publish(&bus, &joined(id));
            assert!(report.is_clean());

            let p = fx.participant(id);
            assert!(p.weapon(WeaponSlot::Primary).is_empty());
            assert!(p.weapon(WeaponSlot::Secondary).holds(&item("spas12")));
            // Primary is empty, so the selection stays on melee.
            assert_eq!(p.current_slot(), WeaponSlot::Melee);
            assert_eq!(p.item_count(&item("frag")), 3);
        }
    }

    mod kill_tests {
        use super::*;

        fn joined_pair(fx: &mut Fixture, bus: &crate::bus::EventBus) -> (ParticipantId, ParticipantId) {
            let victim = fx.join_clean("victim");
            let killer = fx.join_clean("killer");
            fx.publish(bus, &joined(victim));
            fx.publish(bus, &joined(killer));
            (victim, killer)
        }

        #[test]
        fn victim_loses_perks_and_loadout_guns() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, killer) = joined_pair(&mut fx, &bus);

            // A non-loadout gun in the secondary slot survives the death.
            fx.roster
                .get_mut(victim)
                .unwrap()
                .set_weapon(WeaponSlot::Secondary, &item("m9"), 7, &fx.catalog)
                .unwrap();

            let report = fx.publish(&bus, &killed_by(victim, killer));
            assert!(report.is_clean());
            assert_eq!(report.invoked, 2);

            let p = fx.participant(victim);
            assert!(p.perks().is_empty());
            assert_eq!(p.current_slot(), WeaponSlot::Melee);
            let primary = p.weapon(WeaponSlot::Primary);
            assert!(primary.is_empty());
            assert_eq!(primary.ammo, 0);
            assert!(primary.cooldown.is_zero());
            assert!(p.weapon(WeaponSlot::Secondary).holds(&item("m9")));
            assert_eq!(p.weapon(WeaponSlot::Secondary).ammo, 7);
        }

        #[test]
        fn victim_loadout_slots_lose_ammo_and_cooldown() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, killer) = joined_pair(&mut fx, &bus);
            {
                let v = fx.roster.get_mut(victim).unwrap();
                v.set_cooldown(WeaponSlot::Primary, std::time::Duration::from_millis(700))
                    .unwrap();
                v.set_cooldown(WeaponSlot::Secondary, std::time::Duration::from_millis(300))
                    .unwrap();
                v.select_weapon(WeaponSlot::Secondary).unwrap();
            }

            assert!(fx.publish(&bus, &killed_by(victim, killer)).is_clean());

            let v = fx.participant(victim);
            for slot in [WeaponSlot::Primary, WeaponSlot::Secondary] {
                let state = v.weapon(slot);
                assert!(state.is_empty(), "{slot:?} still holds a gun");
                assert_eq!(state.ammo, 0);
                assert!(state.cooldown.is_zero(), "{slot:?} kept its cooldown");
            }
            assert_eq!(v.current_slot(), WeaponSlot::Melee);
            assert!(v.weapons().selection_is_valid());

            let k = fx.participant(killer);
            assert_eq!(k.weapon(WeaponSlot::Primary).ammo, 5);
            assert_eq!(k.weapon(WeaponSlot::Secondary).ammo, 9);
        }

        #[test]
        fn killer_without_frags_is_rewarded_and_reloaded() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, killer) = joined_pair(&mut fx, &bus);
            {
                let k = fx.roster.get_mut(killer).unwrap();
                k.take_item(&item("frag"), 3);
                k.set_ammo(WeaponSlot::Primary, 1).unwrap();
                k.set_ammo(WeaponSlot::Secondary, 0).unwrap();
                k.set_cooldown(WeaponSlot::Primary, std::time::Duration::from_millis(300))
                    .unwrap();
                k.take_dirty();
            }

            fx.publish(&bus, &killed_by(victim, killer));

            let k = fx.participant(killer);
            assert_eq!(k.item_count(&item("frag")), 2);
            assert_eq!(k.item_count(&item("mirv")), 2);
            assert!(k.weapon(WeaponSlot::Throwable).holds(&item("frag")));
            assert_eq!(k.weapon(WeaponSlot::Primary).ammo, 5);
            assert_eq!(
                k.weapon(WeaponSlot::Primary).cooldown,
                std::time::Duration::from_millis(300)
            );
            assert_eq!(k.weapon(WeaponSlot::Secondary).ammo, 9);
            assert!(k.dirty().contains(DirtyFlags::INVENTORY | DirtyFlags::WEAPONS));
        }

        #[test]
        fn killer_holding_frags_keeps_throwable_slot() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, killer) = joined_pair(&mut fx, &bus);

            fx.publish(&bus, &killed_by(victim, killer));

            let k = fx.participant(killer);
            assert!(k.weapon(WeaponSlot::Throwable).is_empty());
            assert_eq!(k.item_count(&item("frag")), 5);
        }

        #[test]
        fn environment_kill_has_no_reward() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, killer) = joined_pair(&mut fx, &bus);
            fx.roster.get_mut(killer).unwrap().take_dirty();

            let report = fx.publish(&bus, &killed_by_environment(victim));
            assert!(report.is_clean());
            assert!(fx.participant(victim).perks().is_empty());
            assert!(fx.participant(killer).dirty().is_empty());
        }

        #[test]
        fn self_kill_strips_then_rewards() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, _) = joined_pair(&mut fx, &bus);

            fx.publish(&bus, &killed_by(victim, victim));

            let p = fx.participant(victim);
            assert!(p.perks().is_empty());
            assert!(p.weapon(WeaponSlot::Primary).is_empty());
            assert_eq!(p.item_count(&item("frag")), 5);
            assert_eq!(p.current_slot(), WeaponSlot::Melee);
        }

        #[test]
        fn missing_killer_is_a_no_op() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, _) = joined_pair(&mut fx, &bus);

            let report = fx.publish(&bus, &killed_by(victim, ParticipantId::new(404)));
            assert!(report.is_clean());
            assert!(fx.participant(victim).perks().is_empty());
        }

        #[test]
        fn damage_is_not_handled() {
            let mut fx = Fixture::on_map("main");
            let (bus, _handle) = activate(&manager(), "deathmatch", "main");
            let (victim, killer) = joined_pair(&mut fx, &bus);
            let report = fx.publish(&bus, &damaged_by(victim, killer, 30.0));
            assert_eq!(report.invoked, 0);
        }
    }
}
