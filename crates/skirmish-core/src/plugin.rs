//! Game-mode plugins and the manager that attaches them to a match.
//!
//! A game-mode plugin is a self-contained behavior unit. It declares which
//! lifecycle events it listens to and, when activated, subscribes handlers
//! for exactly those events on the match's [`EventBus`]. Handlers mutate
//! participants through the [`World`](crate::world::World) they are given;
//! they never hold participant references between events.
//!
//! # Architecture
//!
//! - [`GamePlugin`]: the capability every mode implements
//! - [`Listeners`]: a bus view scoped to one owner and one declaration
//! - [`PluginManager`]: factories keyed by mode and map, plus activation
//!   and teardown
//! - [`NoopPlugin`]: the fallback when nothing is registered
//!
//! # Selection
//!
//! Factories are registered for a mode and a [`MapSelector`]. An exact
//! `(mode, map)` registration wins over a mode-wide [`MapSelector::Any`]
//! registration. An unknown pair activates [`NoopPlugin`]; this is not an
//! error.
//!
//! # Example
//!
//! ```
//! use skirmish_core::bus::EventBus;
//! use skirmish_core::catalog::{MapId, ModeId};
//! use skirmish_core::event::EventKind;
//! use skirmish_core::plugin::{
//!     GamePlugin, Listeners, MapSelector, PluginDeclaration, PluginId, PluginManager,
//! };
//! use skirmish_core::error::BusError;
//!
//! struct Greeter {
//!     declaration: PluginDeclaration,
//! }
//!
//! impl GamePlugin for Greeter {
//!     fn declaration(&self) -> &PluginDeclaration {
//!         &self.declaration
//!     }
//!
//!     fn init_listeners(&self, listeners: &mut Listeners<'_>) -> Result<(), BusError> {
//!         listeners.on(EventKind::PlayerJoined, |event, world| {
//!             if let Some(p) = world.participant_mut(event.primary_participant()) {
//!                 p.set_boost(25.0);
//!             }
//!             Ok(())
//!         })?;
//!         Ok(())
//!     }
//! }
//!
//! let mut manager = PluginManager::new();
//! manager.register("greet", MapSelector::Any, || {
//!     Box::new(Greeter {
//!         declaration: PluginDeclaration::new("greeter", &[EventKind::PlayerJoined]),
//!     })
//! });
//!
//! let mut bus = EventBus::new();
//! let handle = manager
//!     .activate(&ModeId::new("greet"), &MapId::new("main"), &mut bus)
//!     .unwrap();
//! assert_eq!(handle.plugin().as_str(), "greeter");
//! assert_eq!(bus.handler_count(EventKind::PlayerJoined), 1);
//!
//! assert_eq!(manager.deactivate(handle, &mut bus), 1);
//! assert_eq!(bus.handler_count(EventKind::PlayerJoined), 0);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bus::{EventBus, HandlerResult, OwnerId, SubscriptionId};
use crate::catalog::{MapId, ModeId};
use crate::error::BusError;
use crate::event::{EventKind, LifecycleEvent};
use crate::world::World;

// =============================================================================
// Plugin Identification
// =============================================================================

/// Unique identifier for a plugin type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginId(String);

impl PluginId {
    /// Creates a new `PluginId` from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Returns the plugin ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PluginId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// Plugin Declaration
// =============================================================================

/// What a plugin is and which events it listens to.
///
/// Subscriptions to kinds outside `listens` are rejected at registration
/// time with [`BusError::UndeclaredEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDeclaration {
    /// Unique identifier for this plugin.
    pub id: PluginId,
    /// Event kinds this plugin subscribes to.
    pub listens: Vec<EventKind>,
}

impl PluginDeclaration {
    /// Creates a declaration.
    #[must_use]
    pub fn new(id: &str, listens: &[EventKind]) -> Self {
        Self {
            id: PluginId::new(id),
            listens: listens.to_vec(),
        }
    }

    /// Checks if this plugin listens to the given event kind.
    #[must_use]
    pub fn listens_to(&self, kind: EventKind) -> bool {
        self.listens.contains(&kind)
    }
}

// =============================================================================
// Plugin Trait
// =============================================================================

/// A game-mode behavior unit.
///
/// # Thread Safety
///
/// Plugins must be `Send + Sync`: matches running on different worker
/// threads each activate their own instance. Per-instance state lives in
/// the handlers the plugin subscribes, never in statics shared across
/// matches.
///
/// # Implementation Guidelines
///
/// 1. **Subscribe only**: `init_listeners` registers handlers and nothing
///    else. It runs before the match starts.
/// 2. **No retained references**: handlers receive participants through
///    the world context on every call.
/// 3. **No blocking**: handlers run inline in the tick.
pub trait GamePlugin: Send + Sync {
    /// Returns the plugin's declaration.
    fn declaration(&self) -> &PluginDeclaration;

    /// Subscribes the plugin's handlers.
    ///
    /// # Errors
    ///
    /// Propagates registration failures from [`Listeners::on`].
    fn init_listeners(&self, listeners: &mut Listeners<'_>) -> Result<(), BusError>;
}

/// A scoped view of an [`EventBus`] for one plugin instance.
pub struct Listeners<'a> {
    bus: &'a mut EventBus,
    owner: OwnerId,
    declaration: &'a PluginDeclaration,
    subscribed: usize,
}

impl<'a> Listeners<'a> {
    /// Scopes `bus` to `owner`, accepting only kinds in `declaration`.
    pub fn new(bus: &'a mut EventBus, owner: OwnerId, declaration: &'a PluginDeclaration) -> Self {
        Self {
            bus,
            owner,
            declaration,
            subscribed: 0,
        }
    }

    /// Subscribes a handler for `kind`.
    ///
    /// # Errors
    ///
    /// - [`BusError::UndeclaredEvent`] if the declaration omits `kind`
    /// - [`BusError::Sealed`] if the match has already started
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&LifecycleEvent, &mut World<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        if !self.declaration.listens_to(kind) {
            return Err(BusError::UndeclaredEvent {
                plugin: self.declaration.id.clone(),
                kind,
            });
        }
        let id = self.bus.subscribe(self.owner, kind, handler)?;
        self.subscribed += 1;
        Ok(id)
    }

    /// Owner identity the handlers are registered under.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Number of handlers subscribed through this view.
    #[must_use]
    pub const fn subscribed(&self) -> usize {
        self.subscribed
    }
}

// =============================================================================
// No-op Plugin
// =============================================================================

/// Plugin that declares nothing and subscribes nothing.
#[derive(Debug, Clone)]
pub struct NoopPlugin {
    declaration: PluginDeclaration,
}

impl NoopPlugin {
    /// Identifier of the fallback plugin.
    pub const ID: &'static str = "noop";

    /// Creates a new `NoopPlugin`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            declaration: PluginDeclaration::new(Self::ID, &[]),
        }
    }
}

impl Default for NoopPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl GamePlugin for NoopPlugin {
    fn declaration(&self) -> &PluginDeclaration {
        &self.declaration
    }

    fn init_listeners(&self, _listeners: &mut Listeners<'_>) -> Result<(), BusError> {
        Ok(())
    }
}

// =============================================================================
// Plugin Manager
// =============================================================================

/// Which maps a registration applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MapSelector {
    /// Exactly one map.
    Only(MapId),
    /// Every map of the mode without a more specific registration.
    Any,
}

/// Constructs a fresh plugin instance per activation.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn GamePlugin> + Send + Sync>;

/// An activated plugin instance. Pass it back to
/// [`PluginManager::deactivate`] at match end.
#[derive(Debug, PartialEq, Eq)]
pub struct PluginHandle {
    owner: OwnerId,
    plugin: PluginId,
    mode: ModeId,
    map: MapId,
    handlers: usize,
}

impl PluginHandle {
    /// Owner identity the plugin's handlers are registered under.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Identifier of the activated plugin.
    #[must_use]
    pub const fn plugin(&self) -> &PluginId {
        &self.plugin
    }

    /// Mode the plugin was activated for.
    #[must_use]
    pub const fn mode(&self) -> &ModeId {
        &self.mode
    }

    /// Map the plugin was activated for.
    #[must_use]
    pub const fn map(&self) -> &MapId {
        &self.map
    }

    /// Handlers subscribed at activation.
    #[must_use]
    pub const fn handlers(&self) -> usize {
        self.handlers
    }

    /// Returns `true` if activation fell back to [`NoopPlugin`].
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.plugin.as_str() == NoopPlugin::ID
    }

    /// Removes every handler of this plugin instance from `bus`. Returns how
    /// many were removed. No handler of the instance fires for later events.
    pub fn detach(self, bus: &mut EventBus) -> usize {
        let removed = bus.unsubscribe_all(self.owner);
        info!(
            plugin = %self.plugin,
            mode = %self.mode(),
            map = %self.map(),
            owner = %self.owner,
            removed,
            "plugin deactivated"
        );
        removed
    }
}

/// Registry of plugin factories by mode and map.
///
/// The manager itself is shared read-only between matches; each activation
/// builds a new plugin instance, so no mutable state crosses matches.
#[derive(Default)]
pub struct PluginManager {
    factories: BTreeMap<(ModeId, MapSelector), PluginFactory>,
    next_owner: AtomicU64,
}

impl PluginManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `mode` on the selected maps, replacing any
    /// earlier registration for the same key.
    pub fn register<F>(&mut self, mode: &str, maps: MapSelector, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn GamePlugin> + Send + Sync + 'static,
    {
        let key = (ModeId::new(mode), maps);
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            debug!(mode = %key.0, maps = ?key.1, "plugin registration replaced");
        }
        self
    }

    /// Returns `true` if activation of `(mode, map)` would not fall back to
    /// the no-op plugin.
    #[must_use]
    pub fn is_registered(&self, mode: &ModeId, map: &MapId) -> bool {
        self.resolve(mode, map).is_some()
    }

    fn resolve(&self, mode: &ModeId, map: &MapId) -> Option<&PluginFactory> {
        self.factories
            .get(&(mode.clone(), MapSelector::Only(map.clone())))
            .or_else(|| self.factories.get(&(mode.clone(), MapSelector::Any)))
    }

    /// Constructs the plugin for `(mode, map)` and subscribes its handlers
    /// on `bus` under a fresh owner identity.
    ///
    /// # Errors
    ///
    /// Any [`BusError`] raised by the plugin's `init_listeners`. Handlers
    /// subscribed before the failure are removed again.
    pub fn activate(
        &self,
        mode: &ModeId,
        map: &MapId,
        bus: &mut EventBus,
    ) -> Result<PluginHandle, BusError> {
        let plugin = if let Some(factory) = self.resolve(mode, map) {
            factory()
        } else {
            debug!(%mode, %map, "no plugin registered; using no-op plugin");
            Box::new(NoopPlugin::new())
        };

        let owner = OwnerId::new(self.next_owner.fetch_add(1, Ordering::Relaxed));
        let declaration = plugin.declaration().clone();
        let mut listeners = Listeners::new(bus, owner, &declaration);
        let outcome = plugin.init_listeners(&mut listeners);
        let handlers = listeners.subscribed();

        if let Err(err) = outcome {
            bus.unsubscribe_all(owner);
            return Err(err);
        }

        info!(plugin = %declaration.id, %mode, %map, %owner, handlers, "plugin activated");
        Ok(PluginHandle {
            owner,
            plugin: declaration.id,
            mode: mode.clone(),
            map: map.clone(),
            handlers,
        })
    }

    /// Removes every handler of an activated plugin. Returns how many were
    /// removed. No handler of that plugin fires for later events.
    pub fn deactivate(&self, handle: PluginHandle, bus: &mut EventBus) -> usize {
        handle.detach(bus)
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("registrations", &self.factories.keys().collect::<Vec<_>>())
            .field("next_owner", &self.next_owner.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{joined, Fixture};

    struct BoostPlugin {
        declaration: PluginDeclaration,
        amount: f32,
    }

    impl BoostPlugin {
        fn boxed(id: &str, amount: f32) -> Box<dyn GamePlugin> {
            Box::new(Self {
                declaration: PluginDeclaration::new(id, &[EventKind::PlayerJoined]),
                amount,
            })
        }
    }

    impl GamePlugin for BoostPlugin {
        fn declaration(&self) -> &PluginDeclaration {
            &self.declaration
        }

        fn init_listeners(&self, listeners: &mut Listeners<'_>) -> Result<(), BusError> {
            let amount = self.amount;
            listeners.on(EventKind::PlayerJoined, move |event, world| {
                if let Some(p) = world.participant_mut(event.primary_participant()) {
                    p.add_boost(amount);
                }
                Ok(())
            })?;
            Ok(())
        }
    }

    /// Declares only joins but tries to subscribe to kills as well.
    struct Overreaching {
        declaration: PluginDeclaration,
    }

    impl GamePlugin for Overreaching {
        fn declaration(&self) -> &PluginDeclaration {
            &self.declaration
        }

        fn init_listeners(&self, listeners: &mut Listeners<'_>) -> Result<(), BusError> {
            listeners.on(EventKind::PlayerJoined, |_, _| Ok(()))?;
            listeners.on(EventKind::PlayerKilled, |_, _| Ok(()))?;
            Ok(())
        }
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn exact_map_wins_over_any() {
            let mut manager = PluginManager::new();
            manager
                .register("dm", MapSelector::Any, || BoostPlugin::boxed("wide", 1.0))
                .register("dm", MapSelector::Only(MapId::new("woods")), || {
                    BoostPlugin::boxed("woods_only", 2.0)
                });

            let mut bus = EventBus::new();
            let exact = manager
                .activate(&ModeId::new("dm"), &MapId::new("woods"), &mut bus)
                .unwrap();
            let wide = manager
                .activate(&ModeId::new("dm"), &MapId::new("main"), &mut bus)
                .unwrap();
            assert_eq!(exact.plugin().as_str(), "woods_only");
            assert_eq!(wide.plugin().as_str(), "wide");
            assert_eq!(exact.map().as_str(), "woods");
            assert_eq!(wide.map().as_str(), "main");
            assert_eq!(wide.mode().as_str(), "dm");
            assert_ne!(exact.owner(), wide.owner());
        }

        #[test]
        fn unknown_pair_falls_back_to_noop() {
            let manager = PluginManager::new();
            let mut bus = EventBus::new();
            let handle = manager
                .activate(&ModeId::new("nope"), &MapId::new("main"), &mut bus)
                .unwrap();
            assert!(handle.is_noop());
            assert_eq!(handle.handlers(), 0);
            for kind in EventKind::ALL {
                assert_eq!(bus.handler_count(kind), 0);
            }

            let mut fx = Fixture::new();
            let id = fx.join_clean("a");
            assert!(fx.publish(&bus, &joined(id)).is_clean());
            assert!(fx.participant(id).dirty().is_empty());
        }

        #[test]
        fn mode_without_map_match_falls_back() {
            let mut manager = PluginManager::new();
            manager.register("dm", MapSelector::Only(MapId::new("woods")), || {
                BoostPlugin::boxed("woods_only", 2.0)
            });
            assert!(manager.is_registered(&ModeId::new("dm"), &MapId::new("woods")));
            assert!(!manager.is_registered(&ModeId::new("dm"), &MapId::new("main")));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[test]
        fn deactivate_stops_further_mutation() {
            let mut manager = PluginManager::new();
            manager.register("dm", MapSelector::Any, || BoostPlugin::boxed("boost", 10.0));
            let mut bus = EventBus::new();
            let handle = manager
                .activate(&ModeId::new("dm"), &MapId::new("main"), &mut bus)
                .unwrap();
            bus.seal();

            let mut fx = Fixture::new();
            let id = fx.join_clean("a");
            fx.publish(&bus, &joined(id));
            assert!((fx.participant(id).boost() - 10.0).abs() < f32::EPSILON);

            assert_eq!(manager.deactivate(handle, &mut bus), 1);
            let report = fx.publish(&bus, &joined(id));
            assert_eq!(report.invoked, 0);
            assert!((fx.participant(id).boost() - 10.0).abs() < f32::EPSILON);
        }

        #[test]
        fn instances_are_independent_per_activation() {
            let mut manager = PluginManager::new();
            manager.register("dm", MapSelector::Any, || BoostPlugin::boxed("boost", 5.0));
            let (mut bus_a, mut bus_b) = (EventBus::new(), EventBus::new());
            let a = manager
                .activate(&ModeId::new("dm"), &MapId::new("main"), &mut bus_a)
                .unwrap();
            let b = manager
                .activate(&ModeId::new("dm"), &MapId::new("main"), &mut bus_b)
                .unwrap();

            assert_eq!(manager.deactivate(a, &mut bus_a), 1);
            assert_eq!(bus_b.handler_count(EventKind::PlayerJoined), 1);
            assert_eq!(manager.deactivate(b, &mut bus_b), 1);
        }

        #[test]
        fn activation_after_seal_is_rejected() {
            let mut manager = PluginManager::new();
            manager.register("dm", MapSelector::Any, || BoostPlugin::boxed("boost", 5.0));
            let mut bus = EventBus::new();
            bus.seal();
            let err = manager
                .activate(&ModeId::new("dm"), &MapId::new("main"), &mut bus)
                .unwrap_err();
            assert_eq!(err, BusError::Sealed);
        }

        #[test]
        fn undeclared_subscription_rolls_back() {
            let mut manager = PluginManager::new();
            manager.register("greedy", MapSelector::Any, || {
                Box::new(Overreaching {
                    declaration: PluginDeclaration::new("greedy", &[EventKind::PlayerJoined]),
                })
            });
            let mut bus = EventBus::new();
            let err = manager
                .activate(&ModeId::new("greedy"), &MapId::new("main"), &mut bus)
                .unwrap_err();
            assert_eq!(
                err,
                BusError::UndeclaredEvent {
                    plugin: PluginId::new("greedy"),
                    kind: EventKind::PlayerKilled,
                }
            );
            assert_eq!(bus.handler_count(EventKind::PlayerJoined), 0);
        }
    }

    #[test]
    fn manager_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PluginManager>();
    }
}
