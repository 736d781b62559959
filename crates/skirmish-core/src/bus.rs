//! Event bus for lifecycle events.
//!
//! The simulation core publishes [`LifecycleEvent`]s; game-mode plugins
//! subscribe handlers per [`EventKind`]. Dispatch is synchronous and in
//! registration order, within the calling tick.
//!
//! # Ordering
//!
//! Handlers for one kind run strictly in the order they subscribed. A later
//! handler observes every mutation made by earlier handlers for the same
//! event.
//!
//! # Fault isolation
//!
//! A handler that returns `Err` or panics aborts the remaining handlers of
//! that publish call only. The fault is logged and returned in the
//! [`DispatchReport`]; participants keep whatever state the handler had
//! written before faulting. The next publish runs normally.
//!
//! # Registration window
//!
//! Subscriptions are accepted until [`EventBus::seal`] is called at match
//! start. Later subscriptions fail with [`BusError::Sealed`]. Removal with
//! [`EventBus::unsubscribe_all`] stays available for teardown.
//!
//! # Example
//!
//! ```
//! use skirmish_core::bus::{EventBus, OwnerId};
//! use skirmish_core::catalog::{Catalog, MapDef};
//! use skirmish_core::event::{EventKind, LifecycleEvent};
//! use skirmish_core::roster::Roster;
//! use skirmish_core::tables::ResourceTables;
//! use skirmish_core::world::World;
//!
//! let mut bus = EventBus::new();
//! bus.subscribe(OwnerId::new(1), EventKind::PlayerJoined, |event, world| {
//!     if let Some(p) = world.participant_mut(event.primary_participant()) {
//!         p.set_boost(50.0);
//!     }
//!     Ok(())
//! })
//! .unwrap();
//! bus.seal();
//!
//! let mut roster = Roster::new();
//! let id = roster.join("ada");
//! let (catalog, tables, map) = (Catalog::standard(), ResourceTables::standard(), MapDef::new("main"));
//! let mut world = World { roster: &mut roster, catalog: &catalog, tables: &tables, map: &map, tick: 0 };
//!
//! let report = bus.publish(&LifecycleEvent::PlayerJoined { participant: id }, &mut world);
//! assert_eq!(report.invoked, 1);
//! assert!(report.fault.is_none());
//! assert_eq!(roster.get(id).unwrap().boost(), 50.0);
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{error, trace};

use crate::error::BusError;
use crate::event::{EventKind, LifecycleEvent};
use crate::world::World;

/// Result type returned by event handlers.
pub type HandlerResult = anyhow::Result<()>;

/// A boxed event handler.
pub type Handler = Box<dyn Fn(&LifecycleEvent, &mut World<'_>) -> HandlerResult + Send + Sync>;

// =============================================================================
// Identifiers
// =============================================================================

/// Identity of the plugin instance that registered a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Creates an owner identity.
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

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner:{}", self.0)
    }
}

/// Identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

// =============================================================================
// Dispatch Results
// =============================================================================

/// A handler that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerFault {
    /// Owner of the faulting handler.
    pub owner: OwnerId,
    /// Subscription of the faulting handler.
    pub subscription: SubscriptionId,
    /// Event kind being dispatched.
    pub kind: EventKind,
    /// Error or panic message.
    pub message: String,
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} handler of {} faulted: {}", self.kind, self.owner, self.message)
    }
}

/// Outcome of one publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Kind that was published.
    pub kind: EventKind,
    /// Handlers invoked, including a faulting one.
    pub invoked: usize,
    /// Handlers skipped because an earlier one faulted.
    pub skipped: usize,
    /// The fault that aborted dispatch, if any.
    pub fault: Option<HandlerFault>,
}

impl DispatchReport {
    /// Returns `true` if every handler completed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.fault.is_none()
    }
}

// =============================================================================
// Event Bus
// =============================================================================

struct Subscription {
    id: SubscriptionId,
    owner: OwnerId,
    handler: Handler,
}

/// Typed, ordered, synchronous dispatch of lifecycle events.
#[derive(Default)]
pub struct EventBus {
    handlers: BTreeMap<EventKind, Vec<Subscription>>,
    next_subscription: u64,
    sealed: bool,
}

impl EventBus {
    /// Creates an empty, open bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for exactly one event kind on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// [`BusError::Sealed`] once the match has started.
    pub fn subscribe<F>(
        &mut self,
        owner: OwnerId,
        kind: EventKind,
        handler: F,
    ) -> Result<SubscriptionId, BusError>
    where
        F: Fn(&LifecycleEvent, &mut World<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        if self.sealed {
            return Err(BusError::Sealed);
        }
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.handlers.entry(kind).or_default().push(Subscription {
            id,
            owner,
            handler: Box::new(handler),
        });
        trace!(%owner, %kind, subscription = id.0, "handler subscribed");
        Ok(id)
    }

    /// Removes every handler registered by `owner`. Returns how many were
    /// removed.
    pub fn unsubscribe_all(&mut self, owner: OwnerId) -> usize {
        let mut removed = 0;
        for subscriptions in self.handlers.values_mut() {
            let before = subscriptions.len();
            subscriptions.retain(|subscription| subscription.owner != owner);
            removed += before - subscriptions.len();
        }
        self.handlers.retain(|_, subscriptions| !subscriptions.is_empty());
        removed
    }

    /// Closes the registration window.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Returns `true` once the registration window has closed.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Number of handlers registered by `owner` across all kinds.
    #[must_use]
    pub fn owner_handler_count(&self, owner: OwnerId) -> usize {
        self.handlers
            .values()
            .flatten()
            .filter(|subscription| subscription.owner == owner)
            .count()
    }

    /// Invokes every handler registered for the event's kind, in
    /// registration order.
    ///
    /// The first handler to fail (by `Err` or panic) stops dispatch for this
    /// call. Mutations it made before failing are kept.
    #[tracing::instrument(level = "trace", skip_all, fields(kind = %event.kind(), tick = world.tick))]
    pub fn publish(&self, event: &LifecycleEvent, world: &mut World<'_>) -> DispatchReport {
        let kind = event.kind();
        let subscriptions = self.handlers.get(&kind).map_or(&[][..], Vec::as_slice);
        let mut report = DispatchReport {
            kind,
            invoked: 0,
            skipped: 0,
            fault: None,
        };

        for (index, subscription) in subscriptions.iter().enumerate() {
            report.invoked += 1;
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| (subscription.handler)(event, world)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => panic_message(payload.as_ref()),
            };

            report.skipped = subscriptions.len() - index - 1;
            error!(
                owner = %subscription.owner,
                %kind,
                skipped = report.skipped,
                error = %message,
                "event handler faulted; remaining handlers for this event skipped"
            );
            report.fault = Some(HandlerFault {
                owner: subscription.owner,
                subscription: subscription.id,
                kind,
                message,
            });
            break;
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<EventKind, usize> = self
            .handlers
            .iter()
            .map(|(kind, subscriptions)| (*kind, subscriptions.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("handlers", &counts)
            .field("sealed", &self.sealed)
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

    /// Folds `step` into the boost meter so call order is observable
    /// through participant state.
    fn record_step(step: f32) -> impl Fn(&LifecycleEvent, &mut World<'_>) -> HandlerResult {
        move |event, world| {
            let p = world
                .participant_mut(event.primary_participant())
                .ok_or_else(|| anyhow::anyhow!("participant missing"))?;
            p.set_boost(p.boost() * 4.0 + step);
            Ok(())
        }
    }

    mod ordering_tests {
        use super::*;

        #[test]
        fn handlers_run_in_registration_order() {
            let mut fx = Fixture::new();
            let id = fx.roster.join("a");
            let mut bus = EventBus::new();
            let owner = OwnerId::new(0);
            bus.subscribe(owner, EventKind::PlayerJoined, record_step(1.0)).unwrap();
            bus.subscribe(owner, EventKind::PlayerJoined, record_step(2.0)).unwrap();
            bus.subscribe(owner, EventKind::PlayerJoined, record_step(3.0)).unwrap();

            let report = bus.publish(&joined(id), &mut fx.world());
            assert_eq!(report.invoked, 3);
            // 0 -> 1 -> 6 -> 27; any other order gives a different value.
            assert!((fx.roster.get(id).unwrap().boost() - 27.0).abs() < f32::EPSILON);
        }

        #[test]
        fn later_handlers_observe_earlier_mutations() {
            let mut fx = Fixture::new();
            let id = fx.roster.join("a");
            let mut bus = EventBus::new();
            let owner = OwnerId::new(0);
            bus.subscribe(owner, EventKind::PlayerJoined, |event, world| {
                world
                    .participant_mut(event.primary_participant())
                    .unwrap()
                    .set_boost(7.0);
                Ok(())
            })
            .unwrap();
            bus.subscribe(owner, EventKind::PlayerJoined, |event, world| {
                let boost = world.participant(event.primary_participant()).unwrap().boost();
                anyhow::ensure!((boost - 7.0).abs() < f32::EPSILON, "saw {boost}");
                Ok(())
            })
            .unwrap();

            let report = bus.publish(&joined(id), &mut fx.world());
            assert!(report.is_clean());
        }

        #[test]
        fn only_matching_kind_is_dispatched() {
            let mut fx = Fixture::new();
            let id = fx.roster.join("a");
            let mut bus = EventBus::new();
            bus.subscribe(OwnerId::new(0), EventKind::PlayerKilled, record_step(1.0))
                .unwrap();

            let report = bus.publish(&joined(id), &mut fx.world());
            assert_eq!(report.invoked, 0);
            assert!(fx.roster.get(id).unwrap().boost().abs() < f32::EPSILON);
        }
    }

    mod fault_tests {
        use super::*;

        #[test]
        fn error_aborts_remaining_handlers_only_for_this_publish() {
            let mut fx = Fixture::new();
            let id = fx.roster.join("a");
            let mut bus = EventBus::new();
            let owner = OwnerId::new(4);
            bus.subscribe(owner, EventKind::PlayerJoined, record_step(1.0)).unwrap();
            bus.subscribe(owner, EventKind::PlayerJoined, |_, _| {
                anyhow::bail!("loadout table missing")
            })
            .unwrap();
            bus.subscribe(owner, EventKind::PlayerJoined, record_step(9.0)).unwrap();

            let report = bus.publish(&joined(id), &mut fx.world());
            assert_eq!(report.invoked, 2);
            assert_eq!(report.skipped, 1);
            let fault = report.fault.unwrap();
            assert_eq!(fault.owner, owner);
            assert!(fault.message.contains("loadout table missing"));
            // First handler's mutation is kept; third never ran.
            assert!((fx.roster.get(id).unwrap().boost() - 1.0).abs() < f32::EPSILON);

            // The next publish dispatches from the start again.
            let report = bus.publish(&joined(id), &mut fx.world());
            assert_eq!(report.invoked, 2);
            assert!((fx.roster.get(id).unwrap().boost() - 5.0).abs() < f32::EPSILON);
        }

        #[test]
        fn panic_is_captured_as_fault() {
            let mut fx = Fixture::new();
            let id = fx.roster.join("a");
            let mut bus = EventBus::new();
            bus.subscribe(OwnerId::new(1), EventKind::PlayerJoined, |_, _| {
                panic!("index out of range")
            })
            .unwrap();

            let report = bus.publish(&joined(id), &mut fx.world());
            let fault = report.fault.unwrap();
            assert_eq!(fault.kind, EventKind::PlayerJoined);
            assert!(fault.message.contains("index out of range"));
        }
    }

    mod registration_tests {
        use super::*;

        #[test]
        fn sealed_bus_rejects_subscriptions() {
            let mut bus = EventBus::new();
            bus.seal();
            assert!(bus.is_sealed());
            let result = bus.subscribe(OwnerId::new(0), EventKind::PlayerJoined, |_, _| Ok(()));
            assert_eq!(result, Err(BusError::Sealed));
            assert_eq!(bus.handler_count(EventKind::PlayerJoined), 0);
        }

        #[test]
        fn unsubscribe_all_removes_only_that_owner() {
            let mut fx = Fixture::new();
            let id = fx.roster.join("a");
            let mut bus = EventBus::new();
            let (a, b) = (OwnerId::new(1), OwnerId::new(2));
            bus.subscribe(a, EventKind::PlayerJoined, record_step(1.0)).unwrap();
            bus.subscribe(a, EventKind::PlayerKilled, record_step(1.0)).unwrap();
            bus.subscribe(b, EventKind::PlayerJoined, record_step(2.0)).unwrap();
            bus.seal();

            assert_eq!(bus.unsubscribe_all(a), 2);
            assert_eq!(bus.owner_handler_count(a), 0);
            assert_eq!(bus.owner_handler_count(b), 1);

            let report = bus.publish(&joined(id), &mut fx.world());
            assert_eq!(report.invoked, 1);
            assert!((fx.roster.get(id).unwrap().boost() - 2.0).abs() < f32::EPSILON);
        }

        #[test]
        fn subscription_ids_are_unique() {
            let mut bus = EventBus::new();
            let first = bus
                .subscribe(OwnerId::new(0), EventKind::PlayerJoined, |_, _| Ok(()))
                .unwrap();
            let second = bus
                .subscribe(OwnerId::new(0), EventKind::PlayerJoined, |_, _| Ok(()))
                .unwrap();
            assert_ne!(first, second);
        }

        #[test]
        fn debug_lists_counts() {
            let mut bus = EventBus::new();
            bus.subscribe(OwnerId::new(0), EventKind::PlayerJoined, |_, _| Ok(()))
                .unwrap();
            let debug = format!("{bus:?}");
            assert!(debug.contains("EventBus"));
            assert!(debug.contains("PlayerJoined"));
        }
    }

    #[test]
    fn bus_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventBus>();
    }
}
