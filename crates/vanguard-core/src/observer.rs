//! Local presentation events and explicit observer registration.
//!
//! The world mirror returns a list of [`PresentationEvent`]s for every
//! message it applies; the peer hands them to its [`ObserverRegistry`],
//! which forwards each one to every subscription whose [`Interest`] matches.
//! Observers never see a change before the mirror has committed it.

use std::collections::BTreeMap;
use std::fmt;

use crate::entity::EntityId;
use crate::replication::AttackReport;
use crate::status::StatusEffect;

/// A change presentation layers react to.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    /// A unit's HP changed
    HealthChanged {
        /// Unit
        entity: EntityId,
        /// HP after the change
        current: f32,
        /// Maximum HP
        max: f32,
    },
    /// An effect was inserted
    EffectApplied {
        /// Unit
        entity: EntityId,
        /// Inserted effect
        effect: StatusEffect,
    },
    /// An effect was refreshed
    EffectReapplied {
        /// Unit
        entity: EntityId,
        /// Effect after the refresh
        effect: StatusEffect,
    },
    /// An effect ended (cure or expiry)
    EffectRemoved {
        /// Unit
        entity: EntityId,
        /// Removed effect
        effect: StatusEffect,
    },
    /// A unit's action points changed
    ActionsChanged {
        /// Unit
        entity: EntityId,
        /// Points left
        remaining: u32,
        /// Pool size
        max: u32,
    },
    /// A unit entered the mirror
    UnitSpawned {
        /// Unit
        entity: EntityId,
        /// `true` for summons
        summon: bool,
    },
    /// A unit left the mirror
    UnitDestroyed {
        /// Unit
        entity: EntityId,
    },
    /// An attack was resolved by the authority
    AttackResolved(AttackReport),
}

impl PresentationEvent {
    /// Units this event concerns. Attack reports concern both participants.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityId> {
        match self {
            Self::HealthChanged { entity, .. }
            | Self::EffectApplied { entity, .. }
            | Self::EffectReapplied { entity, .. }
            | Self::EffectRemoved { entity, .. }
            | Self::ActionsChanged { entity, .. }
            | Self::UnitSpawned { entity, .. }
            | Self::UnitDestroyed { entity } => vec![*entity],
            Self::AttackResolved(report) => vec![report.attacker, report.target],
        }
    }
}

/// Receives presentation events.
pub trait Observer {
    /// Called once per matching event, in commit order.
    fn notify(&mut self, event: &PresentationEvent);
}

impl<F> Observer for F
where
    F: FnMut(&PresentationEvent),
{
    fn notify(&mut self, event: &PresentationEvent) {
        self(event);
    }
}

/// Handle returned by [`ObserverRegistry::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Which events a subscription receives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Every event
    All,
    /// Events concerning one unit
    Unit(EntityId),
}

impl Interest {
    fn matches(self, event: &PresentationEvent) -> bool {
        match self {
            Self::All => true,
            Self::Unit(id) => event.entities().contains(&id),
        }
    }
}

struct Subscription {
    interest: Interest,
    observer: Box<dyn Observer>,
}

/// Subscriptions keyed by id; dispatch runs in subscription order.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    pub fn subscribe(
        &mut self,
        interest: Interest,
        observer: impl Observer + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(
            id,
            Subscription {
                interest,
                observer: Box::new(observer),
            },
        );
        id
    }

    /// Ends a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Delivers events in order to every matching subscription.
    pub fn dispatch(&mut self, events: &[PresentationEvent]) {
        for event in events {
            for subscription in self.subscriptions.values_mut() {
                if subscription.interest.matches(event) {
                    subscription.observer.notify(event);
                }
            }
        }
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
