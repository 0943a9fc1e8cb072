//! Peer: one participant's simulation loop.
//!
//! A `Peer` owns everything a participant needs and nothing global:
//! the world mirror, the replicator, observer subscriptions, and on the
//! authority the combat resolver's RNG and the summon schedule.
//!
//! # Flow
//!
//! 1. **DECIDE** (authority only): resolve a request, plan summons, or sweep
//!    expiry into a list of messages
//! 2. **COMMIT**: broadcast the messages to every peer, the authority included
//! 3. **APPLY**: drain the inbox; each envelope is sender-checked against the
//!    session's authority, sequence-checked, applied to the mirror, and its
//!    presentation events dispatched to observers
//!
//! The authority pumps its own inbox right after committing, so its mirror
//! reflects a decision before the next request is resolved.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use glam::Vec2;
//! use vanguard_core::config::Catalog;
//! use vanguard_core::entity::{EntityId, FactionId, Unit, UnitTypeId};
//! use vanguard_core::peer::Peer;
//! use vanguard_core::positional::ObstacleField;
//! use vanguard_core::replication::LoopbackNetwork;
//! use vanguard_core::session::{ManualClock, PeerId, SessionContext};
//!
//! let network = LoopbackNetwork::new();
//! let clock = Rc::new(ManualClock::new());
//! let session = SessionContext::new(PeerId::new(0), PeerId::new(0), clock);
//! let mut peer = Peer::new(
//!     session,
//!     Arc::new(Catalog::default()),
//!     network.connect(PeerId::new(0)),
//!     Rc::new(ObstacleField::new()),
//! );
//! peer.seed_roster([Unit::new(EntityId::new(1), UnitTypeId::new("scout"), FactionId::new(1), Vec2::ZERO)])
//!     .unwrap();
//!
//! peer.step().unwrap();
//! assert_eq!(peer.tick(), 1);
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::ability::AbilityId;
use crate::config::Catalog;
use crate::entity::{EntityId, FactionId, Unit};
use crate::observer::{Interest, Observer, ObserverRegistry, PresentationEvent, SubscriptionId};
use crate::positional::SpatialQuery;
use crate::replication::{
    Envelope, OutcomeId, ReplicationError, ReplicationMessage, Replicator, Transport,
};
use crate::resolver::{AttackRejection, AttackRequest, CombatResolver};
use crate::session::SessionContext;
use crate::summon::SummonManager;
use crate::world::{ApplyError, World};

/// Failure of a peer operation.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The request failed validation; nothing was broadcast
    #[error("attack rejected: {0}")]
    Rejected(#[from] AttackRejection),
    /// The decision could not be broadcast
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

/// One participant in a session.
pub struct Peer<T: Transport> {
    session: SessionContext,
    catalog: Arc<Catalog>,
    world: World,
    replicator: Replicator<T>,
    observers: ObserverRegistry,
    summons: SummonManager,
    resolver: CombatResolver,
    spatial: Rc<dyn SpatialQuery>,
    rng: ChaCha8Rng,
    tick: u64,
    last_sequence: Option<u64>,
}

impl<T: Transport> Peer<T> {
    /// Creates a peer. The combat RNG is seeded from the catalog's rules.
    #[must_use]
    pub fn new(
        session: SessionContext,
        catalog: Arc<Catalog>,
        transport: T,
        spatial: Rc<dyn SpatialQuery>,
    ) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(catalog.rules().rng_seed);
        let replicator = Replicator::new(transport, session.role());
        Self {
            resolver: CombatResolver::new(Arc::clone(&catalog)),
            session,
            catalog,
            world: World::new(),
            replicator,
            observers: ObserverRegistry::new(),
            summons: SummonManager::new(),
            spatial,
            rng,
            tick: 0,
            last_sequence: None,
        }
    }

    /// Seeds the initial roster. Every peer must seed the same units.
    ///
    /// # Errors
    ///
    /// [`ApplyError::DuplicateEntity`] if an id repeats; units before it
    /// stay seeded.
    pub fn seed_roster(&mut self, units: impl IntoIterator<Item = Unit>) -> Result<(), ApplyError> {
        let mut events = Vec::new();
        for unit in units {
            let entity = unit.id();
            self.world.insert_unit(unit)?;
            events.push(PresentationEvent::UnitSpawned {
                entity,
                summon: false,
            });
        }
        self.observers.dispatch(&events);
        Ok(())
    }

    /// The session context.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The shared catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// This peer's mirror.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The summon expiry schedule (empty on replicas).
    #[must_use]
    pub const fn summons(&self) -> &SummonManager {
        &self.summons
    }

    /// Ticks stepped so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Sequence of the last envelope consumed, if any.
    #[must_use]
    pub const fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Registers an observer.
    pub fn subscribe(
        &mut self,
        interest: Interest,
        observer: impl Observer + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(interest, observer)
    }

    /// Ends a subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Resolves and commits an attack.
    ///
    /// # Errors
    ///
    /// [`PeerError::Rejected`] when validation fails (including on a
    /// replica); [`PeerError::Replication`] when the broadcast fails.
    pub fn request_attack(&mut self, request: &AttackRequest) -> Result<OutcomeId, PeerError> {
        if !self.session.is_authority() {
            return Err(AttackRejection::NotAuthority.into());
        }

        let outcome = self.resolver.resolve(
            request,
            &self.world,
            self.spatial.as_ref(),
            &mut self.rng,
        )?;
        let summons = match &outcome.summon {
            Some(summon) => self.summons.plan(
                &self.session,
                &self.world,
                &self.catalog,
                summon.caster,
                &summon.ability,
                summon.center,
            ),
            None => Vec::new(),
        };

        let id = self.commit(outcome.into_messages(summons))?;
        self.pump();
        Ok(id)
    }

    /// Spawns the summons of `ability` around `center` outside of an attack.
    ///
    /// Silently does nothing (`Ok(None)`) on a replica, for an unknown
    /// caster or ability, or for an ability without summon parameters.
    ///
    /// # Errors
    ///
    /// [`PeerError::Replication`] when the broadcast fails.
    pub fn spawn_summons(
        &mut self,
        caster: EntityId,
        ability: &AbilityId,
        center: Vec2,
    ) -> Result<Option<OutcomeId>, PeerError> {
        let messages = self.summons.plan(
            &self.session,
            &self.world,
            &self.catalog,
            caster,
            ability,
            center,
        );
        if messages.is_empty() {
            return Ok(None);
        }
        let id = self.commit(messages)?;
        self.pump();
        Ok(Some(id))
    }

    /// Starts a faction's turn: advances every unit's effects by `elapsed`,
    /// then refills the faction's action points.
    ///
    /// # Errors
    ///
    /// [`ReplicationError::NotAuthority`] on a replica, or a broadcast failure.
    pub fn begin_turn(&mut self, faction: FactionId, elapsed: f32) -> Result<OutcomeId, PeerError> {
        if !self.session.is_authority() {
            return Err(ReplicationError::NotAuthority.into());
        }
        debug!(%faction, elapsed, "turn started");
        let id = self.commit(vec![
            ReplicationMessage::EffectsTicked { elapsed },
            ReplicationMessage::TurnStarted { faction },
        ])?;
        self.pump();
        Ok(id)
    }

    /// Advances one simulation tick. The authority sweeps summon expiry;
    /// every peer then applies whatever has arrived.
    ///
    /// # Errors
    ///
    /// [`PeerError::Replication`] when the expiry broadcast fails.
    pub fn step(&mut self) -> Result<(), PeerError> {
        self.tick += 1;
        if self.session.is_authority() {
            let due = self.summons.expire(self.session.now());
            if !due.is_empty() {
                debug!(count = due.len(), now = %self.session.now(), "summons expired");
                self.commit(due)?;
            }
        }
        self.pump();
        Ok(())
    }

    /// Applies every envelope delivered so far. Envelopes from any peer other
    /// than the session's authority are logged and dropped before the
    /// sequence check, as are messages that do not fit the mirror. Returns
    /// how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        for (sender, envelope) in self.replicator.receive() {
            if sender != self.session.authority() {
                warn!(
                    peer = %self.session.local_peer(),
                    %sender,
                    authority = %self.session.authority(),
                    sequence = envelope.sequence,
                    kind = envelope.message.kind(),
                    "dropping envelope from non-authority sender"
                );
                continue;
            }
            match self.apply_envelope(&envelope) {
                Ok(()) => applied += 1,
                Err(error) => warn!(
                    peer = %self.session.local_peer(),
                    sequence = envelope.sequence,
                    outcome = %envelope.outcome,
                    kind = envelope.message.kind(),
                    %error,
                    "dropping replication message"
                ),
            }
        }
        applied
    }

    /// Applies one envelope and notifies observers. The caller vouches that
    /// it came from the authority; [`pump`](Self::pump) checks the sender.
    ///
    /// # Errors
    ///
    /// [`ApplyError::StaleSequence`] for an envelope at or below the last
    /// consumed sequence (it is not consumed); any other [`ApplyError`]
    /// leaves the mirror untouched but consumes the sequence.
    pub fn apply_envelope(&mut self, envelope: &Envelope) -> Result<(), ApplyError> {
        if let Some(last) = self.last_sequence {
            if envelope.sequence <= last {
                return Err(ApplyError::StaleSequence {
                    sequence: envelope.sequence,
                    last,
                });
            }
        }
        self.last_sequence = Some(envelope.sequence);

        let events = self.world.apply(&envelope.message, &self.catalog)?;
        trace!(
            peer = %self.session.local_peer(),
            sequence = envelope.sequence,
            kind = envelope.message.kind(),
            events = events.len(),
            "applied"
        );
        self.observers.dispatch(&events);
        Ok(())
    }

    fn commit(&mut self, messages: Vec<ReplicationMessage>) -> Result<OutcomeId, PeerError> {
        let id = self.replicator.broadcast(messages.clone(), self.tick)?;
        self.summons.track(&messages);
        debug!(outcome = %id, messages = messages.len(), tick = self.tick, "committed");
        Ok(id)
    }
}

impl<T: Transport> fmt::Debug for Peer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("session", &self.session)
            .field("tick", &self.tick)
            .field("units", &self.world.len())
            .field("summons", &self.summons.len())
            .field("last_sequence", &self.last_sequence)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}
