//! Session setup utilities for scenario tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;

use crate::config::{Catalog, MatchConfig};
use crate::entity::{EntityId, FactionId, StatBlock, Unit, UnitTypeId};
use crate::observer::{Interest, PresentationEvent};
use crate::peer::Peer;
use crate::positional::{CoverTags, ObstacleField};
use crate::replication::{Envelope, LoopbackNetwork, LoopbackTransport, Transport};
use crate::resolver::AttackRequest;
use crate::session::{GameTime, ManualClock, PeerId, SessionContext};

// =============================================================================
// Catalog and roster
// =============================================================================

/// Ids of the standard roster.
pub const KNIGHT: EntityId = EntityId::new(1);
/// Faction 1 ranged unit.
pub const ARCHER: EntityId = EntityId::new(2);
/// Faction 2 heavy unit.
pub const BRUTE: EntityId = EntityId::new(3);
/// Faction 2 caster.
pub const SHAMAN: EntityId = EntityId::new(4);

/// Peer id of the session authority.
pub const AUTHORITY_PEER: PeerId = PeerId::new(0);

/// Player faction.
pub const BLUE: FactionId = FactionId::new(1);
/// Opposing faction.
pub const RED: FactionId = FactionId::new(2);

/// Match document used by the scenario tests.
pub const SKIRMISH_JSON: &str = r#"{
    "rules": { "flank_radius": 1.2, "summon_radius": 2.0, "rng_seed": 1234 },
    "unit_types": [
        { "id": "wolf", "name": "Spirit Wolf", "max_hp": 20.0, "stats": { "strength": 4.0 }, "max_actions": 1 }
    ],
    "abilities": [
        { "id": "strike", "kind": "physical", "base_damage": 20.0, "accuracy": 50.0, "range": 5.0 },
        { "id": "flurry", "kind": "physical", "base_damage": 6.0, "accuracy": 60.0, "hits": 3, "range": 4.0 },
        {
            "id": "ignite", "kind": "magical", "base_damage": 10.0, "accuracy": 200.0, "range": 8.0,
            "effects": [
                { "op": "apply", "effect": "burning", "duration": 2.0 },
                { "op": "apply", "effect": "shielded", "duration": 1.0, "target": "caster" }
            ]
        },
        {
            "id": "cleanse", "kind": "magical", "base_damage": 0.0, "accuracy": 0.0, "range": 8.0,
            "effects": [{ "op": "remove", "effect": "burning", "target": "caster" }]
        },
        {
            "id": "frenzy", "kind": "physical", "base_damage": 30.0, "range": 2.0,
            "requires_anxiety_threshold": true, "anxiety_threshold": 40.0
        },
        {
            "id": "call_wolves", "kind": "magical", "base_damage": 0.0, "range": 8.0, "action_cost": 2,
            "summon": { "unit_type": "wolf", "count": 4, "duration": 10.0 }
        },
        { "id": "bite", "kind": "physical", "base_damage": 5.0, "range": 1.5 }
    ]
}"#;

/// The validated skirmish catalog.
pub fn skirmish_catalog() -> Arc<Catalog> {
    Arc::new(
        MatchConfig::from_json_str(SKIRMISH_JSON)
            .unwrap()
            .into_catalog()
            .unwrap(),
    )
}

/// Four units, two per faction.
///
/// - Knight (blue) at (0, 0): 3 actions, anxious enough for `frenzy`
/// - Archer (blue) at (3, 1): flanks the brute
/// - Brute (red) at (3, 0): armored
/// - Shaman (red) at (6, 0)
pub fn roster() -> Vec<Unit> {
    vec![
        Unit::new(KNIGHT, UnitTypeId::new("knight"), BLUE, Vec2::new(0.0, 0.0))
            .with_max_hp(100.0)
            .with_max_actions(3)
            .with_anxiety(50.0)
            .with_stats(StatBlock {
                affinity: 5.0,
                strength: 30.0,
                magic_power: 20.0,
                armor: 20.0,
                ..StatBlock::default()
            }),
        Unit::new(ARCHER, UnitTypeId::new("archer"), BLUE, Vec2::new(3.0, 1.0))
            .with_max_hp(60.0)
            .with_stats(StatBlock {
                strength: 12.0,
                ..StatBlock::default()
            }),
        Unit::new(BRUTE, UnitTypeId::new("brute"), RED, Vec2::new(3.0, 0.0))
            .with_max_hp(120.0)
            .with_stats(StatBlock {
                strength: 25.0,
                armor: 50.0,
                ..StatBlock::default()
            }),
        Unit::new(SHAMAN, UnitTypeId::new("shaman"), RED, Vec2::new(6.0, 0.0))
            .with_max_hp(70.0)
            .with_stats(StatBlock {
                magic_power: 15.0,
                magic_resistance: 10.0,
                ..StatBlock::default()
            }),
    ]
}

/// A low wall between the knight and the shaman.
pub fn battlefield() -> ObstacleField {
    ObstacleField::new().with(Vec2::new(4.5, -0.2), 0.4, CoverTags::MEDIUM_COVER)
}

// =============================================================================
// Session
// =============================================================================

/// An authority and its replicas on one loopback network and one clock.
pub struct TestSession {
    /// The network; connect extra endpoints to observe traffic
    pub network: LoopbackNetwork,
    /// Shared session clock
    pub clock: Rc<ManualClock>,
    /// Peer 0, the authority
    pub authority: Peer<LoopbackTransport>,
    /// Peers 1..
    pub replicas: Vec<Peer<LoopbackTransport>>,
}

impl TestSession {
    /// Builds a seeded session with the standard roster.
    pub fn new(replicas: u32) -> Self {
        Self::with_catalog(replicas, skirmish_catalog())
    }

    /// Builds a seeded session over a specific catalog.
    pub fn with_catalog(replicas: u32, catalog: Arc<Catalog>) -> Self {
        let network = LoopbackNetwork::new();
        let clock = Rc::new(ManualClock::new());
        let spatial = Rc::new(battlefield());

        let make = |id: u32| {
            let session = SessionContext::new(PeerId::new(id), AUTHORITY_PEER, clock.clone());
            let mut peer = Peer::new(
                session,
                Arc::clone(&catalog),
                network.connect(PeerId::new(id)),
                spatial.clone(),
            );
            peer.seed_roster(roster()).unwrap();
            peer
        };

        let authority = make(AUTHORITY_PEER.as_u32());
        let replicas = (1..=replicas).map(make).collect();
        Self {
            network,
            clock,
            authority,
            replicas,
        }
    }

    /// Advances the clock and steps every peer, authority first.
    pub fn step(&mut self, seconds: f64) {
        self.clock.advance(seconds);
        self.authority.step().unwrap();
        for replica in &mut self.replicas {
            replica.step().unwrap();
        }
    }

    /// Lets every replica apply what has arrived.
    pub fn sync(&mut self) {
        for replica in &mut self.replicas {
            replica.pump();
        }
    }

    /// Current session time.
    pub fn now(&self) -> GameTime {
        self.authority.session().now()
    }

    /// Shorthand for an authority attack.
    pub fn attack(
        &mut self,
        attacker: EntityId,
        target: EntityId,
        ability: &str,
    ) -> Result<crate::replication::OutcomeId, crate::peer::PeerError> {
        self.authority
            .request_attack(&AttackRequest::new(attacker, target, ability))
    }

    /// Asserts every replica mirror equals the authority's.
    pub fn assert_converged(&self) {
        for (i, replica) in self.replicas.iter().enumerate() {
            assert_eq!(
                replica.world(),
                self.authority.world(),
                "replica {} diverged from the authority",
                i + 1
            );
        }
    }
}

// =============================================================================
// Observation
// =============================================================================

/// Records every event a peer dispatches.
pub fn record(peer: &mut Peer<LoopbackTransport>) -> Rc<RefCell<Vec<PresentationEvent>>> {
    record_unit(peer, Interest::All)
}

/// Records the events matching `interest`.
pub fn record_unit(
    peer: &mut Peer<LoopbackTransport>,
    interest: Interest,
) -> Rc<RefCell<Vec<PresentationEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    peer.subscribe(interest, move |event: &PresentationEvent| {
        sink.borrow_mut().push(event.clone());
    });
    log
}

/// Decodes everything an endpoint has received.
pub fn drain_envelopes(endpoint: &mut LoopbackTransport) -> Vec<Envelope> {
    endpoint
        .drain()
        .iter()
        .map(|(_, bytes)| Envelope::from_bytes(bytes).unwrap())
        .collect()
}

/// Ids of the summons in a peer's mirror.
pub fn summon_ids(peer: &Peer<LoopbackTransport>) -> Vec<EntityId> {
    peer.world()
        .units()
        .filter(|u| u.is_summon())
        .map(crate::entity::Unit::id)
        .collect()
}
