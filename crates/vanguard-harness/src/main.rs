//! Loopback skirmish harness.
//!
//! Runs one authority and a number of replicas in a single process over the
//! in-memory transport, lets a trivial AI play a few turns, and checks that
//! every replica ends on the authority's mirror.
//!
//! Run with: `cargo run -p vanguard-harness -- --replicas 3 --turns 8`
//! Set `RUST_LOG=vanguard_core=debug` to see every resolved attack.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use glam::Vec2;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use vanguard_core::replication::LoopbackTransport;
use vanguard_core::{
    AttackRequest, Catalog, CoverTags, EntityId, FactionId, Interest, LoopbackNetwork,
    ManualClock, MatchConfig, ObstacleField, Peer, PeerError, PeerId, PresentationEvent,
    SessionContext, Unit, UnitTypeId,
};

/// Built-in match used when no config file is given.
const DEFAULT_MATCH: &str = r#"{
    "rules": { "flank_radius": 1.5, "summon_radius": 1.5, "rng_seed": 7 },
    "unit_types": [
        { "id": "knight", "name": "Knight", "max_hp": 110.0, "max_actions": 2,
          "stats": { "strength": 25.0, "armor": 30.0, "affinity": 5.0 } },
        { "id": "mystic", "name": "Mystic", "max_hp": 70.0, "max_actions": 2, "anxiety": 60.0,
          "stats": { "magic_power": 20.0, "magic_resistance": 15.0 } },
        { "id": "imp", "name": "Imp", "max_hp": 15.0, "max_actions": 1,
          "stats": { "strength": 6.0 } }
    ],
    "abilities": [
        {
            "id": "hex", "kind": "magical", "base_damage": 12.0, "accuracy": 70.0, "range": 7.0,
            "effects": [{ "op": "apply", "effect": "burning", "duration": 2.0 }]
        },
        { "id": "cleave", "kind": "physical", "base_damage": 18.0, "accuracy": 65.0, "hits": 2, "range": 6.0 },
        {
            "id": "call_imps", "kind": "magical", "base_damage": 0.0, "accuracy": 0.0, "range": 9.0,
            "action_cost": 2, "requires_anxiety_threshold": true, "anxiety_threshold": 50.0,
            "summon": { "unit_type": "imp", "count": 3, "duration": 4.0 }
        },
        { "id": "claw", "kind": "physical", "base_damage": 4.0, "accuracy": 80.0, "range": 9.0 }
    ]
}"#;

const AUTHORITY: PeerId = PeerId::new(0);
const BLUE: FactionId = FactionId::new(1);
const RED: FactionId = FactionId::new(2);

/// Plays a scripted skirmish over the loopback transport
#[derive(Parser, Debug)]
#[command(name = "vanguard-harness")]
#[command(about = "Exercise authority replication in one process", long_about = None)]
#[command(version)]
struct Cli {
    /// Match config file (JSON); the built-in skirmish is used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the combat RNG seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of replica peers
    #[arg(short, long, default_value_t = 2)]
    replicas: u32,

    /// Number of full rounds (one turn per faction)
    #[arg(short, long, default_value_t = 6)]
    turns: u32,

    /// Session seconds that pass per turn
    #[arg(long, default_value_t = 1.0)]
    turn_seconds: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vanguard_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let catalog = Arc::new(load_catalog(&cli)?);
    let mut skirmish = Skirmish::new(Arc::clone(&catalog), cli.replicas)?;

    info!(
        replicas = cli.replicas,
        turns = cli.turns,
        seed = catalog.rules().rng_seed,
        units = skirmish.authority.world().len(),
        "skirmish started"
    );

    for round in 1..=cli.turns {
        for faction in [BLUE, RED] {
            skirmish.play_turn(faction, cli.turn_seconds)?;
        }
        let alive: Vec<usize> = [BLUE, RED]
            .iter()
            .map(|f| {
                skirmish
                    .authority
                    .world()
                    .faction_units(*f)
                    .filter(|u| u.is_alive())
                    .count()
            })
            .collect();
        info!(round, blue = alive[0], red = alive[1], "round finished");
        if alive.contains(&0) {
            break;
        }
    }

    // Let every outstanding summon run out
    skirmish.advance(f64::from(cli.turn_seconds) * 10.0)?;
    skirmish.verify()?;

    info!(
        sequence = ?skirmish.authority.last_sequence(),
        events = skirmish.events.borrow().len(),
        "all replicas converged"
    );
    Ok(())
}

fn load_catalog(cli: &Cli) -> Result<Catalog> {
    let mut config = match &cli.config {
        Some(path) => MatchConfig::load(path)
            .with_context(|| format!("loading match config {}", path.display()))?,
        None => MatchConfig::from_json_str(DEFAULT_MATCH).context("parsing built-in match")?,
    };
    if let Some(seed) = cli.seed {
        config.rules.rng_seed = seed;
    }
    config.into_catalog().context("validating match config")
}

/// Every unit type that is not only ever summoned, one per faction.
fn roster(catalog: &Catalog) -> Vec<Unit> {
    let summoned: BTreeSet<&UnitTypeId> = catalog
        .abilities()
        .filter_map(|a| a.summon.as_ref().map(|s| &s.unit_type))
        .collect();

    let mut units = Vec::new();
    let mut next_id = 1;
    for (row, template) in catalog
        .unit_types()
        .filter(|t| !summoned.contains(&t.id))
        .enumerate()
    {
        #[allow(clippy::cast_precision_loss)]
        let y = row as f32 * 2.0;
        for (faction, x) in [(BLUE, 0.0), (RED, 5.0)] {
            units.push(Unit::from_template(
                EntityId::new(next_id),
                template,
                faction,
                Vec2::new(x, y),
            ));
            next_id += 1;
        }
    }
    units
}

struct Skirmish {
    clock: Rc<ManualClock>,
    authority: Peer<LoopbackTransport>,
    replicas: Vec<Peer<LoopbackTransport>>,
    events: Rc<RefCell<Vec<PresentationEvent>>>,
}

impl Skirmish {
    fn new(catalog: Arc<Catalog>, replicas: u32) -> Result<Self> {
        let network = LoopbackNetwork::new();
        let clock = Rc::new(ManualClock::new());
        let field = Rc::new(
            ObstacleField::new()
                .with(Vec2::new(2.5, 1.0), 0.5, CoverTags::MEDIUM_COVER)
                .with(Vec2::new(2.5, 3.0), 0.4, CoverTags::HEAVY_COVER),
        );
        let roster = roster(&catalog);
        if roster.is_empty() {
            bail!("match config defines no roster unit types");
        }

        let mut peers = Vec::new();
        for id in 0..=replicas {
            let session = SessionContext::new(PeerId::new(id), AUTHORITY, clock.clone());
            let mut peer = Peer::new(
                session,
                Arc::clone(&catalog),
                network.connect(PeerId::new(id)),
                field.clone(),
            );
            peer.seed_roster(roster.clone())
                .with_context(|| format!("seeding peer {id}"))?;
            peers.push(peer);
        }

        let mut authority = peers.remove(0);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        authority.subscribe(Interest::All, move |event: &PresentationEvent| {
            if let PresentationEvent::AttackResolved(report) = event {
                info!(
                    attacker = %report.attacker,
                    target = %report.target,
                    ability = %report.ability,
                    chance = report.hit_chance,
                    hits = report.hits_landed(),
                    damage = report.total_damage,
                    "attack"
                );
            }
            sink.borrow_mut().push(event.clone());
        });

        Ok(Self {
            clock,
            authority,
            replicas: peers,
            events,
        })
    }

    /// Every living unit of `faction` spends its actions on the nearest
    /// living enemy, trying abilities in catalog order.
    fn play_turn(&mut self, faction: FactionId, seconds: f32) -> Result<()> {
        self.authority.begin_turn(faction, seconds)?;

        let actors: Vec<EntityId> = self
            .authority
            .world()
            .faction_units(faction)
            .filter(|u| u.is_alive())
            .map(Unit::id)
            .collect();
        let abilities: Vec<_> = self
            .authority
            .catalog()
            .abilities()
            .map(|a| a.id.clone())
            .collect();

        for actor in actors {
            loop {
                let Some(target) = self.nearest_enemy(actor) else {
                    break;
                };
                let mut acted = false;
                for ability in &abilities {
                    let request = AttackRequest::new(actor, target, ability.clone());
                    match self.authority.request_attack(&request) {
                        Ok(_) => {
                            acted = true;
                            break;
                        }
                        Err(PeerError::Rejected(_)) => {}
                        Err(error) => return Err(error.into()),
                    }
                }
                if !acted {
                    break;
                }
            }
        }

        self.advance(f64::from(seconds))
    }

    fn nearest_enemy(&self, actor: EntityId) -> Option<EntityId> {
        let world = self.authority.world();
        let me = world.get(actor)?;
        world
            .units()
            .filter(|u| u.is_alive() && !u.is_allied_with(me))
            .min_by(|a, b| {
                let da = a.position().distance_squared(me.position());
                let db = b.position().distance_squared(me.position());
                da.total_cmp(&db).then(a.id().cmp(&b.id()))
            })
            .map(Unit::id)
    }

    /// Moves the session clock and steps every peer, authority first.
    fn advance(&mut self, seconds: f64) -> Result<()> {
        self.clock.advance(seconds);
        self.authority.step()?;
        for replica in &mut self.replicas {
            replica.step()?;
        }
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        let mut diverged = 0;
        for replica in &mut self.replicas {
            replica.pump();
            if replica.world() != self.authority.world() {
                warn!(peer = %replica.session().local_peer(), "replica diverged");
                diverged += 1;
            }
        }
        if diverged > 0 {
            bail!("{diverged} replica(s) diverged from the authority");
        }
        Ok(())
    }
}
