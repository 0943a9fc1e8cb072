//! # Vanguard Core
//!
//! Combat resolution and authority replication for a networked, turn-based
//! tactical game.
//!
//! One peer in a session is the authority. It alone resolves attacks,
//! rolls the dice, and decides when summons expire. Every peer, the
//! authority included, changes its mirror of the units only by applying
//! the replication messages the authority broadcasts.
//!
//! ## Architecture
//!
//! - **Formula** ([`formula`]): hit chance, damage and range arithmetic
//! - **Positional** ([`positional`]): flank counting and cover classification
//! - **Resolver** ([`resolver`]): validate, classify, roll, apply, commit
//! - **Status** ([`status`]): per-unit effect registry
//! - **Summon** ([`summon`]): spawn planning and central expiry sweep
//! - **Replication** ([`replication`]): envelopes, transports, the replicator
//! - **World** ([`world`]): each peer's mirror and the only mutation path
//! - **Peer** ([`peer`]): ties the above together per participant
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vanguard_core::{MatchConfig, Peer};
//!
//! let catalog = MatchConfig::load("match.json")?.into_catalog()?;
//! let mut authority = Peer::new(session, Arc::new(catalog), transport, spatial);
//! authority.request_attack(&AttackRequest::new(attacker, target, "fireball"))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ability;
pub mod config;
pub mod entity;
pub mod formula;
pub mod observer;
pub mod peer;
pub mod positional;
pub mod replication;
pub mod resolver;
pub mod session;
pub mod status;
pub mod summon;
pub mod world;

pub use ability::{Ability, AbilityId, DamageKind, EffectOp, EffectTarget, SummonParams};
pub use config::{Catalog, ConfigError, MatchConfig, RulesConfig, UnitType};
pub use entity::{EntityId, FactionId, Unit, UnitTypeId};
pub use formula::Cover;
pub use observer::{Interest, Observer, PresentationEvent, SubscriptionId};
pub use peer::{Peer, PeerError};
pub use positional::{CoverTags, ObstacleField, SpatialQuery};
pub use replication::{Envelope, LoopbackNetwork, ReplicationMessage, Transport};
pub use resolver::{AttackRejection, AttackRequest};
pub use session::{Clock, GameTime, ManualClock, PeerId, Role, SessionContext};
pub use status::{EffectType, StatusEffect};
pub use world::{ApplyError, World};

#[cfg(test)]
mod tests;
