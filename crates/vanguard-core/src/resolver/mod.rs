//! Attack resolution.
//!
//! Resolution turns an [`AttackRequest`] into an [`AttackOutcome`]: the
//! ordered list of replication messages the authority will broadcast. It is
//! the read phase of the authority loop. The resolver looks at the world
//! mirror but never writes to it; the mirror changes only when the
//! broadcast comes back through the replicator.
//!
//! # Invariants
//!
//! - Resolution MUST NOT mutate the world
//! - Given the same world, request and RNG state, the outcome is identical
//! - A rejection is reported to the caller only and never broadcast

mod combat;

pub use combat::{AttackOutcome, CombatResolver, SummonRequest};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ability::AbilityId;
use crate::entity::EntityId;

/// A unit's request to use an ability on a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttackRequest {
    /// Acting unit
    pub attacker: EntityId,
    /// Targeted unit
    pub target: EntityId,
    /// Ability to use
    pub ability: AbilityId,
}

impl AttackRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(attacker: EntityId, target: EntityId, ability: impl Into<AbilityId>) -> Self {
        Self {
            attacker,
            target,
            ability: ability.into(),
        }
    }
}

/// Why an attack request was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttackRejection {
    /// The local peer is not the authority
    #[error("attacks can only be resolved by the authority")]
    NotAuthority,
    /// Attacker or target is not in the world
    #[error("unknown unit {0}")]
    UnknownUnit(EntityId),
    /// The ability is not in the catalog
    #[error("unknown ability `{0}`")]
    InvalidAbility(AbilityId),
    /// The attacker has been reduced to 0 HP
    #[error("attacker {0} is defeated")]
    AttackerDefeated(EntityId),
    /// The caster's anxiety is below the ability's threshold
    #[error("anxiety {actual} is below the required {required}")]
    AnxietyBelowThreshold {
        /// Threshold
        required: f32,
        /// Caster's anxiety
        actual: f32,
    },
    /// Not enough action points
    #[error("ability costs {required} actions, {remaining} left")]
    InsufficientActions {
        /// Ability cost
        required: u32,
        /// Points left
        remaining: u32,
    },
    /// The target has been reduced to 0 HP
    #[error("target {0} is already defeated")]
    TargetDefeated(EntityId),
    /// The target is beyond the ability's range
    #[error("target is {distance:.2} away, range is {range:.2}")]
    OutOfRange {
        /// Attacker to target distance
        distance: f32,
        /// Ability range
        range: f32,
    },
}
