//! Replication message types and the wire envelope.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::ability::AbilityId;
use crate::entity::{EntityId, FactionId, UnitTypeId};
use crate::formula::Cover;
use crate::session::GameTime;
use crate::status::EffectType;

/// Groups the envelopes produced by one authority decision.
///
/// Every message of a single attack outcome (or expiry sweep, or turn
/// boundary) shares one `OutcomeId`, so a log reader can reassemble the
/// decision from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeId(u64);

impl OutcomeId {
    /// Creates an outcome id.
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

impl fmt::Display for OutcomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "outcome:{}", self.0)
    }
}

impl From<u64> for OutcomeId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// A single hit roll inside an [`AttackReport`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRoll {
    /// Sample in `[0, 100)`
    pub roll: f32,
    /// `roll < hit_chance`
    pub hit: bool,
    /// Damage dealt by this hit, 0 on a miss
    pub damage: f32,
}

/// Presentation record of a resolved attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Attacking unit
    pub attacker: EntityId,
    /// Attacked unit
    pub target: EntityId,
    /// Ability used
    pub ability: AbilityId,
    /// Hit chance used for every roll
    pub hit_chance: f32,
    /// Cover classification
    pub cover: Cover,
    /// Flanking allies
    pub flank_count: u32,
    /// One entry per configured hit
    pub rolls: Vec<HitRoll>,
    /// Sum of the damage of landed hits
    pub total_damage: f32,
}

impl AttackReport {
    /// Number of landed hits.
    #[must_use]
    pub fn hits_landed(&self) -> usize {
        self.rolls.iter().filter(|r| r.hit).count()
    }
}

/// Authority-originated state change.
///
/// Applying these messages is the only way any peer, the authority
/// included, mutates its world mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplicationMessage {
    /// Instantiate a summon
    CreateSummon {
        /// Id allocated by the authority
        entity_id: EntityId,
        /// Unit template
        type_id: UnitTypeId,
        /// The caster's faction
        faction: FactionId,
        /// Spawn position
        position: Vec2,
        /// Expiry on the session clock
        expires_at: GameTime,
        /// Caster that owns the summon
        owner: EntityId,
    },
    /// Remove a summon
    DestroySummon {
        /// Summon to remove
        entity_id: EntityId,
    },
    /// Set a unit's HP
    HealthChanged {
        /// Unit
        entity_id: EntityId,
        /// New HP
        current: f32,
        /// Maximum HP
        max: f32,
    },
    /// Apply (or refresh) a status effect
    EffectApplied {
        /// Unit
        entity_id: EntityId,
        /// Effect tag
        effect_type: EffectType,
        /// Duration
        duration: f32,
    },
    /// Remove every entry of a status effect type
    EffectRemoved {
        /// Unit
        entity_id: EntityId,
        /// Effect tag
        effect_type: EffectType,
    },
    /// Set a unit's remaining action points
    ActionsChanged {
        /// Unit
        entity_id: EntityId,
        /// Points left
        remaining: u32,
    },
    /// Advance every unit's effect durations
    EffectsTicked {
        /// Elapsed effect time
        elapsed: f32,
    },
    /// Refill the action points of one faction's living units
    TurnStarted {
        /// Faction whose turn begins
        faction: FactionId,
    },
    /// Presentation record; does not change unit state
    AttackResolved {
        /// The record
        report: AttackReport,
    },
}

impl ReplicationMessage {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateSummon { .. } => "create_summon",
            Self::DestroySummon { .. } => "destroy_summon",
            Self::HealthChanged { .. } => "health_changed",
            Self::EffectApplied { .. } => "effect_applied",
            Self::EffectRemoved { .. } => "effect_removed",
            Self::ActionsChanged { .. } => "actions_changed",
            Self::EffectsTicked { .. } => "effects_ticked",
            Self::TurnStarted { .. } => "turn_started",
            Self::AttackResolved { .. } => "attack_resolved",
        }
    }
}

/// A message as it travels between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Authority-assigned, strictly increasing per session
    pub sequence: u64,
    /// Decision this message belongs to
    pub outcome: OutcomeId,
    /// Authority tick at broadcast time
    pub tick: u64,
    /// Payload
    pub message: ReplicationMessage,
}

impl Envelope {
    /// Encodes the envelope as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; none is expected for well-formed values.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error for malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_tagged_by_type() {
        let msg = ReplicationMessage::DestroySummon {
            entity_id: EntityId::new(9),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "destroy_summon");
        assert_eq!(json["entity_id"], 9);
        assert_eq!(msg.kind(), "destroy_summon");
    }

    #[test]
    fn envelope_survives_the_wire() {
        let envelope = Envelope {
            sequence: 3,
            outcome: OutcomeId::new(1),
            tick: 12,
            message: ReplicationMessage::CreateSummon {
                entity_id: EntityId::new(40),
                type_id: UnitTypeId::new("imp"),
                faction: FactionId::new(2),
                position: Vec2::new(1.5, -2.0),
                expires_at: GameTime::from_seconds(14.0),
                owner: EntityId::new(4),
            },
        };

        let bytes = envelope.to_bytes().unwrap();
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(Envelope::from_bytes(b"\x00\x01not-json").is_err());
    }

    #[test]
    fn report_counts_landed_hits() {
        let report = AttackReport {
            attacker: EntityId::new(1),
            target: EntityId::new(2),
            ability: AbilityId::new("flurry"),
            hit_chance: 50.0,
            cover: Cover::None,
            flank_count: 0,
            rolls: vec![
                HitRoll { roll: 10.0, hit: true, damage: 4.0 },
                HitRoll { roll: 90.0, hit: false, damage: 0.0 },
                HitRoll { roll: 49.0, hit: true, damage: 4.0 },
            ],
            total_damage: 8.0,
        };
        assert_eq!(report.hits_landed(), 2);
    }
}
