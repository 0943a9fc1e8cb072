//! Static ability definitions.
//!
//! Abilities are loaded once as part of the [`Catalog`](crate::config::Catalog)
//! and shared by reference; nothing mutates them at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{StatBlock, UnitTypeId};
use crate::status::EffectType;

/// Identifier of an ability in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityId(String);

impl AbilityId {
    /// Creates a new `AbilityId` from a string.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AbilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AbilityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Physical or magical damage; selects the stat pairing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageKind {
    /// Strength against armor
    Physical,
    /// Magic power against magic resistance
    Magical,
}

impl DamageKind {
    /// Returns `(attacker_stat, defender_defense)` for this kind.
    #[must_use]
    pub const fn pairing(self, attacker: &StatBlock, defender: &StatBlock) -> (f32, f32) {
        match self {
            Self::Physical => (attacker.strength, defender.armor),
            Self::Magical => (attacker.magic_power, defender.magic_resistance),
        }
    }
}

/// Summon parameters of an ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummonParams {
    /// Unit template to instantiate
    pub unit_type: UnitTypeId,
    /// Number of summons; values below 1 spawn one
    #[serde(default = "one")]
    pub count: u32,
    /// Lifetime in seconds; values below 1 last one second
    pub duration: f64,
    /// Circle radius around the spawn center; non-positive uses the rules default
    #[serde(default)]
    pub spawn_radius: f32,
}

impl SummonParams {
    /// Number of summons actually spawned.
    #[must_use]
    pub fn effective_count(&self) -> u32 {
        self.count.max(1)
    }

    /// Lifetime actually applied.
    #[must_use]
    pub fn effective_duration(&self) -> f64 {
        self.duration.max(1.0)
    }

    /// Spawn radius, falling back to `default_radius`.
    #[must_use]
    pub fn radius_or(&self, default_radius: f32) -> f32 {
        if self.spawn_radius > 0.0 {
            self.spawn_radius
        } else {
            default_radius
        }
    }
}

/// Which side of the attack an effect operation lands on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    /// The attacked unit; requires at least one landed hit
    #[default]
    Target,
    /// The attacker; applies regardless of hits
    Caster,
}

/// Status effect operation performed by an ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EffectOp {
    /// Apply (or refresh) an effect
    Apply {
        /// Effect to apply
        effect: EffectType,
        /// Duration of the applied effect
        duration: f32,
        /// Recipient
        #[serde(default)]
        target: EffectTarget,
    },
    /// Remove (cure) an effect
    Remove {
        /// Effect to remove
        effect: EffectType,
        /// Recipient
        #[serde(default)]
        target: EffectTarget,
    },
}

impl EffectOp {
    /// Recipient of this operation.
    #[must_use]
    pub const fn target(&self) -> EffectTarget {
        match self {
            Self::Apply { target, .. } | Self::Remove { target, .. } => *target,
        }
    }
}

/// An ability definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    /// Catalog key
    pub id: AbilityId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Stat pairing selector
    pub kind: DamageKind,
    /// Raw damage per hit
    pub base_damage: f32,
    /// Base hit chance in percent
    #[serde(default = "default_accuracy")]
    pub accuracy: f32,
    /// Independent hit rolls (at least 1)
    #[serde(default = "one")]
    pub hits: u32,
    /// Action points spent (at least 1)
    #[serde(default = "one")]
    pub action_cost: u32,
    /// Maximum distance to the target
    pub range: f32,
    /// Gate the ability on the caster's anxiety
    #[serde(default)]
    pub requires_anxiety_threshold: bool,
    /// Minimum anxiety when gated
    #[serde(default)]
    pub anxiety_threshold: f32,
    /// Summons created on use
    #[serde(default)]
    pub summon: Option<SummonParams>,
    /// Status effect operations performed on use
    #[serde(default)]
    pub effects: Vec<EffectOp>,
}

impl Ability {
    /// Minimum caster anxiety, if the ability is gated.
    #[must_use]
    pub fn anxiety_requirement(&self) -> Option<f32> {
        self.requires_anxiety_threshold
            .then_some(self.anxiety_threshold)
    }
}

fn one() -> u32 {
    1
}

fn default_accuracy() -> f32 {
    70.0
}
