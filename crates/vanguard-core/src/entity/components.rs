//! Value components carried by every [`Unit`](super::Unit).

use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::session::GameTime;

/// Combat stats read by the formula library.
///
/// Physical abilities pair `strength` against `armor`; magical abilities pair
/// `magic_power` against `magic_resistance`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    /// Flat bonus added to hit chance
    pub affinity: f32,
    /// Defense against physical damage
    pub armor: f32,
    /// Defense against magical damage
    pub magic_resistance: f32,
    /// Physical damage bonus
    pub strength: f32,
    /// Magical damage bonus
    pub magic_power: f32,
}

/// Hit point pool. Current HP is kept within `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
}

impl Health {
    /// Creates a full health pool.
    #[must_use]
    pub fn new(max: f32) -> Self {
        let max = max.max(0.0);
        Self { current: max, max }
    }

    /// Returns current HP.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Returns maximum HP.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Returns `true` when current HP is zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    /// Returns the HP that would remain after `amount` damage, clamped to
    /// `[0, max]`. Does not modify the pool.
    #[must_use]
    pub fn after_damage(&self, amount: f32) -> f32 {
        (self.current - amount).clamp(0.0, self.max)
    }

    pub(crate) fn set(&mut self, current: f32, max: f32) {
        self.max = max.max(0.0);
        self.current = current.clamp(0.0, self.max);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Per-turn action budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPoints {
    remaining: u32,
    max: u32,
}

impl ActionPoints {
    /// Creates a filled pool.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self {
            remaining: max,
            max,
        }
    }

    /// Actions left this turn.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Pool size.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Returns `true` if `cost` actions can be spent.
    #[must_use]
    pub const fn can_afford(&self, cost: u32) -> bool {
        self.remaining >= cost
    }

    pub(crate) fn set_remaining(&mut self, remaining: u32) {
        self.remaining = remaining.min(self.max);
    }

    pub(crate) fn refill(&mut self) {
        self.remaining = self.max;
    }
}

impl Default for ActionPoints {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Lifecycle data attached to summoned units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummonInfo {
    /// Authority-clock time at which the authority destroys the summon
    pub expires_at: GameTime,
    /// Caster that created the summon
    pub owner: EntityId,
}
