//! Status effect registry.
//!
//! Each unit owns a [`StatusEffectRegistry`]: an ordered set of active
//! effects with at most one entry per [`EffectType`], unless the type is
//! stackable. The registry has no network awareness. Every transition
//! returns the [`EffectChange`]s it produced and the world mirror forwards
//! them to the observer registry, so presentation sees exactly one
//! `Removed` for every `Applied`.
//!
//! # Re-application
//!
//! Applying a type that is already present refreshes the existing entry to
//! the longer of its remaining duration and the new duration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Enumerated status effect tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Loses the next actions
    Stunned,
    /// Damage over time
    Poisoned,
    /// Damage over time
    Burning,
    /// Stacks, one entry per application
    Bleeding,
    /// Absorbs incoming damage
    Shielded,
    /// Reduced outgoing damage
    Weakened,
    /// Raised anxiety
    Panicked,
}

impl EffectType {
    /// Returns `true` if repeated application adds a new entry instead of
    /// refreshing the existing one.
    #[must_use]
    pub const fn is_stackable(self) -> bool {
        matches!(self, Self::Bleeding)
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stunned => "stunned",
            Self::Poisoned => "poisoned",
            Self::Burning => "burning",
            Self::Bleeding => "bleeding",
            Self::Shielded => "shielded",
            Self::Weakened => "weakened",
            Self::Panicked => "panicked",
        };
        f.write_str(name)
    }
}

/// An active effect and its remaining duration.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Effect tag
    pub effect_type: EffectType,
    /// Remaining duration
    pub remaining: f32,
}

impl StatusEffect {
    /// Creates an effect.
    #[must_use]
    pub const fn new(effect_type: EffectType, remaining: f32) -> Self {
        Self {
            effect_type,
            remaining,
        }
    }
}

/// A transition produced by the registry.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectChange {
    /// A new entry was inserted
    Applied(StatusEffect),
    /// An existing entry was refreshed; carries the entry after the refresh
    Reapplied(StatusEffect),
    /// An entry was removed (cure or expiry)
    Removed(StatusEffect),
}

impl EffectChange {
    /// The effect this change concerns.
    #[must_use]
    pub const fn effect(&self) -> &StatusEffect {
        match self {
            Self::Applied(e) | Self::Reapplied(e) | Self::Removed(e) => e,
        }
    }
}

/// Per-unit ordered set of active effects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectRegistry {
    entries: Vec<StatusEffect>,
}

impl StatusEffectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active entries (stacks counted individually).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no effect is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in application order.
    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> + '_ {
        self.entries.iter()
    }

    /// Returns `true` if at least one entry of `effect_type` is active.
    #[must_use]
    pub fn contains(&self, effect_type: EffectType) -> bool {
        self.entries.iter().any(|e| e.effect_type == effect_type)
    }

    /// Returns the first entry of `effect_type`.
    #[must_use]
    pub fn get(&self, effect_type: EffectType) -> Option<&StatusEffect> {
        self.entries.iter().find(|e| e.effect_type == effect_type)
    }

    /// Number of entries of `effect_type`.
    #[must_use]
    pub fn count(&self, effect_type: EffectType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.effect_type == effect_type)
            .count()
    }

    /// Applies an effect.
    ///
    /// Stackable types always insert. Otherwise an existing entry is
    /// refreshed to `max(current, new)` and `Reapplied` is returned.
    pub fn apply(&mut self, effect: StatusEffect) -> EffectChange {
        if !effect.effect_type.is_stackable() {
            if let Some(existing) = self
                .entries
                .iter_mut()
                .find(|e| e.effect_type == effect.effect_type)
            {
                existing.remaining = existing.remaining.max(effect.remaining);
                return EffectChange::Reapplied(*existing);
            }
        }
        self.entries.push(effect);
        EffectChange::Applied(effect)
    }

    /// Removes every entry of `effect_type`. Removing an absent type returns
    /// no changes.
    pub fn remove(&mut self, effect_type: EffectType) -> Vec<EffectChange> {
        self.take_where(|e| e.effect_type == effect_type)
    }

    /// Advances all durations by `elapsed` and removes entries that reached
    /// zero.
    pub fn tick(&mut self, elapsed: f32) -> Vec<EffectChange> {
        for entry in &mut self.entries {
            entry.remaining -= elapsed;
        }
        self.take_where(|e| e.remaining <= 0.0)
    }

    fn take_where(&mut self, mut pred: impl FnMut(&StatusEffect) -> bool) -> Vec<EffectChange> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if pred(entry) {
                removed.push(EffectChange::Removed(StatusEffect {
                    remaining: entry.remaining.max(0.0),
                    ..*entry
                }));
                false
            } else {
                true
            }
        });
        removed
    }
}
