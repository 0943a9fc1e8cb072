//! Entity module: the unit data model mirrored on every peer.
//!
//! This module provides the core identity and unit types:
//! - [`EntityId`]: Unique identifier for peer-visible units
//! - [`FactionId`]: Allegiance used for flanking and turn order
//! - [`UnitTypeId`]: Key into the unit-type catalog
//! - [`Unit`]: The complete unit record (HP, stats, effects, summon info)
//!
//! # Mutation
//!
//! A `Unit`'s authoritative state (HP, actions, effects, existence) is only
//! changed by the world mirror while applying a replicated message. All
//! mutators are therefore `pub(crate)`; outside the crate a `Unit` is
//! read-only once it has been seeded into a [`World`](crate::world::World).
//!
//! # Example
//!
//! ```
//! use vanguard_core::entity::{EntityId, FactionId, Unit, UnitTypeId};
//! use glam::Vec2;
//!
//! let unit = Unit::new(EntityId::new(7), UnitTypeId::new("footman"), FactionId::new(1), Vec2::ZERO)
//!     .with_max_hp(40.0);
//!
//! assert_eq!(unit.id().as_u64(), 7);
//! assert_eq!(unit.health().current(), 40.0);
//! ```

pub mod components;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::UnitType;
use crate::status::StatusEffectRegistry;

pub use components::{ActionPoints, Health, StatBlock, SummonInfo};

/// Unique identifier for a unit.
///
/// `EntityId` is a newtype wrapper around `u64`. Ids are identical on every
/// peer: initial roster ids come from the session layer and summon ids are
/// allocated by the authority and carried in the creation message.
///
/// # Ordering
///
/// Entity IDs are ordered by their numeric value, which is used to ensure
/// deterministic iteration order across all units.
///
/// # Example
///
/// ```
/// use vanguard_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the identifier directly after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Team allegiance of a unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(u32);

impl FactionId {
    /// Creates a faction id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction:{}", self.0)
    }
}

/// Identifier of a unit template in the catalog (the "prefab" a summon names).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTypeId(String);

impl UnitTypeId {
    /// Creates a new `UnitTypeId` from a string.
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

impl fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitTypeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A combat unit as mirrored on one peer.
///
/// A `Unit` combines:
/// - A unique [`EntityId`] and the [`UnitTypeId`] it was built from
/// - Allegiance and world position
/// - [`Health`], [`StatBlock`] and [`ActionPoints`]
/// - Its [`StatusEffectRegistry`]
/// - [`SummonInfo`] when the unit is a summon
///
/// # Invariants
///
/// - `health.current()` is always within `[0, health.max()]`
/// - Summons always carry `Some(SummonInfo)`; roster units never do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    id: EntityId,
    type_id: UnitTypeId,
    faction: FactionId,
    position: Vec2,
    health: Health,
    stats: StatBlock,
    actions: ActionPoints,
    anxiety: f32,
    effects: StatusEffectRegistry,
    summon: Option<SummonInfo>,
}

impl Unit {
    /// Creates a unit with default health, stats and action points.
    ///
    /// Use the `with_*` builders to describe a roster unit before seeding
    /// it into the world.
    #[must_use]
    pub fn new(id: EntityId, type_id: UnitTypeId, faction: FactionId, position: Vec2) -> Self {
        Self {
            id,
            type_id,
            faction,
            position,
            health: Health::default(),
            stats: StatBlock::default(),
            actions: ActionPoints::default(),
            anxiety: 0.0,
            effects: StatusEffectRegistry::new(),
            summon: None,
        }
    }

    /// Creates a unit from a catalog template with no further overrides.
    #[must_use]
    pub fn from_template(
        id: EntityId,
        template: &UnitType,
        faction: FactionId,
        position: Vec2,
    ) -> Self {
        Self {
            health: Health::new(template.max_hp),
            stats: template.stats,
            actions: ActionPoints::new(template.max_actions),
            anxiety: template.anxiety,
            ..Self::new(id, template.id.clone(), faction, position)
        }
    }

    /// Sets maximum (and current) HP.
    #[must_use]
    pub fn with_max_hp(mut self, max_hp: f32) -> Self {
        self.health = Health::new(max_hp);
        self
    }

    /// Sets the stat block.
    ///
    /// `armor` and `magic_resistance` must be finite and above -100 (see
    /// [`formula::is_valid_defense`](crate::formula::is_valid_defense)); at
    /// or below that, damage against the unit is infinite or negative.
    /// Catalog templates are checked on load, hand-built roster units are not.
    #[must_use]
    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats;
        self
    }

    /// Sets the action point pool, filled.
    #[must_use]
    pub fn with_max_actions(mut self, max_actions: u32) -> Self {
        self.actions = ActionPoints::new(max_actions);
        self
    }

    /// Sets the anxiety value.
    #[must_use]
    pub fn with_anxiety(mut self, anxiety: f32) -> Self {
        self.anxiety = anxiety;
        self
    }

    /// Marks the unit as a summon.
    #[must_use]
    pub fn with_summon(mut self, info: SummonInfo) -> Self {
        self.summon = Some(info);
        self
    }

    /// Returns the unit's unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the template this unit was built from.
    #[must_use]
    pub fn type_id(&self) -> &UnitTypeId {
        &self.type_id
    }

    /// Returns the unit's allegiance.
    #[must_use]
    pub const fn faction(&self) -> FactionId {
        self.faction
    }

    /// Returns `true` if both units share a faction.
    #[must_use]
    pub fn is_allied_with(&self, other: &Unit) -> bool {
        self.faction == other.faction
    }

    /// Returns the world position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Returns the health pool.
    #[must_use]
    pub const fn health(&self) -> &Health {
        &self.health
    }

    /// Returns `true` while HP is above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_depleted()
    }

    /// Returns the stat block.
    #[must_use]
    pub const fn stats(&self) -> &StatBlock {
        &self.stats
    }

    /// Returns the action point pool.
    #[must_use]
    pub const fn actions(&self) -> &ActionPoints {
        &self.actions
    }

    /// Returns the anxiety value.
    #[must_use]
    pub const fn anxiety(&self) -> f32 {
        self.anxiety
    }

    /// Returns the active status effects.
    #[must_use]
    pub const fn effects(&self) -> &StatusEffectRegistry {
        &self.effects
    }

    /// Returns summon info if this unit is a summon.
    #[must_use]
    pub const fn summon(&self) -> Option<&SummonInfo> {
        self.summon.as_ref()
    }

    /// Returns `true` if this unit is a summon.
    #[must_use]
    pub const fn is_summon(&self) -> bool {
        self.summon.is_some()
    }

    pub(crate) fn health_mut(&mut self) -> &mut Health {
        &mut self.health
    }

    pub(crate) fn actions_mut(&mut self) -> &mut ActionPoints {
        &mut self.actions
    }

    pub(crate) fn effects_mut(&mut self) -> &mut StatusEffectRegistry {
        &mut self.effects
    }
}
