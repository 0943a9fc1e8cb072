//! World mirror: one peer's copy of every unit.
//!
//! The world provides:
//! - Unit storage with deterministic iteration order (`BTreeMap`)
//! - A spatial index for proximity queries (flanking)
//! - [`World::apply`], the single entry point through which replicated
//!   messages change unit state
//!
//! # Atomicity
//!
//! `apply` validates a message completely before touching any unit. A
//! message that fails with [`ApplyError`] leaves the mirror untouched, so a
//! dropped message can never half-apply.
//!
//! # Example
//!
//! ```
//! use vanguard_core::config::Catalog;
//! use vanguard_core::entity::{EntityId, FactionId, Unit, UnitTypeId};
//! use vanguard_core::replication::ReplicationMessage;
//! use vanguard_core::world::World;
//! use glam::Vec2;
//!
//! let mut world = World::new();
//! world
//!     .insert_unit(Unit::new(EntityId::new(1), UnitTypeId::new("knight"), FactionId::new(1), Vec2::ZERO))
//!     .unwrap();
//!
//! let events = world
//!     .apply(
//!         &ReplicationMessage::HealthChanged { entity_id: EntityId::new(1), current: 60.0, max: 100.0 },
//!         &Catalog::default(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(events.len(), 1);
//! assert_eq!(world.get(EntityId::new(1)).unwrap().health().current(), 60.0);
//! ```

use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Catalog;
use crate::entity::{EntityId, FactionId, SummonInfo, Unit, UnitTypeId};
use crate::observer::PresentationEvent;
use crate::replication::ReplicationMessage;
use crate::status::{EffectChange, StatusEffect};

/// A message that cannot be applied to this mirror.
///
/// These indicate desync between peers; the peer logs and drops them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplyError {
    /// The message names a unit this mirror does not have
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    /// A creation reuses an id that is already present
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),
    /// A creation names a unit type missing from the catalog
    #[error("unknown unit type `{0}`")]
    UnknownUnitType(UnitTypeId),
    /// A summon destruction names a roster unit
    #[error("entity {0} is not a summon")]
    NotASummon(EntityId),
    /// The envelope was already applied or arrived out of order
    #[error("stale sequence {sequence} (last applied {last})")]
    StaleSequence {
        /// Received sequence
        sequence: u64,
        /// Last applied sequence
        last: u64,
    },
}

// =============================================================================
// Spatial Index
// =============================================================================

/// Unit positions for proximity queries.
///
/// Full-scan radius queries over a `HashMap`. Results are sorted by id, so
/// the map's iteration order never leaks into simulation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialIndex {
    positions: HashMap<EntityId, Vec2>,
}

impl SpatialIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or moves a unit.
    pub fn insert(&mut self, id: EntityId, pos: Vec2) {
        self.positions.insert(id, pos);
    }

    /// Removes a unit. Unknown ids are ignored.
    pub fn remove(&mut self, id: EntityId) {
        self.positions.remove(&id);
    }

    /// Position of a unit, if indexed.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Vec2> {
        self.positions.get(&id).copied()
    }

    /// Units within `radius` of `center` (inclusive), sorted by id.
    #[must_use]
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let radius_sq = radius * radius;
        let mut results: Vec<EntityId> = self
            .positions
            .iter()
            .filter(|(_, pos)| center.distance_squared(**pos) <= radius_sq)
            .map(|(id, _)| *id)
            .collect();
        results.sort();
        results
    }

    /// Number of indexed units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// =============================================================================
// World
// =============================================================================

/// One peer's mirror of the unit data model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Lowest id never used on this mirror
    next_id: u64,
    units: BTreeMap<EntityId, Unit>,
    spatial: SpatialIndex,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a roster unit supplied by the session layer.
    ///
    /// # Errors
    ///
    /// [`ApplyError::DuplicateEntity`] if the id is taken.
    pub fn insert_unit(&mut self, unit: Unit) -> Result<(), ApplyError> {
        let id = unit.id();
        if self.units.contains_key(&id) {
            return Err(ApplyError::DuplicateEntity(id));
        }
        self.spatial.insert(id, unit.position());
        self.units.insert(id, unit);
        self.next_id = self.next_id.max(id.as_u64() + 1);
        Ok(())
    }

    /// Looks up a unit.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub(crate) fn unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Returns `true` if the unit is present.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.units.contains_key(&id)
    }

    /// Units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.units.values()
    }

    /// Units of one faction, in id order.
    pub fn faction_units(&self, faction: FactionId) -> impl Iterator<Item = &Unit> + '_ {
        self.units.values().filter(move |u| u.faction() == faction)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the world has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The spatial index.
    #[must_use]
    pub const fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Lowest id no unit on this mirror has ever used. Advances only when a
    /// unit is inserted, roster or summon.
    #[must_use]
    pub const fn next_free_id(&self) -> EntityId {
        EntityId::new(self.next_id)
    }

    /// Applies one replicated message and returns the resulting
    /// presentation events in commit order.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] without mutating anything if the message does
    /// not fit this mirror.
    pub fn apply(
        &mut self,
        message: &ReplicationMessage,
        catalog: &Catalog,
    ) -> Result<Vec<PresentationEvent>, ApplyError> {
        match message {
            ReplicationMessage::CreateSummon {
                entity_id,
                type_id,
                faction,
                position,
                expires_at,
                owner,
            } => {
                if self.units.contains_key(entity_id) {
                    return Err(ApplyError::DuplicateEntity(*entity_id));
                }
                let template = catalog
                    .unit_type(type_id)
                    .ok_or_else(|| ApplyError::UnknownUnitType(type_id.clone()))?;
                let unit = Unit::from_template(*entity_id, template, *faction, *position)
                    .with_summon(SummonInfo {
                        expires_at: *expires_at,
                        owner: *owner,
                    });
                self.insert_unit(unit)?;
                Ok(vec![PresentationEvent::UnitSpawned {
                    entity: *entity_id,
                    summon: true,
                }])
            }

            ReplicationMessage::DestroySummon { entity_id } => {
                let unit = self
                    .units
                    .get(entity_id)
                    .ok_or(ApplyError::UnknownEntity(*entity_id))?;
                if !unit.is_summon() {
                    return Err(ApplyError::NotASummon(*entity_id));
                }
                let Some(unit) = self.units.remove(entity_id) else {
                    return Err(ApplyError::UnknownEntity(*entity_id));
                };
                self.spatial.remove(*entity_id);

                let mut events: Vec<PresentationEvent> = unit
                    .effects()
                    .iter()
                    .map(|effect| PresentationEvent::EffectRemoved {
                        entity: *entity_id,
                        effect: StatusEffect {
                            remaining: effect.remaining.max(0.0),
                            ..*effect
                        },
                    })
                    .collect();
                events.push(PresentationEvent::UnitDestroyed { entity: *entity_id });
                Ok(events)
            }

            ReplicationMessage::HealthChanged {
                entity_id,
                current,
                max,
            } => {
                let unit = self.require_mut(*entity_id)?;
                unit.health_mut().set(*current, *max);
                let health = *unit.health();
                Ok(vec![PresentationEvent::HealthChanged {
                    entity: *entity_id,
                    current: health.current(),
                    max: health.max(),
                }])
            }

            ReplicationMessage::EffectApplied {
                entity_id,
                effect_type,
                duration,
            } => {
                let unit = self.require_mut(*entity_id)?;
                let change = unit
                    .effects_mut()
                    .apply(StatusEffect::new(*effect_type, *duration));
                Ok(vec![effect_event(*entity_id, change)])
            }

            ReplicationMessage::EffectRemoved {
                entity_id,
                effect_type,
            } => {
                let unit = self.require_mut(*entity_id)?;
                let changes = unit.effects_mut().remove(*effect_type);
                Ok(changes
                    .into_iter()
                    .map(|c| effect_event(*entity_id, c))
                    .collect())
            }

            ReplicationMessage::ActionsChanged {
                entity_id,
                remaining,
            } => {
                let unit = self.require_mut(*entity_id)?;
                unit.actions_mut().set_remaining(*remaining);
                Ok(vec![actions_event(unit)])
            }

            ReplicationMessage::EffectsTicked { elapsed } => {
                let mut events = Vec::new();
                for (id, unit) in &mut self.units {
                    events.extend(
                        unit.effects_mut()
                            .tick(*elapsed)
                            .into_iter()
                            .map(|c| effect_event(*id, c)),
                    );
                }
                Ok(events)
            }

            ReplicationMessage::TurnStarted { faction } => {
                let mut events = Vec::new();
                for unit in self.units.values_mut() {
                    if unit.faction() == *faction && unit.is_alive() {
                        unit.actions_mut().refill();
                        events.push(actions_event(unit));
                    }
                }
                Ok(events)
            }

            ReplicationMessage::AttackResolved { report } => {
                Ok(vec![PresentationEvent::AttackResolved(report.clone())])
            }
        }
    }

    fn require_mut(&mut self, id: EntityId) -> Result<&mut Unit, ApplyError> {
        self.units.get_mut(&id).ok_or(ApplyError::UnknownEntity(id))
    }
}

fn effect_event(entity: EntityId, change: EffectChange) -> PresentationEvent {
    match change {
        EffectChange::Applied(effect) => PresentationEvent::EffectApplied { entity, effect },
        EffectChange::Reapplied(effect) => PresentationEvent::EffectReapplied { entity, effect },
        EffectChange::Removed(effect) => PresentationEvent::EffectRemoved { entity, effect },
    }
}

fn actions_event(unit: &Unit) -> PresentationEvent {
    PresentationEvent::ActionsChanged {
        entity: unit.id(),
        remaining: unit.actions().remaining(),
        max: unit.actions().max(),
    }
}
