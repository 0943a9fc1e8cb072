//! Summon lifecycle: planning spawns and sweeping expiry.
//!
//! Only the authority plans or expires summons. It keeps a central
//! schedule of every live summon's expiry time and scans it once per tick;
//! summons never poll their own lifetime. Replicas keep no schedule at all
//! and remove a summon only when a `DestroySummon` arrives.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use glam::Vec2;
use tracing::debug;

use crate::ability::AbilityId;
use crate::config::Catalog;
use crate::entity::EntityId;
use crate::replication::ReplicationMessage;
use crate::session::{GameTime, SessionContext};
use crate::world::World;

/// Evenly spaced points on a circle, starting on the +x axis.
#[must_use]
pub fn ring_positions(center: Vec2, radius: f32, count: u32) -> Vec<Vec2> {
    #[allow(clippy::cast_precision_loss)]
    let step = TAU / count.max(1) as f32;
    (0..count)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = step * i as f32;
            center + Vec2::from_angle(angle) * radius
        })
        .collect()
}

/// Expiry schedule of live summons, plus the authority's id allocator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummonManager {
    scheduled: BTreeMap<EntityId, GameTime>,
    next_id: u64,
}

impl SummonManager {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans the `CreateSummon` messages for one use of `ability`.
    ///
    /// Returns nothing (silently) on a replica, for an unknown caster or
    /// ability, or for an ability without summon parameters. Allocates one
    /// fresh entity id per summon, above every id `world` has seen and every
    /// id this manager already handed out. The mirror itself is not touched.
    pub fn plan(
        &mut self,
        session: &SessionContext,
        world: &World,
        catalog: &Catalog,
        caster: EntityId,
        ability: &AbilityId,
        center: Vec2,
    ) -> Vec<ReplicationMessage> {
        if !session.is_authority() {
            debug!(%caster, %ability, "ignoring summon request on replica");
            return Vec::new();
        }
        let Some(faction) = world.get(caster).map(crate::entity::Unit::faction) else {
            debug!(%caster, "ignoring summon request from unknown caster");
            return Vec::new();
        };
        let Some(params) = catalog.ability(ability).and_then(|a| a.summon.as_ref()) else {
            debug!(%ability, "ability has no summon parameters");
            return Vec::new();
        };
        if catalog.unit_type(&params.unit_type).is_none() {
            debug!(unit_type = %params.unit_type, "summon names unknown unit type");
            return Vec::new();
        }

        let expires_at = session.now() + params.effective_duration();
        let radius = params.radius_or(catalog.rules().summon_radius);

        ring_positions(center, radius, params.effective_count())
            .into_iter()
            .map(|position| ReplicationMessage::CreateSummon {
                entity_id: self.allocate_id(world),
                type_id: params.unit_type.clone(),
                faction,
                position,
                expires_at,
                owner: caster,
            })
            .collect()
    }

    fn allocate_id(&mut self, world: &World) -> EntityId {
        let id = self.next_id.max(world.next_free_id().as_u64());
        self.next_id = id + 1;
        EntityId::new(id)
    }

    /// Updates the schedule from messages that were just broadcast.
    pub fn track(&mut self, messages: &[ReplicationMessage]) {
        for message in messages {
            match message {
                ReplicationMessage::CreateSummon {
                    entity_id,
                    expires_at,
                    ..
                } => {
                    self.scheduled.insert(*entity_id, *expires_at);
                }
                ReplicationMessage::DestroySummon { entity_id } => {
                    self.scheduled.remove(entity_id);
                }
                _ => {}
            }
        }
    }

    /// `DestroySummon` for every tracked summon with `now >= expires_at`, in
    /// id order. The schedule itself changes only through [`track`](Self::track).
    #[must_use]
    pub fn expire(&self, now: GameTime) -> Vec<ReplicationMessage> {
        self.scheduled
            .iter()
            .filter(|(_, expires_at)| now >= **expires_at)
            .map(|(id, _)| ReplicationMessage::DestroySummon { entity_id: *id })
            .collect()
    }

    /// Expiry of a tracked summon.
    #[must_use]
    pub fn expires_at(&self, id: EntityId) -> Option<GameTime> {
        self.scheduled.get(&id).copied()
    }

    /// Number of tracked summons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{Ability, DamageKind, SummonParams};
    use crate::config::{RulesConfig, UnitType};
    use crate::entity::{FactionId, StatBlock, Unit, UnitTypeId};
    use crate::session::{ManualClock, PeerId, Role};
    use std::rc::Rc;

    fn catalog(count: u32, duration: f64, spawn_radius: f32) -> Catalog {
        let call = Ability {
            id: AbilityId::new("call"),
            name: String::new(),
            kind: DamageKind::Magical,
            base_damage: 0.0,
            accuracy: 70.0,
            hits: 1,
            action_cost: 1,
            range: 10.0,
            requires_anxiety_threshold: false,
            anxiety_threshold: 0.0,
            summon: Some(SummonParams {
                unit_type: UnitTypeId::new("wisp"),
                count,
                duration,
                spawn_radius,
            }),
            effects: Vec::new(),
        };
        let plain = Ability {
            id: AbilityId::new("plain"),
            summon: None,
            ..call.clone()
        };
        Catalog::new(
            RulesConfig::default(),
            vec![UnitType {
                id: UnitTypeId::new("wisp"),
                name: "Wisp".to_string(),
                max_hp: 5.0,
                stats: StatBlock::default(),
                max_actions: 1,
                anxiety: 0.0,
            }],
            vec![call, plain],
        )
        .unwrap()
    }

    fn session(role: Role, now: f64) -> SessionContext {
        let clock = Rc::new(ManualClock::new());
        clock.set(GameTime::from_seconds(now));
        let authority = match role {
            Role::Authority => PeerId::new(1),
            Role::Replica => PeerId::new(0),
        };
        SessionContext::new(PeerId::new(1), authority, clock)
    }

    fn world() -> World {
        let mut world = World::new();
        world
            .insert_unit(Unit::new(
                EntityId::new(1),
                UnitTypeId::new("mage"),
                FactionId::new(3),
                Vec2::ZERO,
            ))
            .unwrap();
        world
    }

    fn plan(role: Role, catalog: &Catalog, ability: &str) -> Vec<ReplicationMessage> {
        SummonManager::new().plan(
            &session(role, 4.0),
            &world(),
            catalog,
            EntityId::new(1),
            &AbilityId::new(ability),
            Vec2::new(10.0, 10.0),
        )
    }

    #[test]
    fn four_summons_spaced_evenly_with_shared_expiry() {
        let messages = plan(Role::Authority, &catalog(4, 10.0, 0.0), "call");

        assert_eq!(messages.len(), 4);
        let expected = [
            Vec2::new(12.0, 10.0),
            Vec2::new(10.0, 12.0),
            Vec2::new(8.0, 10.0),
            Vec2::new(10.0, 8.0),
        ];
        for (i, message) in messages.iter().enumerate() {
            let ReplicationMessage::CreateSummon {
                entity_id,
                position,
                expires_at,
                faction,
                owner,
                ..
            } = message
            else {
                panic!("expected CreateSummon, got {message:?}");
            };
            assert_eq!(*entity_id, EntityId::new(2 + i as u64));
            assert!(position.distance(expected[i]) < 1e-4);
            assert_eq!(*expires_at, GameTime::from_seconds(14.0));
            assert_eq!(*faction, FactionId::new(3));
            assert_eq!(*owner, EntityId::new(1));
        }
    }

    #[test]
    fn count_and_duration_are_floored_at_one() {
        let messages = plan(Role::Authority, &catalog(0, 0.2, 0.0), "call");
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            ReplicationMessage::CreateSummon { expires_at, .. }
                if expires_at == GameTime::from_seconds(5.0)
        ));
    }

    #[test]
    fn ability_radius_overrides_rules_default() {
        let messages = plan(Role::Authority, &catalog(1, 5.0, 3.5), "call");
        assert!(matches!(
            messages[0],
            ReplicationMessage::CreateSummon { position, .. }
                if position.distance(Vec2::new(10.0, 10.0)) == 3.5
        ));
    }

    #[test]
    fn silent_noops() {
        let catalog = catalog(2, 5.0, 0.0);
        assert!(plan(Role::Replica, &catalog, "call").is_empty());
        assert!(plan(Role::Authority, &catalog, "plain").is_empty());
        assert!(plan(Role::Authority, &catalog, "missing").is_empty());

        let unknown_caster = SummonManager::new().plan(
            &session(Role::Authority, 0.0),
            &world(),
            &catalog,
            EntityId::new(77),
            &AbilityId::new("call"),
            Vec2::ZERO,
        );
        assert!(unknown_caster.is_empty());
    }

    #[test]
    fn planning_leaves_mirror_untouched_and_never_reuses_ids() {
        let catalog = catalog(2, 5.0, 0.0);
        let session = session(Role::Authority, 0.0);
        let world = world();
        let before = world.clone();
        let mut manager = SummonManager::new();

        let ids = |messages: Vec<ReplicationMessage>| -> Vec<u64> {
            messages
                .iter()
                .filter_map(|m| match m {
                    ReplicationMessage::CreateSummon { entity_id, .. } => Some(entity_id.as_u64()),
                    _ => None,
                })
                .collect()
        };
        let call = AbilityId::new("call");
        let first = ids(manager.plan(&session, &world, &catalog, EntityId::new(1), &call, Vec2::ZERO));
        let second = ids(manager.plan(&session, &world, &catalog, EntityId::new(1), &call, Vec2::ZERO));

        assert_eq!(first, vec![2, 3]);
        assert_eq!(second, vec![4, 5]);
        assert_eq!(world, before);
        assert_eq!(world.next_free_id(), EntityId::new(2));
    }

    #[test]
    fn expiry_sweep_is_inclusive_and_tracked() {
        let mut manager = SummonManager::new();
        let created = plan(Role::Authority, &catalog(4, 10.0, 0.0), "call");
        manager.track(&created);

        assert!(manager.expire(GameTime::from_seconds(13.999)).is_empty());
        let due = manager.expire(GameTime::from_seconds(14.0));
        assert_eq!(due.len(), 4);

        manager.track(&due);
        assert!(manager.is_empty());
        assert!(manager.expire(GameTime::from_seconds(100.0)).is_empty());
    }
}
