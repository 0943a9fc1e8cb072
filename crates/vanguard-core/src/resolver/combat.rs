//! Combat resolver: validate, classify, roll, apply, commit.
//!
//! # Outcome order
//!
//! The messages of one attack are always broadcast in this order:
//! 1. `AttackResolved` presentation record
//! 2. `ActionsChanged` for the attacker
//! 3. `HealthChanged` for the target, if any hit landed
//! 4. Status effect operations, in ability order
//! 5. `CreateSummon` for every planned summon
//! 6. `DestroySummon` if a summoned target was reduced to 0 HP
//!
//! Target-directed effect operations need at least one landed hit;
//! caster-directed ones always apply.

use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use tracing::debug;

use crate::ability::{AbilityId, EffectOp, EffectTarget};
use crate::config::Catalog;
use crate::entity::EntityId;
use crate::formula::{damage, hit_chance, in_range};
use crate::positional::{PositionalAnalysis, SpatialQuery};
use crate::replication::{AttackReport, HitRoll, ReplicationMessage};
use crate::world::World;

use super::{AttackRejection, AttackRequest};

/// Summons an attack asks the summon manager to plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SummonRequest {
    /// Caster
    pub caster: EntityId,
    /// Ability carrying the summon parameters
    pub ability: AbilityId,
    /// Spawn circle center
    pub center: Vec2,
}

/// Everything one resolved attack will broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackOutcome {
    /// Presentation record (also the first message)
    pub report: AttackReport,
    /// Messages 1 to 4 of the outcome order
    pub messages: Vec<ReplicationMessage>,
    /// Summons to plan, if the ability has summon parameters
    pub summon: Option<SummonRequest>,
    /// Summoned target reduced to 0 HP
    pub defeated_summon: Option<EntityId>,
}

impl AttackOutcome {
    /// Assembles the full broadcast, inserting the planned summon creations
    /// before any destruction.
    #[must_use]
    pub fn into_messages(self, summons: Vec<ReplicationMessage>) -> Vec<ReplicationMessage> {
        let mut messages = self.messages;
        messages.extend(summons);
        if let Some(entity_id) = self.defeated_summon {
            messages.push(ReplicationMessage::DestroySummon { entity_id });
        }
        messages
    }
}

/// Resolves attacks against the authority's mirror.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vanguard_core::config::Catalog;
/// use vanguard_core::resolver::CombatResolver;
///
/// let resolver = CombatResolver::new(Arc::new(Catalog::default()));
/// assert_eq!(resolver.catalog().abilities().count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct CombatResolver {
    catalog: Arc<Catalog>,
}

impl CombatResolver {
    /// Creates a resolver over a catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// The catalog used for ability lookups.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolves one attack. Draws exactly `ability.hits` samples from `rng`
    /// on success and none on rejection.
    ///
    /// # Errors
    ///
    /// Returns the first failed validation as an [`AttackRejection`].
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        request: &AttackRequest,
        world: &World,
        spatial: &dyn SpatialQuery,
        rng: &mut R,
    ) -> Result<AttackOutcome, AttackRejection> {
        // Validate
        let attacker = world
            .get(request.attacker)
            .ok_or(AttackRejection::UnknownUnit(request.attacker))?;
        let target = world
            .get(request.target)
            .ok_or(AttackRejection::UnknownUnit(request.target))?;
        let ability = self
            .catalog
            .ability(&request.ability)
            .ok_or_else(|| AttackRejection::InvalidAbility(request.ability.clone()))?;

        if !attacker.is_alive() {
            return Err(AttackRejection::AttackerDefeated(attacker.id()));
        }
        if let Some(required) = ability.anxiety_requirement() {
            if attacker.anxiety() < required {
                return Err(AttackRejection::AnxietyBelowThreshold {
                    required,
                    actual: attacker.anxiety(),
                });
            }
        }
        if !attacker.actions().can_afford(ability.action_cost) {
            return Err(AttackRejection::InsufficientActions {
                required: ability.action_cost,
                remaining: attacker.actions().remaining(),
            });
        }
        if !target.is_alive() {
            return Err(AttackRejection::TargetDefeated(target.id()));
        }
        if !in_range(attacker.position(), target.position(), ability.range) {
            return Err(AttackRejection::OutOfRange {
                distance: attacker.position().distance(target.position()),
                range: ability.range,
            });
        }

        // Classify
        let analysis = PositionalAnalysis::analyze(
            world,
            spatial,
            attacker,
            target,
            self.catalog.rules().flank_radius,
        );
        let chance = hit_chance(
            ability.accuracy,
            attacker.stats().affinity,
            analysis.flank_count,
            analysis.is_flanked,
            analysis.cover,
        );

        // Roll
        let (stat, defense) = ability.kind.pairing(attacker.stats(), target.stats());
        let per_hit = damage(ability.base_damage, stat, defense);
        let rolls: Vec<HitRoll> = (0..ability.hits)
            .map(|_| {
                let roll: f32 = rng.gen_range(0.0..100.0);
                let hit = roll < chance;
                HitRoll {
                    roll,
                    hit,
                    damage: if hit { per_hit } else { 0.0 },
                }
            })
            .collect();
        let total_damage: f32 = rolls.iter().map(|r| r.damage).sum();
        let landed = rolls.iter().any(|r| r.hit);

        let report = AttackReport {
            attacker: attacker.id(),
            target: target.id(),
            ability: ability.id.clone(),
            hit_chance: chance,
            cover: analysis.cover,
            flank_count: analysis.flank_count,
            rolls,
            total_damage,
        };

        // Apply
        let mut messages = vec![
            ReplicationMessage::AttackResolved {
                report: report.clone(),
            },
            ReplicationMessage::ActionsChanged {
                entity_id: attacker.id(),
                remaining: attacker.actions().remaining() - ability.action_cost,
            },
        ];

        let mut defeated_summon = None;
        if landed {
            let remaining_hp = target.health().after_damage(total_damage);
            messages.push(ReplicationMessage::HealthChanged {
                entity_id: target.id(),
                current: remaining_hp,
                max: target.health().max(),
            });
            if remaining_hp <= 0.0 && target.is_summon() {
                defeated_summon = Some(target.id());
            }
        }

        for op in &ability.effects {
            let recipient = match op.target() {
                EffectTarget::Target if landed => target.id(),
                EffectTarget::Target => continue,
                EffectTarget::Caster => attacker.id(),
            };
            messages.push(match *op {
                EffectOp::Apply {
                    effect, duration, ..
                } => ReplicationMessage::EffectApplied {
                    entity_id: recipient,
                    effect_type: effect,
                    duration,
                },
                EffectOp::Remove { effect, .. } => ReplicationMessage::EffectRemoved {
                    entity_id: recipient,
                    effect_type: effect,
                },
            });
        }

        let summon = ability.summon.as_ref().map(|_| SummonRequest {
            caster: attacker.id(),
            ability: ability.id.clone(),
            center: attacker.position(),
        });

        debug!(
            attacker = %attacker.id(),
            target = %target.id(),
            ability = %ability.id,
            hit_chance = chance,
            cover = %analysis.cover,
            flank_count = analysis.flank_count,
            hits = report.hits_landed(),
            damage = total_damage,
            "attack resolved"
        );

        // Commit happens in the caller through the replicator.
        Ok(AttackOutcome {
            report,
            messages,
            summon,
            defeated_summon,
        })
    }
}
