//! Positional analysis: flanking and cover.
//!
//! Both quantities are derived fresh for every attack and are never stored.
//! Unit distances come from the world mirror's spatial index; line-of-fire
//! obstruction comes from a [`SpatialQuery`] capability supplied by the
//! embedding engine (or [`ObstacleField`] in tests and the harness).

use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, Unit};
use crate::formula::Cover;
use crate::world::World;

bitflags! {
    /// Category tags carried by obstacles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CoverTags: u8 {
        /// Partial obstruction
        const MEDIUM_COVER = 1 << 0;
        /// Heavy obstruction
        const HEAVY_COVER = 1 << 1;
        /// Impassable; does not affect cover
        const BLOCKS_MOVEMENT = 1 << 2;
    }
}

/// Identifier of an obstacle in a [`SpatialQuery`] implementation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObstacleId(u32);

impl ObstacleId {
    /// Creates an obstacle id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obstacle:{}", self.0)
    }
}

/// One obstacle intersected by a ray.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ObstacleHit {
    /// Obstacle that was hit
    pub obstacle: ObstacleId,
    /// Distance from the ray origin to the entry point
    pub distance: f32,
    /// The obstacle's tags
    pub tags: CoverTags,
}

/// Raycast capability over static obstacles.
pub trait SpatialQuery {
    /// Returns every obstacle intersected by the ray within `max_distance`,
    /// ordered by distance. `direction` need not be normalized.
    fn raycast_all(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Vec<ObstacleHit>;
}

/// A circular obstacle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Circle center
    pub center: Vec2,
    /// Circle radius
    pub radius: f32,
    /// Category tags
    pub tags: CoverTags,
}

/// In-memory [`SpatialQuery`] over circular obstacles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObstacleField {
    obstacles: Vec<Obstacle>,
}

impl ObstacleField {
    /// Creates an empty field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an obstacle and returns its id.
    pub fn add(&mut self, center: Vec2, radius: f32, tags: CoverTags) -> ObstacleId {
        #[allow(clippy::cast_possible_truncation)]
        let id = ObstacleId::new(self.obstacles.len() as u32);
        self.obstacles.push(Obstacle {
            center,
            radius,
            tags,
        });
        id
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, center: Vec2, radius: f32, tags: CoverTags) -> Self {
        self.add(center, radius, tags);
        self
    }

    /// Number of obstacles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// Returns `true` if the field has no obstacles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

impl SpatialQuery for ObstacleField {
    fn raycast_all(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Vec<ObstacleHit> {
        let Some(dir) = direction.try_normalize() else {
            return Vec::new();
        };

        let mut hits: Vec<ObstacleHit> = self
            .obstacles
            .iter()
            .enumerate()
            .filter_map(|(index, obstacle)| {
                let distance = ray_circle_entry(origin, dir, obstacle.center, obstacle.radius)?;
                #[allow(clippy::cast_possible_truncation)]
                let id = ObstacleId::new(index as u32);
                (distance <= max_distance).then_some(ObstacleHit {
                    obstacle: id,
                    distance,
                    tags: obstacle.tags,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.obstacle.cmp(&b.obstacle))
        });
        hits
    }
}

/// Distance along a unit-length ray to where it enters the circle. An origin
/// inside the circle counts as an entry at distance 0.
fn ray_circle_entry(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let c = to_center.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = to_center.dot(dir);
    if b <= 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    Some(b - discriminant.sqrt())
}

/// Counts living allies of `attacker` within `radius` of `target`, excluding
/// both participants.
#[must_use]
pub fn flank_count(world: &World, attacker: &Unit, target: &Unit, radius: f32) -> u32 {
    u32::try_from(flankers(world, attacker, target, radius).len()).unwrap_or(u32::MAX)
}

/// Classifies cover on the segment from `from` to `to`.
///
/// Heavy cover short-circuits; otherwise any medium obstacle gives
/// [`Cover::Medium`].
#[must_use]
pub fn classify_cover(spatial: &dyn SpatialQuery, from: Vec2, to: Vec2) -> Cover {
    let separation = from.distance(to);
    let mut has_medium = false;
    for hit in spatial.raycast_all(from, to - from, separation) {
        if hit.tags.contains(CoverTags::HEAVY_COVER) {
            return Cover::Heavy;
        }
        has_medium |= hit.tags.contains(CoverTags::MEDIUM_COVER);
    }
    Cover::from_flags(has_medium, false)
}

/// Flank and cover classification for one attack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionalAnalysis {
    /// Flanking allies
    pub flank_count: u32,
    /// At least one flanking ally
    pub is_flanked: bool,
    /// Cover between attacker and target
    pub cover: Cover,
}

impl PositionalAnalysis {
    /// Analyzes the attacker/target pair.
    #[must_use]
    pub fn analyze(
        world: &World,
        spatial: &dyn SpatialQuery,
        attacker: &Unit,
        target: &Unit,
        flank_radius: f32,
    ) -> Self {
        let flank_count = flank_count(world, attacker, target, flank_radius);
        Self {
            flank_count,
            is_flanked: flank_count > 0,
            cover: classify_cover(spatial, attacker.position(), target.position()),
        }
    }
}

/// Ids of the allies that flank `target`, in id order.
#[must_use]
pub fn flankers(world: &World, attacker: &Unit, target: &Unit, radius: f32) -> Vec<EntityId> {
    world
        .spatial()
        .query_radius(target.position(), radius)
        .into_iter()
        .filter(|id| *id != attacker.id() && *id != target.id())
        .filter(|id| {
            world
                .get(*id)
                .is_some_and(|unit| unit.is_alive() && unit.is_allied_with(attacker))
        })
        .collect()
}
