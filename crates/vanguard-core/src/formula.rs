//! Stat and formula library.
//!
//! Pure functions that turn stat inputs into hit chances and damage. They
//! are evaluated only on the authority, but must give identical results on
//! any peer for identical inputs, so they stick to plain IEEE arithmetic in
//! a fixed evaluation order.
//!
//! # Example
//!
//! ```
//! use vanguard_core::formula::{damage, hit_chance, Cover};
//!
//! assert_eq!(hit_chance(50.0, 5.0, 2, true, Cover::None), 75.0);
//! assert_eq!(hit_chance(50.0, 5.0, 2, true, Cover::Heavy), 35.0);
//! assert!((damage(20.0, 30.0, 50.0) - 33.333_332).abs() < 1e-4);
//! ```

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Hit chance added per flanking ally.
pub const FLANK_BONUS_PER_ALLY: f32 = 10.0;
/// Hit chance removed by medium cover.
pub const MEDIUM_COVER_PENALTY: f32 = 20.0;
/// Hit chance removed by heavy cover.
pub const HEAVY_COVER_PENALTY: f32 = 40.0;
/// Lower bound of hit chance.
pub const MIN_HIT_CHANCE: f32 = 0.0;
/// Upper bound of hit chance.
pub const MAX_HIT_CHANCE: f32 = 100.0;
/// Defense values must stay strictly above this for [`damage`] to be finite
/// and non-negative.
pub const DEFENSE_FLOOR: f32 = -100.0;

/// Cover between attacker and target, derived per attack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cover {
    /// Clear line of fire
    #[default]
    None,
    /// Partial obstruction
    Medium,
    /// Heavy obstruction; dominates medium
    Heavy,
}

impl Cover {
    /// Folds the two cover flags into a classification. Heavy wins.
    #[must_use]
    pub const fn from_flags(has_medium: bool, has_heavy: bool) -> Self {
        if has_heavy {
            Self::Heavy
        } else if has_medium {
            Self::Medium
        } else {
            Self::None
        }
    }

    /// Hit chance penalty for this classification.
    #[must_use]
    pub const fn penalty(self) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Medium => MEDIUM_COVER_PENALTY,
            Self::Heavy => HEAVY_COVER_PENALTY,
        }
    }
}

impl fmt::Display for Cover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Medium => write!(f, "medium"),
            Self::Heavy => write!(f, "heavy"),
        }
    }
}

/// Hit chance in percent, clamped to `[0, 100]`.
///
/// `base + affinity`, plus `10 x flank_count` when flanked, minus the cover
/// penalty (40 heavy, 20 medium). A NaN intermediate yields 0.
#[must_use]
pub fn hit_chance(
    base: f32,
    attacker_affinity: f32,
    flank_count: u32,
    is_flanked: bool,
    cover: Cover,
) -> f32 {
    let mut chance = base + attacker_affinity;
    if is_flanked {
        #[allow(clippy::cast_precision_loss)]
        let allies = flank_count as f32;
        chance += FLANK_BONUS_PER_ALLY * allies;
    }
    chance -= cover.penalty();
    if chance.is_nan() {
        return MIN_HIT_CHANCE;
    }
    chance.clamp(MIN_HIT_CHANCE, MAX_HIT_CHANCE)
}

/// Damage dealt by one hit: `(raw + stat) x 100 / (100 + defense)`.
///
/// Not clamped or rounded; rounding belongs to presentation. The defense
/// must satisfy [`is_valid_defense`]; the catalog enforces this for unit
/// templates.
#[must_use]
pub fn damage(raw_damage: f32, attacker_stat: f32, defender_defense: f32) -> f32 {
    (raw_damage + attacker_stat) * 100.0 / (100.0 + defender_defense)
}

/// Returns `true` if `defense` is finite and above [`DEFENSE_FLOOR`].
#[must_use]
pub fn is_valid_defense(defense: f32) -> bool {
    defense.is_finite() && defense > DEFENSE_FLOOR
}

/// Returns `true` if `target` is within `max_range` of `origin`.
#[must_use]
pub fn in_range(origin: Vec2, target: Vec2, max_range: f32) -> bool {
    origin.distance(target) <= max_range
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod hit_chance_tests {
        use super::*;

        #[test]
        fn flanked_without_cover() {
            assert_eq!(hit_chance(50.0, 5.0, 2, true, Cover::None), 75.0);
        }

        #[test]
        fn flanked_behind_heavy_cover() {
            assert_eq!(hit_chance(50.0, 5.0, 2, true, Cover::Heavy), 35.0);
        }

        #[test]
        fn medium_cover_subtracts_twenty() {
            assert_eq!(hit_chance(60.0, 0.0, 0, false, Cover::Medium), 40.0);
        }

        #[test]
        fn flank_count_ignored_unless_flanked() {
            assert_eq!(hit_chance(50.0, 0.0, 3, false, Cover::None), 50.0);
        }

        #[test]
        fn clamps_at_both_ends() {
            assert_eq!(hit_chance(95.0, 20.0, 4, true, Cover::None), 100.0);
            assert_eq!(hit_chance(10.0, -5.0, 0, false, Cover::Heavy), 0.0);
        }

        #[test]
        fn nan_input_yields_zero() {
            assert_eq!(hit_chance(f32::NAN, 0.0, 0, false, Cover::None), 0.0);
        }

        #[test]
        fn heavy_flag_wins_over_medium() {
            assert_eq!(Cover::from_flags(true, true), Cover::Heavy);
            assert_eq!(Cover::from_flags(true, false), Cover::Medium);
            assert_eq!(Cover::from_flags(false, false), Cover::None);
        }
    }

    mod damage_tests {
        use super::*;

        #[test]
        fn reference_value() {
            assert!((damage(20.0, 30.0, 50.0) - 100.0 / 3.0).abs() < 1e-4);
        }

        #[test]
        fn zero_defense_passes_through() {
            assert_eq!(damage(12.0, 8.0, 0.0), 20.0);
        }

        #[test]
        fn defense_floor_bounds_valid_damage() {
            assert!(!is_valid_defense(DEFENSE_FLOOR));
            assert!(!is_valid_defense(-150.0));
            assert!(!is_valid_defense(f32::NAN));
            assert!(is_valid_defense(-99.5));
            assert!(damage(10.0, 0.0, -99.5).is_finite());
            assert!(damage(10.0, 0.0, -99.5) > 0.0);
            assert!(damage(10.0, 0.0, DEFENSE_FLOOR).is_infinite());
        }

        #[test]
        fn result_is_not_rounded() {
            assert!(damage(10.0, 0.0, 200.0).fract() != 0.0);
        }
    }

    mod range_tests {
        use super::*;

        #[test]
        fn boundary_is_inclusive() {
            assert!(in_range(Vec2::ZERO, Vec2::new(3.0, 4.0), 5.0));
            assert!(!in_range(Vec2::ZERO, Vec2::new(3.0, 4.0), 4.99));
        }
    }

    fn cover_strategy() -> impl Strategy<Value = Cover> {
        prop_oneof![Just(Cover::None), Just(Cover::Medium), Just(Cover::Heavy)]
    }

    proptest! {
        #[test]
        fn hit_chance_stays_in_bounds(
            base in -500.0f32..500.0,
            affinity in -500.0f32..500.0,
            flank in 0u32..20,
            flanked in any::<bool>(),
            cover in cover_strategy(),
        ) {
            let chance = hit_chance(base, affinity, flank, flanked, cover);
            prop_assert!((MIN_HIT_CHANCE..=MAX_HIT_CHANCE).contains(&chance));
        }

        #[test]
        fn hit_chance_monotone_in_affinity(
            base in -100.0f32..200.0,
            affinity in -100.0f32..100.0,
            extra in 0.0f32..100.0,
            flank in 0u32..8,
            cover in cover_strategy(),
        ) {
            let low = hit_chance(base, affinity, flank, true, cover);
            let high = hit_chance(base, affinity + extra, flank, true, cover);
            prop_assert!(high >= low);
        }

        #[test]
        fn hit_chance_monotone_in_flank_count(
            base in -100.0f32..200.0,
            affinity in -50.0f32..50.0,
            flank in 0u32..8,
            cover in cover_strategy(),
        ) {
            let low = hit_chance(base, affinity, flank, true, cover);
            let high = hit_chance(base, affinity, flank + 1, true, cover);
            prop_assert!(high >= low);
        }

        #[test]
        fn heavy_dominates_medium(
            base in -100.0f32..200.0,
            affinity in -50.0f32..50.0,
            flank in 0u32..8,
            flanked in any::<bool>(),
        ) {
            let both = hit_chance(base, affinity, flank, flanked, Cover::from_flags(true, true));
            let heavy = hit_chance(base, affinity, flank, flanked, Cover::Heavy);
            prop_assert_eq!(both, heavy);
        }

        #[test]
        fn damage_zero_defense_is_sum(raw in 0.0f32..1000.0, stat in 0.0f32..1000.0) {
            let expected = raw + stat;
            prop_assert!((damage(raw, stat, 0.0) - expected).abs() <= expected * 1e-6);
        }

        #[test]
        fn damage_decreases_with_defense(
            raw in 1.0f32..500.0,
            stat in 0.0f32..500.0,
            defense in 0.0f32..500.0,
            extra in 1.0f32..500.0,
        ) {
            prop_assert!(damage(raw, stat, defense + extra) < damage(raw, stat, defense));
        }
    }
}
