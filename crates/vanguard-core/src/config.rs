//! Match configuration and the read-only catalog.
//!
//! A match is described by a JSON document:
//!
//! ```json
//! {
//!   "rules": { "flank_radius": 1.2, "summon_radius": 2.0, "rng_seed": 7 },
//!   "unit_types": [ { "id": "wolf", "max_hp": 30.0 } ],
//!   "abilities": [ { "id": "bite", "kind": "physical", "base_damage": 6.0, "range": 1.5 } ]
//! }
//! ```
//!
//! [`MatchConfig`] is the raw document; [`Catalog`] is the validated,
//! immutable form that every peer shares behind an `Arc`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ability::{Ability, AbilityId, EffectOp};
use crate::entity::{StatBlock, UnitTypeId};
use crate::formula::is_valid_defense;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid JSON for [`MatchConfig`]
    #[error("failed to parse match config: {0}")]
    Parse(#[from] serde_json::Error),
    /// Two unit types share an id
    #[error("unit type `{0}` is defined twice")]
    DuplicateUnitType(UnitTypeId),
    /// Two abilities share an id
    #[error("ability `{0}` is defined twice")]
    DuplicateAbility(AbilityId),
    /// A summon references a unit type that does not exist
    #[error("ability `{ability}` summons unknown unit type `{unit_type}`")]
    UnknownSummonType {
        /// Offending ability
        ability: AbilityId,
        /// Missing unit type
        unit_type: UnitTypeId,
    },
    /// A unit type field is out of range
    #[error("unit type `{unit_type}` is invalid: {reason}")]
    InvalidUnitType {
        /// Offending unit type
        unit_type: UnitTypeId,
        /// What is wrong
        reason: &'static str,
    },
    /// An ability field is out of range
    #[error("ability `{ability}` is invalid: {reason}")]
    InvalidAbility {
        /// Offending ability
        ability: AbilityId,
        /// What is wrong
        reason: &'static str,
    },
}

/// Tunable rules shared by all peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Distance from the target within which attacker allies flank
    pub flank_radius: f32,
    /// Summon circle radius used when an ability does not set one
    pub summon_radius: f32,
    /// Seed for the authority's hit rolls
    pub rng_seed: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            flank_radius: 1.2,
            summon_radius: 2.0,
            rng_seed: 0,
        }
    }
}

/// Unit template. Summons are built from one with no overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    /// Catalog key
    pub id: UnitTypeId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Maximum HP
    pub max_hp: f32,
    /// Combat stats
    #[serde(default)]
    pub stats: StatBlock,
    /// Action points per turn
    #[serde(default = "default_max_actions")]
    pub max_actions: u32,
    /// Anxiety value
    #[serde(default)]
    pub anxiety: f32,
}

fn default_max_actions() -> u32 {
    2
}

/// Raw match document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Rules
    #[serde(default)]
    pub rules: RulesConfig,
    /// Unit templates
    #[serde(default)]
    pub unit_types: Vec<UnitType>,
    /// Ability definitions
    #[serde(default)]
    pub abilities: Vec<Ability>,
}

impl MatchConfig {
    /// Parses a match document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the JSON does not match the schema.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a match document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Validates the document into a [`Catalog`].
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn into_catalog(self) -> Result<Catalog, ConfigError> {
        Catalog::new(self.rules, self.unit_types, self.abilities)
    }
}

/// Validated, immutable ability and unit-type definitions plus rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    rules: RulesConfig,
    unit_types: BTreeMap<UnitTypeId, UnitType>,
    abilities: BTreeMap<AbilityId, Ability>,
}

impl Catalog {
    /// Builds a catalog, rejecting duplicate ids, unit types whose armor or
    /// magic resistance is at or below -100 (or not finite), `hits` or
    /// `action_cost` below 1, negative range, non-positive effect durations,
    /// and summons of unknown unit types.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn new(
        rules: RulesConfig,
        unit_types: Vec<UnitType>,
        abilities: Vec<Ability>,
    ) -> Result<Self, ConfigError> {
        let mut types = BTreeMap::new();
        for unit_type in unit_types {
            validate_unit_type(&unit_type)?;
            if types.contains_key(&unit_type.id) {
                return Err(ConfigError::DuplicateUnitType(unit_type.id));
            }
            types.insert(unit_type.id.clone(), unit_type);
        }

        let mut by_id = BTreeMap::new();
        for ability in abilities {
            validate_ability(&ability, &types)?;
            if by_id.contains_key(&ability.id) {
                return Err(ConfigError::DuplicateAbility(ability.id));
            }
            by_id.insert(ability.id.clone(), ability);
        }

        Ok(Self {
            rules,
            unit_types: types,
            abilities: by_id,
        })
    }

    /// Rules for this match.
    #[must_use]
    pub const fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Looks up an ability.
    #[must_use]
    pub fn ability(&self, id: &AbilityId) -> Option<&Ability> {
        self.abilities.get(id)
    }

    /// Looks up a unit template.
    #[must_use]
    pub fn unit_type(&self, id: &UnitTypeId) -> Option<&UnitType> {
        self.unit_types.get(id)
    }

    /// Iterates abilities in id order.
    pub fn abilities(&self) -> impl Iterator<Item = &Ability> + '_ {
        self.abilities.values()
    }

    /// Iterates unit templates in id order.
    pub fn unit_types(&self) -> impl Iterator<Item = &UnitType> + '_ {
        self.unit_types.values()
    }
}

fn validate_unit_type(unit_type: &UnitType) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidUnitType {
        unit_type: unit_type.id.clone(),
        reason,
    };

    if !is_valid_defense(unit_type.stats.armor) {
        return Err(invalid("armor must be finite and above -100"));
    }
    if !is_valid_defense(unit_type.stats.magic_resistance) {
        return Err(invalid("magic_resistance must be finite and above -100"));
    }
    Ok(())
}

fn validate_ability(
    ability: &Ability,
    types: &BTreeMap<UnitTypeId, UnitType>,
) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidAbility {
        ability: ability.id.clone(),
        reason,
    };

    if ability.hits < 1 {
        return Err(invalid("hits must be at least 1"));
    }
    if ability.action_cost < 1 {
        return Err(invalid("action_cost must be at least 1"));
    }
    if ability.range < 0.0 {
        return Err(invalid("range must not be negative"));
    }
    for op in &ability.effects {
        if let EffectOp::Apply { duration, .. } = op {
            if *duration <= 0.0 {
                return Err(invalid("effect duration must be positive"));
            }
        }
    }
    if let Some(summon) = &ability.summon {
        if !types.contains_key(&summon.unit_type) {
            return Err(ConfigError::UnknownSummonType {
                ability: ability.id.clone(),
                unit_type: summon.unit_type.clone(),
            });
        }
    }
    Ok(())
}
