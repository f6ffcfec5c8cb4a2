//! Character build vocabulary.
//!
//! The ledger engine never owns a character; it reads the parts of a build
//! that decide resource maximums: classes and levels, subclasses, and
//! ability scores.

use crate::dice::DieType;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// The six scores of an incarnation, as far as the ledger cares about them.
///
/// Charisma sizes some limited-feature pools (Bardic Inspiration and
/// Divine Sense), and the Constitution modifier is added to every hit die
/// spent on a short rest. A change here makes the stored ledger stale; see
/// [`crate::needs_reinitialization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    /// Scores in STR, DEX, CON, INT, WIS, CHA order.
    pub fn new(
        strength: u8,
        dexterity: u8,
        constitution: u8,
        intelligence: u8,
        wisdom: u8,
        charisma: u8,
    ) -> Self {
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    /// 15, 14, 13, 12, 10, 8 assigned in order. Used by sample builds.
    pub fn standard_array() -> Self {
        Self::new(15, 14, 13, 12, 10, 8)
    }

    pub fn get(&self, ability: Ability) -> u8 {
        let Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        } = *self;
        match ability {
            Ability::Strength => strength,
            Ability::Dexterity => dexterity,
            Ability::Constitution => constitution,
            Ability::Intelligence => intelligence,
            Ability::Wisdom => wisdom,
            Ability::Charisma => charisma,
        }
    }

    /// 5e modifier: 8-9 = -1, 10-11 = 0, 12-13 = +1.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) as i32 - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Classes
// ============================================================================

/// D&D character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

/// How a class progresses through the spell slot tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CasterType {
    Full,
    Half,
    Third,
    /// Warlock pact magic, tracked outside the regular slot table.
    Pact,
}

impl CharacterClass {
    /// The die this class adds to the hit dice pools, one per level.
    pub fn hit_die(&self) -> DieType {
        match self {
            Self::Barbarian => DieType::D12,
            Self::Fighter | Self::Paladin | Self::Ranger => DieType::D10,
            Self::Sorcerer | Self::Wizard => DieType::D6,
            Self::Bard | Self::Cleric | Self::Druid | Self::Monk | Self::Rogue | Self::Warlock => {
                DieType::D8
            }
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Barbarian => "Barbarian",
            Self::Bard => "Bard",
            Self::Cleric => "Cleric",
            Self::Druid => "Druid",
            Self::Fighter => "Fighter",
            Self::Monk => "Monk",
            Self::Paladin => "Paladin",
            Self::Ranger => "Ranger",
            Self::Rogue => "Rogue",
            Self::Sorcerer => "Sorcerer",
            Self::Warlock => "Warlock",
            Self::Wizard => "Wizard",
        }
    }

    /// Returns the caster progression for this class, if any.
    ///
    /// Fighters and Rogues only cast through their Eldritch Knight and Arcane
    /// Trickster subclasses.
    pub fn caster_type(&self, subclass: Option<&str>) -> Option<CasterType> {
        match self {
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Sorcerer
            | CharacterClass::Wizard => Some(CasterType::Full),
            CharacterClass::Paladin | CharacterClass::Ranger => Some(CasterType::Half),
            CharacterClass::Warlock => Some(CasterType::Pact),
            CharacterClass::Fighter if subclass_is(subclass, "eldritch knight") => {
                Some(CasterType::Third)
            }
            CharacterClass::Rogue if subclass_is(subclass, "arcane trickster") => {
                Some(CasterType::Third)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Case-insensitive subclass comparison.
pub(crate) fn subclass_is(subclass: Option<&str>, name: &str) -> bool {
    subclass
        .map(|s| s.trim().eq_ignore_ascii_case(name))
        .unwrap_or(false)
}

/// Class information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLevel {
    pub class: CharacterClass,
    pub level: u8,
    pub subclass: Option<String>,
}

impl ClassLevel {
    pub fn new(class: CharacterClass, level: u8) -> Self {
        Self {
            class,
            level,
            subclass: None,
        }
    }

    pub fn with_subclass(mut self, subclass: impl Into<String>) -> Self {
        self.subclass = Some(subclass.into());
        self
    }

    pub fn caster_type(&self) -> Option<CasterType> {
        self.class.caster_type(self.subclass.as_deref())
    }
}
