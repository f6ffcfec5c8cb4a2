//! D&D 5e class progression data.
//!
//! Spell slot tables for full, half, and third casters, the Warlock pact
//! magic progression, and the limited-use features each class and subclass
//! tracks. All of it is read-only and shared process-wide.

use crate::character::{subclass_is, Ability, AbilityScores, CasterType, CharacterClass, ClassLevel};
use crate::ledger::{LimitedFeature, RechargeType};
use std::collections::HashMap;

// ============================================================================
// Spell Slots
// ============================================================================

/// Slots per spell level (index 0 = 1st level) for each character level.
const FULL_CASTER_SLOTS: [&[u8]; 20] = [
    &[2],
    &[3],
    &[4, 2],
    &[4, 3],
    &[4, 3, 2],
    &[4, 3, 3],
    &[4, 3, 3, 1],
    &[4, 3, 3, 2],
    &[4, 3, 3, 3, 1],
    &[4, 3, 3, 3, 2],
    &[4, 3, 3, 3, 2, 1],
    &[4, 3, 3, 3, 2, 1],
    &[4, 3, 3, 3, 2, 1, 1],
    &[4, 3, 3, 3, 2, 1, 1],
    &[4, 3, 3, 3, 2, 1, 1, 1],
    &[4, 3, 3, 3, 2, 1, 1, 1],
    &[4, 3, 3, 3, 2, 1, 1, 1, 1],
    &[4, 3, 3, 3, 3, 1, 1, 1, 1],
    &[4, 3, 3, 3, 3, 2, 1, 1, 1],
    &[4, 3, 3, 3, 3, 2, 2, 1, 1],
];

/// Paladin and Ranger: nothing until level 2.
const HALF_CASTER_SLOTS: [&[u8]; 20] = [
    &[],
    &[2],
    &[3],
    &[3],
    &[4, 2],
    &[4, 2],
    &[4, 3],
    &[4, 3],
    &[4, 3, 2],
    &[4, 3, 2],
    &[4, 3, 3],
    &[4, 3, 3],
    &[4, 3, 3, 1],
    &[4, 3, 3, 1],
    &[4, 3, 3, 2],
    &[4, 3, 3, 2],
    &[4, 3, 3, 3, 1],
    &[4, 3, 3, 3, 1],
    &[4, 3, 3, 3, 2],
    &[4, 3, 3, 3, 2],
];

/// Eldritch Knight and Arcane Trickster: nothing until level 3.
const THIRD_CASTER_SLOTS: [&[u8]; 20] = [
    &[],
    &[],
    &[2],
    &[3],
    &[3],
    &[3],
    &[4, 2],
    &[4, 2],
    &[4, 2],
    &[4, 3],
    &[4, 3],
    &[4, 3],
    &[4, 3, 2],
    &[4, 3, 2],
    &[4, 3, 2],
    &[4, 3, 3],
    &[4, 3, 3],
    &[4, 3, 3],
    &[4, 3, 3, 1],
    &[4, 3, 3, 1],
];

fn table_row(table: &'static [&'static [u8]; 20], level: u8) -> &'static [u8] {
    if level == 0 {
        return &[];
    }
    table[(level.min(20) - 1) as usize]
}

/// Slots for a single-class caster of the given progression and class level.
///
/// Pact casters have no regular slots; see [`pact_magic`].
pub fn spell_slots(caster: CasterType, level: u8) -> &'static [u8] {
    match caster {
        CasterType::Full => table_row(&FULL_CASTER_SLOTS, level),
        CasterType::Half => table_row(&HALF_CASTER_SLOTS, level),
        CasterType::Third => table_row(&THIRD_CASTER_SLOTS, level),
        CasterType::Pact => &[],
    }
}

/// Combined caster level for a multiclass character: full levels, plus half
/// of half-caster levels, plus a third of third-caster levels, each rounded down.
pub fn multiclass_caster_level(classes: &[ClassLevel]) -> u8 {
    let total: u32 = classes
        .iter()
        .map(|c| match c.caster_type() {
            Some(CasterType::Full) => c.level as u32,
            Some(CasterType::Half) => c.level as u32 / 2,
            Some(CasterType::Third) => c.level as u32 / 3,
            Some(CasterType::Pact) | None => 0,
        })
        .sum();
    total.min(20) as u8
}

/// Slots for a multiclass caster, read from the full-caster table.
pub fn multiclass_spell_slots(caster_level: u8) -> &'static [u8] {
    table_row(&FULL_CASTER_SLOTS, caster_level)
}

/// Warlock pact magic: `(slot count, slot level)` at a Warlock level.
pub fn pact_magic(warlock_level: u8) -> Option<(u32, u8)> {
    let count = match warlock_level {
        0 => return None,
        1 => 1,
        2..=10 => 2,
        11..=16 => 3,
        _ => 4,
    };
    let slot_level = ((warlock_level.min(9) + 1) / 2).min(5);
    Some((count, slot_level))
}

// ============================================================================
// Limited Features
// ============================================================================

/// How many uses a feature has at a given class level.
#[derive(Debug, Clone, Copy)]
pub enum UsesFormula {
    Fixed(u32),
    /// `(from_level, uses)` thresholds in ascending order; the last one
    /// reached applies. Zero uses means the feature isn't tracked.
    ByLevel(&'static [(u8, u32)]),
    /// Ability modifier plus a bonus, minimum 1.
    AbilityModifier { ability: Ability, bonus: i32 },
    /// Class level times a multiplier.
    PerLevel(u32),
}

impl UsesFormula {
    pub fn uses(&self, level: u8, scores: &AbilityScores) -> u32 {
        match self {
            UsesFormula::Fixed(n) => *n,
            UsesFormula::ByLevel(table) => table
                .iter()
                .take_while(|(from, _)| *from <= level)
                .last()
                .map(|(_, uses)| *uses)
                .unwrap_or(0),
            UsesFormula::AbilityModifier { ability, bonus } => {
                (scores.modifier(*ability) + bonus).max(1) as u32
            }
            UsesFormula::PerLevel(n) => level as u32 * n,
        }
    }
}

/// When a feature comes back.
#[derive(Debug, Clone, Copy)]
pub enum RechargeRule {
    Always(RechargeType),
    /// Long rest until the given class level, short rest from then on.
    ShortRestFrom(u8),
}

impl RechargeRule {
    pub fn at_level(&self, level: u8) -> RechargeType {
        match self {
            RechargeRule::Always(recharge) => *recharge,
            RechargeRule::ShortRestFrom(from) if level >= *from => RechargeType::ShortRest,
            RechargeRule::ShortRestFrom(_) => RechargeType::LongRest,
        }
    }
}

/// Static description of a limited-use feature.
#[derive(Debug, Clone, Copy)]
pub struct FeatureData {
    /// Ledger key. Classes sharing a feature share the key.
    pub key: &'static str,
    pub name: &'static str,
    pub class: CharacterClass,
    pub subclass: Option<&'static str>,
    pub min_level: u8,
    pub uses: UsesFormula,
    pub recharge: RechargeRule,
}

impl FeatureData {
    /// The feature as it stands for this class level, or `None` if it isn't
    /// available yet (or has no uses at this level).
    pub fn instantiate(&self, class: &ClassLevel, scores: &AbilityScores) -> Option<LimitedFeature> {
        if class.class != self.class || class.level < self.min_level {
            return None;
        }
        if let Some(required) = self.subclass {
            if !subclass_is(class.subclass.as_deref(), required) {
                return None;
            }
        }
        let max = self.uses.uses(class.level, scores);
        if max == 0 {
            return None;
        }
        Some(LimitedFeature::new(
            self.name,
            max,
            self.recharge.at_level(class.level),
        ))
    }
}

use RechargeType::{Dawn, LongRest, ShortRest};

const fn feature(
    key: &'static str,
    name: &'static str,
    class: CharacterClass,
    min_level: u8,
    uses: UsesFormula,
    recharge: RechargeRule,
) -> FeatureData {
    FeatureData {
        key,
        name,
        class,
        subclass: None,
        min_level,
        uses,
        recharge,
    }
}

const fn subclass_feature(
    key: &'static str,
    name: &'static str,
    class: CharacterClass,
    subclass: &'static str,
    min_level: u8,
    uses: UsesFormula,
    recharge: RechargeRule,
) -> FeatureData {
    FeatureData {
        key,
        name,
        class,
        subclass: Some(subclass),
        min_level,
        uses,
        recharge,
    }
}

pub const FEATURES: &[FeatureData] = &[
    // Barbarian: unlimited rage at 20 is not a pool.
    feature(
        "rage",
        "Rage",
        CharacterClass::Barbarian,
        1,
        UsesFormula::ByLevel(&[(1, 2), (3, 3), (6, 4), (12, 5), (17, 6), (20, 0)]),
        RechargeRule::Always(LongRest),
    ),
    // Bard: Font of Inspiration at 5
    feature(
        "bardic-inspiration",
        "Bardic Inspiration",
        CharacterClass::Bard,
        1,
        UsesFormula::AbilityModifier {
            ability: Ability::Charisma,
            bonus: 0,
        },
        RechargeRule::ShortRestFrom(5),
    ),
    // Cleric
    feature(
        "channel-divinity",
        "Channel Divinity",
        CharacterClass::Cleric,
        2,
        UsesFormula::ByLevel(&[(2, 1), (6, 2), (18, 3)]),
        RechargeRule::Always(ShortRest),
    ),
    feature(
        "divine-intervention",
        "Divine Intervention",
        CharacterClass::Cleric,
        10,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    // Druid
    feature(
        "wild-shape",
        "Wild Shape",
        CharacterClass::Druid,
        2,
        UsesFormula::Fixed(2),
        RechargeRule::Always(ShortRest),
    ),
    subclass_feature(
        "natural-recovery",
        "Natural Recovery",
        CharacterClass::Druid,
        "Circle of the Land",
        2,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    // Fighter
    feature(
        "second-wind",
        "Second Wind",
        CharacterClass::Fighter,
        1,
        UsesFormula::Fixed(1),
        RechargeRule::Always(ShortRest),
    ),
    feature(
        "action-surge",
        "Action Surge",
        CharacterClass::Fighter,
        2,
        UsesFormula::ByLevel(&[(2, 1), (17, 2)]),
        RechargeRule::Always(ShortRest),
    ),
    feature(
        "indomitable",
        "Indomitable",
        CharacterClass::Fighter,
        9,
        UsesFormula::ByLevel(&[(9, 1), (13, 2), (17, 3)]),
        RechargeRule::Always(LongRest),
    ),
    subclass_feature(
        "superiority-dice",
        "Superiority Dice",
        CharacterClass::Fighter,
        "Battle Master",
        3,
        UsesFormula::ByLevel(&[(3, 4), (7, 5), (15, 6)]),
        RechargeRule::Always(ShortRest),
    ),
    // Monk
    feature(
        "ki",
        "Ki",
        CharacterClass::Monk,
        2,
        UsesFormula::PerLevel(1),
        RechargeRule::Always(ShortRest),
    ),
    // Paladin
    feature(
        "divine-sense",
        "Divine Sense",
        CharacterClass::Paladin,
        1,
        UsesFormula::AbilityModifier {
            ability: Ability::Charisma,
            bonus: 1,
        },
        RechargeRule::Always(LongRest),
    ),
    feature(
        "lay-on-hands",
        "Lay on Hands",
        CharacterClass::Paladin,
        1,
        UsesFormula::PerLevel(5),
        RechargeRule::Always(LongRest),
    ),
    feature(
        "channel-divinity",
        "Channel Divinity",
        CharacterClass::Paladin,
        3,
        UsesFormula::Fixed(1),
        RechargeRule::Always(ShortRest),
    ),
    feature(
        "cleansing-touch",
        "Cleansing Touch",
        CharacterClass::Paladin,
        14,
        UsesFormula::AbilityModifier {
            ability: Ability::Charisma,
            bonus: 0,
        },
        RechargeRule::Always(LongRest),
    ),
    // Rogue
    feature(
        "stroke-of-luck",
        "Stroke of Luck",
        CharacterClass::Rogue,
        20,
        UsesFormula::Fixed(1),
        RechargeRule::Always(ShortRest),
    ),
    // Sorcerer
    feature(
        "sorcery-points",
        "Sorcery Points",
        CharacterClass::Sorcerer,
        2,
        UsesFormula::PerLevel(1),
        RechargeRule::Always(LongRest),
    ),
    subclass_feature(
        "tides-of-chaos",
        "Tides of Chaos",
        CharacterClass::Sorcerer,
        "Wild Magic",
        1,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    // Warlock
    feature(
        "mystic-arcanum-6",
        "Mystic Arcanum (6th level)",
        CharacterClass::Warlock,
        11,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    feature(
        "mystic-arcanum-7",
        "Mystic Arcanum (7th level)",
        CharacterClass::Warlock,
        13,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    feature(
        "mystic-arcanum-8",
        "Mystic Arcanum (8th level)",
        CharacterClass::Warlock,
        15,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    feature(
        "mystic-arcanum-9",
        "Mystic Arcanum (9th level)",
        CharacterClass::Warlock,
        17,
        UsesFormula::Fixed(1),
        RechargeRule::Always(LongRest),
    ),
    subclass_feature(
        "dark-ones-own-luck",
        "Dark One's Own Luck",
        CharacterClass::Warlock,
        "The Fiend",
        6,
        UsesFormula::Fixed(1),
        RechargeRule::Always(ShortRest),
    ),
    // Wizard: once per day, taken during a short rest
    feature(
        "arcane-recovery",
        "Arcane Recovery",
        CharacterClass::Wizard,
        1,
        UsesFormula::Fixed(1),
        RechargeRule::Always(Dawn),
    ),
];

lazy_static::lazy_static! {
    /// Feature data indexed by class.
    static ref FEATURES_BY_CLASS: HashMap<CharacterClass, Vec<&'static FeatureData>> = {
        let mut index: HashMap<CharacterClass, Vec<&'static FeatureData>> = HashMap::new();
        for data in FEATURES {
            index.entry(data.class).or_default().push(data);
        }
        index
    };
}

impl CharacterClass {
    /// All limited-use features this class (or one of its subclasses) can track.
    pub fn feature_data(&self) -> &'static [&'static FeatureData] {
        FEATURES_BY_CLASS
            .get(self)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get all character classes.
    pub fn all() -> &'static [CharacterClass] {
        &[
            CharacterClass::Barbarian,
            CharacterClass::Bard,
            CharacterClass::Cleric,
            CharacterClass::Druid,
            CharacterClass::Fighter,
            CharacterClass::Monk,
            CharacterClass::Paladin,
            CharacterClass::Ranger,
            CharacterClass::Rogue,
            CharacterClass::Sorcerer,
            CharacterClass::Warlock,
            CharacterClass::Wizard,
        ]
    }
}

/// Features active for one class entry, keyed by ledger key.
pub fn features_for(class: &ClassLevel, scores: &AbilityScores) -> Vec<(&'static str, LimitedFeature)> {
    class
        .class
        .feature_data()
        .iter()
        .filter_map(|data| data.instantiate(class, scores).map(|f| (data.key, f)))
        .collect()
}
