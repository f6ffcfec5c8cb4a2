//! Ledger initialization from character build data.
//!
//! Initialization is a replace-in-full: it runs when an incarnation is first
//! activated and again whenever the build changes in a way that reshapes the
//! pools (level, class, subclass, ability scores). In-progress `used` counts
//! are discarded; only the rest counters survive a re-initialization.

use crate::character::{AbilityScores, CasterType, CharacterClass, ClassLevel};
use crate::class_data;
use crate::dice::DieType;
use crate::ledger::{PactSlots, Pool, ResourceLedger, SpellLevel};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;

/// The parts of a character build that determine resource maximums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterBuild {
    pub classes: Vec<ClassLevel>,
    pub ability_scores: AbilityScores,
    pub max_hp: i32,
}

impl CharacterBuild {
    pub fn new(max_hp: i32) -> Self {
        Self {
            classes: Vec::new(),
            ability_scores: AbilityScores::default(),
            max_hp,
        }
    }

    /// A single-class build.
    pub fn single_class(class: CharacterClass, level: u8, max_hp: i32) -> Self {
        Self::new(max_hp).with_class(ClassLevel::new(class, level))
    }

    pub fn with_class(mut self, class: ClassLevel) -> Self {
        self.classes.push(class);
        self
    }

    pub fn with_ability_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = scores;
        self
    }

    /// Total character level across all classes.
    pub fn character_level(&self) -> u32 {
        self.classes.iter().map(|c| c.level as u32).sum()
    }

    /// Hit dice per die size: one per level of every class using that die.
    pub fn total_hit_dice(&self) -> BTreeMap<DieType, u32> {
        let mut totals = BTreeMap::new();
        for class in self.classes.iter().filter(|c| c.level > 0) {
            *totals.entry(class.class.hit_die()).or_insert(0) += class.level as u32;
        }
        totals
    }
}

/// Whether a build change invalidates the current ledger's pool shapes.
///
/// Max HP alone does not: it is supplied to rests by the caller.
pub fn needs_reinitialization(previous: &CharacterBuild, next: &CharacterBuild) -> bool {
    previous.classes != next.classes || previous.ability_scores != next.ability_scores
}

/// Build a fresh ledger with every pool full and every counter cleared.
pub fn initialize(build: &CharacterBuild) -> ResourceLedger {
    let mut ledger = ResourceLedger::new(build.max_hp);
    let classes: Vec<&ClassLevel> = build.classes.iter().filter(|c| c.level > 0).collect();

    for (die_type, total) in build.total_hit_dice() {
        ledger.hit_dice_pools.insert(die_type, Pool::full(total));
    }

    // Regular slots: a lone caster uses its own table, several combine.
    let casters: Vec<&ClassLevel> = classes
        .iter()
        .copied()
        .filter(|c| {
            matches!(
                c.caster_type(),
                Some(CasterType::Full | CasterType::Half | CasterType::Third)
            )
        })
        .collect();
    let slots: &[u8] = match casters.as_slice() {
        [] => &[],
        [single] => match single.caster_type() {
            Some(caster) => class_data::spell_slots(caster, single.level),
            None => &[],
        },
        _ => {
            let owned: Vec<ClassLevel> = casters.iter().map(|c| (*c).clone()).collect();
            class_data::multiclass_spell_slots(class_data::multiclass_caster_level(&owned))
        }
    };
    for (level, count) in SpellLevel::all().zip(slots.iter()) {
        if *count > 0 {
            ledger.spell_slot_pools.insert(level, Pool::full(*count as u32));
        }
    }

    // Pact magic
    let warlock_level: u32 = classes
        .iter()
        .filter(|c| c.class == CharacterClass::Warlock)
        .map(|c| c.level as u32)
        .sum();
    if let Some((count, slot_level)) = class_data::pact_magic(warlock_level.min(20) as u8) {
        ledger.pact_slots = PactSlots::new(count, slot_level);
    }

    // Limited features; a key granted twice keeps the larger pool.
    for class in &classes {
        for (key, feature) in class_data::features_for(class, &build.ability_scores) {
            match ledger.limited_features.entry(key.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(feature);
                }
                Entry::Occupied(mut slot) => {
                    if feature.uses.max() > slot.get().uses.max() {
                        slot.insert(feature);
                    }
                }
            }
        }
    }

    debug!(
        level = build.character_level(),
        hit_dice = ledger.hit_dice_pools.len(),
        spell_levels = ledger.spell_slot_pools.len(),
        features = ledger.limited_features.len(),
        "Initialized resource ledger"
    );
    ledger
}

/// Initialize again after a build change, keeping the rest counters.
pub fn reinitialize(previous: &ResourceLedger, build: &CharacterBuild) -> ResourceLedger {
    let mut ledger = initialize(build);
    ledger.inherit_rest_counters(previous);
    ledger
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RechargeType;

    fn level(n: i64) -> SpellLevel {
        SpellLevel::new(n).unwrap()
    }

    #[test]
    fn test_fighter_level_one() {
        let ledger = initialize(&CharacterBuild::single_class(CharacterClass::Fighter, 1, 12));

        assert_eq!(ledger.current_hp, 12);
        assert_eq!(ledger.hit_dice(DieType::D10), Some(&Pool::full(1)));
        assert!(ledger.spell_slot_pools.is_empty());
        assert_eq!(ledger.pact_slots.pool.max(), 0);
        let second_wind = ledger.feature("second-wind").unwrap();
        assert_eq!(second_wind.uses, Pool::full(1));
        assert_eq!(second_wind.recharge, RechargeType::ShortRest);
    }

    #[test]
    fn test_wizard_slots_follow_full_table() {
        let ledger = initialize(&CharacterBuild::single_class(CharacterClass::Wizard, 5, 27));
        assert_eq!(ledger.spell_slots(level(1)), Some(&Pool::full(4)));
        assert_eq!(ledger.spell_slots(level(2)), Some(&Pool::full(3)));
        assert_eq!(ledger.spell_slots(level(3)), Some(&Pool::full(2)));
        assert_eq!(ledger.spell_slots(level(4)), None);
        assert_eq!(ledger.hit_dice(DieType::D6), Some(&Pool::full(5)));
    }

    #[test]
    fn test_paladin_level_one_has_no_slots() {
        let ledger = initialize(&CharacterBuild::single_class(CharacterClass::Paladin, 1, 12));
        assert!(ledger.spell_slot_pools.is_empty());
        assert_eq!(ledger.feature("lay-on-hands").unwrap().uses.max(), 5);
    }

    #[test]
    fn test_warlock_uses_pact_slots_only() {
        let ledger = initialize(&CharacterBuild::single_class(CharacterClass::Warlock, 5, 38));
        assert!(ledger.spell_slot_pools.is_empty());
        assert_eq!(ledger.pact_slots, PactSlots::new(2, 3));
    }

    #[test]
    fn test_eldritch_knight_third_caster() {
        let build = CharacterBuild::new(40)
            .with_class(ClassLevel::new(CharacterClass::Fighter, 7).with_subclass("Eldritch Knight"));
        let ledger = initialize(&build);
        assert_eq!(ledger.spell_slots(level(1)), Some(&Pool::full(4)));
        assert_eq!(ledger.spell_slots(level(2)), Some(&Pool::full(2)));
    }

    #[test]
    fn test_multiclass_pools() {
        let build = CharacterBuild::new(60)
            .with_class(ClassLevel::new(CharacterClass::Fighter, 2))
            .with_class(ClassLevel::new(CharacterClass::Paladin, 4))
            .with_class(ClassLevel::new(CharacterClass::Cleric, 3))
            .with_class(ClassLevel::new(CharacterClass::Warlock, 2));
        let ledger = initialize(&build);

        // Fighter and Paladin share d10s; Cleric and Warlock share d8s.
        assert_eq!(build.total_hit_dice().len(), 2);
        assert_eq!(ledger.hit_dice(DieType::D10), Some(&Pool::full(6)));
        assert_eq!(ledger.hit_dice(DieType::D8), Some(&Pool::full(5)));

        // Caster level 3 + 2 = 5.
        assert_eq!(ledger.spell_slots(level(3)), Some(&Pool::full(2)));
        assert_eq!(ledger.pact_slots, PactSlots::new(2, 1));

        // Cleric 3 and Paladin 4 each grant a single Channel Divinity.
        assert_eq!(ledger.feature("channel-divinity").unwrap().uses.max(), 1);
        assert!(ledger.feature("action-surge").is_some());
    }

    #[test]
    fn test_shared_feature_keeps_larger_pool() {
        let build = CharacterBuild::new(90)
            .with_class(ClassLevel::new(CharacterClass::Cleric, 6))
            .with_class(ClassLevel::new(CharacterClass::Paladin, 3));
        let ledger = initialize(&build);
        assert_eq!(ledger.feature("channel-divinity").unwrap().uses.max(), 2);
    }

    #[test]
    fn test_needs_reinitialization() {
        let base = CharacterBuild::single_class(CharacterClass::Rogue, 3, 20);

        let mut hp_only = base.clone();
        hp_only.max_hp = 25;
        assert!(!needs_reinitialization(&base, &hp_only));

        let leveled = CharacterBuild::single_class(CharacterClass::Rogue, 4, 26);
        assert!(needs_reinitialization(&base, &leveled));

        let mut subclassed = base.clone();
        subclassed.classes[0].subclass = Some("Arcane Trickster".to_string());
        assert!(needs_reinitialization(&base, &subclassed));

        let rescored = base.clone().with_ability_scores(AbilityScores::standard_array());
        assert!(needs_reinitialization(&base, &rescored));
    }

    #[test]
    fn test_reinitialize_discards_usage_but_keeps_rest_counters() {
        let build = CharacterBuild::single_class(CharacterClass::Fighter, 2, 20);
        let mut previous = initialize(&build);
        previous.hit_dice_pools.insert(DieType::D10, Pool::exhausted(2));
        previous.record_short_rest();
        previous.record_short_rest();
        previous.record_long_rest();

        let next = reinitialize(
            &previous,
            &CharacterBuild::single_class(CharacterClass::Fighter, 3, 28),
        );
        assert_eq!(next.hit_dice(DieType::D10), Some(&Pool::full(3)));
        assert_eq!(next.current_hp, 28);
        assert_eq!(next.short_rests_taken(), 2);
        assert_eq!(next.long_rests_taken(), 1);
    }
}
