//! Short and long rest recovery.
//!
//! Both procedures run over a copy of the ledger and hand back the whole
//! result, so a caller never observes a half-applied rest. Neither can fail:
//! overspending, resting at full HP and empty pools all clamp into a valid,
//! possibly empty, report.

use crate::dice::DieType;
use crate::ledger::{Pool, RechargeType, ResourceLedger, SpellLevel};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestType {
    Short,
    Long,
}

/// Hit dice of one size to spend during a short rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitDieSpend {
    pub die_type: DieType,
    pub count: u32,
}

impl HitDieSpend {
    pub fn new(die_type: DieType, count: u32) -> Self {
        Self { die_type, count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortRestRequest {
    #[serde(default)]
    pub hit_dice: Vec<HitDieSpend>,
    #[serde(default)]
    pub constitution_modifier: i32,
    pub max_hp: i32,
}

impl ShortRestRequest {
    pub fn new(max_hp: i32, constitution_modifier: i32) -> Self {
        Self {
            hit_dice: Vec::new(),
            constitution_modifier,
            max_hp,
        }
    }

    pub fn spend(mut self, die_type: DieType, count: u32) -> Self {
        self.hit_dice.push(HitDieSpend::new(die_type, count));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongRestRequest {
    pub max_hp: i32,
    /// Total hit dice per die size, from the character's build.
    #[serde(default)]
    pub total_hit_dice: BTreeMap<DieType, u32>,
}

impl LongRestRequest {
    pub fn new(max_hp: i32, total_hit_dice: BTreeMap<DieType, u32>) -> Self {
        Self {
            max_hp,
            total_hit_dice,
        }
    }

    /// Take the hit dice totals from the ledger's own pool maximums.
    pub fn from_ledger(ledger: &ResourceLedger, max_hp: i32) -> Self {
        Self {
            max_hp,
            total_hit_dice: ledger
                .hit_dice_pools
                .iter()
                .map(|(die, pool)| (*die, pool.max()))
                .collect(),
        }
    }
}

/// Spell slots a rest restored: per level, plus pact slots.
///
/// Serializes flat: `{"1": 3, "pact": 1}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpellSlotsRestored {
    #[serde(flatten)]
    pub levels: BTreeMap<SpellLevel, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pact: Option<u32>,
}

impl SpellSlotsRestored {
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.pact.is_none()
    }
}

/// What a rest changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestReport {
    pub rest_type: RestType,
    pub hp_restored: i32,
    pub hit_dice_spent: u32,
    pub hit_dice_recovered: u32,
    pub features_reset: Vec<String>,
    pub spell_slots_restored: SpellSlotsRestored,
    pub exhaustion_reduced: bool,
    /// Build-data mismatches that were resolved with a default.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RestReport {
    fn new(rest_type: RestType) -> Self {
        Self {
            rest_type,
            hp_restored: 0,
            hit_dice_spent: 0,
            hit_dice_recovered: 0,
            features_reset: Vec::new(),
            spell_slots_restored: SpellSlotsRestored::default(),
            exhaustion_reduced: false,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestOutcome {
    pub ledger: ResourceLedger,
    pub report: RestReport,
}

/// HP regained per hit die: the die's average plus CON, at least 1.
pub fn healing_per_die(die_type: DieType, constitution_modifier: i32) -> i64 {
    (die_type.average_roll() as i64 + constitution_modifier as i64).max(1)
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Take a short rest.
pub fn short_rest(ledger: &ResourceLedger, request: &ShortRestRequest) -> RestOutcome {
    let mut next = ledger.clone();
    let mut report = RestReport::new(RestType::Short);

    // Spend hit dice in request order.
    let mut healing: i64 = 0;
    for spend in &request.hit_dice {
        let Some(pool) = next.hit_dice_pools.get_mut(&spend.die_type) else {
            continue;
        };
        let actual = spend.count.min(pool.available());
        if actual == 0 {
            continue;
        }
        pool.spend(actual);
        report.hit_dice_spent += actual;
        let per_die = healing_per_die(spend.die_type, request.constitution_modifier);
        healing = healing.saturating_add(per_die.saturating_mul(actual as i64));
    }

    // Short-rest features
    for feature in next.limited_features.values_mut() {
        if feature.recharge == RechargeType::ShortRest && feature.uses.used() > 0 {
            feature.uses.reset();
            report.features_reset.push(feature.name.clone());
        }
    }

    // Pact magic
    let pact = &mut next.pact_slots.pool;
    if pact.max() > 0 && pact.used() > 0 {
        report.spell_slots_restored.pact = Some(pact.reset());
    }

    // HP above the maximum is brought down to it.
    let before = next.current_hp as i64;
    let healed = before.saturating_add(healing).min(request.max_hp as i64);
    next.current_hp = saturate_i32(healed);
    report.hp_restored = saturate_i32(healed - before);

    next.record_short_rest();

    info!(
        hp_restored = report.hp_restored,
        hit_dice_spent = report.hit_dice_spent,
        features_reset = report.features_reset.len(),
        "Short rest complete"
    );
    RestOutcome {
        ledger: next,
        report,
    }
}

/// Take a long rest.
pub fn long_rest(ledger: &ResourceLedger, request: &LongRestRequest) -> RestOutcome {
    let mut next = ledger.clone();
    let mut report = RestReport::new(RestType::Long);

    // Full HP
    let missing = request.max_hp as i64 - next.current_hp as i64;
    report.hp_restored = saturate_i32(missing.max(0));
    next.current_hp = request.max_hp;
    next.set_temp_hp(0);

    // Spell slots
    for (level, pool) in next.spell_slot_pools.iter_mut() {
        let restored = pool.reset();
        if restored > 0 {
            report.spell_slots_restored.levels.insert(*level, restored);
        }
    }
    let restored = next.pact_slots.pool.reset();
    if restored > 0 {
        report.spell_slots_restored.pact = Some(restored);
    }

    // Every feature, whatever its recharge.
    for feature in next.limited_features.values_mut() {
        if feature.uses.reset() > 0 {
            report.features_reset.push(feature.name.clone());
        }
    }

    // Hit dice: half the total (rounded down, minimum one) per die size.
    for (die_type, total) in &request.total_hit_dice {
        let recovery = (total / 2).max(1);
        let pool = match next.hit_dice_pools.entry(*die_type) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(_) if *total == 0 => continue,
            Entry::Vacant(entry) => {
                warn!(%die_type, total, "Hit dice missing from ledger, seeding spent pool");
                report.warnings.push(format!(
                    "No {die_type} hit dice in ledger; seeded {total} as fully spent"
                ));
                entry.insert(Pool::exhausted(*total))
            }
        };
        report.hit_dice_recovered += pool.recover(recovery);
    }

    // Death saves, concentration, conditions
    next.clear_death_saves();
    next.concentrating_on = None;
    next.conditions.clear();

    let exhaustion = next.exhaustion_level();
    if exhaustion > 0 {
        next.set_exhaustion_level(exhaustion as i64 - 1);
        report.exhaustion_reduced = true;
    }

    next.record_long_rest();

    info!(
        hp_restored = report.hp_restored,
        hit_dice_recovered = report.hit_dice_recovered,
        features_reset = report.features_reset.len(),
        exhaustion_reduced = report.exhaustion_reduced,
        "Long rest complete"
    );
    RestOutcome {
        ledger: next,
        report,
    }
}
