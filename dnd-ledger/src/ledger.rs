//! The resource ledger: every consumable counter for one character incarnation.
//!
//! Pools and bounded counters keep their fields private. Every constructor and
//! every deserialization path clamps into range, so a ledger that exists is a
//! valid ledger and callers never re-check bounds on access.

use crate::dice::DieType;
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Highest value either death-save counter can reach.
pub const MAX_DEATH_SAVES: u8 = 3;

/// Highest exhaustion level.
pub const MAX_EXHAUSTION: u8 = 6;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for one incarnation ("life") of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncarnationId(pub Uuid);

impl IncarnationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IncarnationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IncarnationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn clamp_u8(value: i64, max: u8) -> u8 {
    value.clamp(0, max as i64) as u8
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}

// ============================================================================
// Pools
// ============================================================================

/// A `{used, max}` bucket. `used` is always within `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawPool")]
pub struct Pool {
    used: u32,
    max: u32,
}

#[derive(Deserialize)]
struct RawPool {
    #[serde(default)]
    used: i64,
    #[serde(default)]
    max: i64,
}

impl From<RawPool> for Pool {
    fn from(raw: RawPool) -> Self {
        Pool::new(clamp_u32(raw.used), clamp_u32(raw.max))
    }
}

impl Pool {
    /// Create a pool, clamping `used` to `max`.
    pub fn new(used: u32, max: u32) -> Self {
        Self {
            used: used.min(max),
            max,
        }
    }

    /// A pool with nothing spent.
    pub fn full(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// A pool with everything spent.
    pub fn exhausted(max: u32) -> Self {
        Self { used: max, max }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn available(&self) -> u32 {
        self.max - self.used
    }

    /// `used = min(used + amount, max)`. Returns how many were actually spent.
    pub fn spend(&mut self, amount: u32) -> u32 {
        let before = self.used;
        self.used = self.used.saturating_add(amount).min(self.max);
        self.used - before
    }

    /// `used = max(used - amount, 0)`. Returns how many were actually recovered.
    pub fn recover(&mut self, amount: u32) -> u32 {
        let before = self.used;
        self.used = self.used.saturating_sub(amount);
        before - self.used
    }

    /// `used = 0`. Returns how many were spent before the reset.
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.used)
    }
}

/// A spell slot level, 1 through 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct SpellLevel(u8);

impl SpellLevel {
    pub fn new(level: i64) -> Result<Self, LedgerError> {
        if (1..=9).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(LedgerError::InvalidSpellLevel(level))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = SpellLevel> {
        (1..=9).map(SpellLevel)
    }
}

impl From<SpellLevel> for u8 {
    fn from(level: SpellLevel) -> Self {
        level.0
    }
}

impl TryFrom<u8> for SpellLevel {
    type Error = LedgerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SpellLevel::new(value as i64)
    }
}

impl fmt::Display for SpellLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Warlock-style pact magic: one pool of same-level slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "RawPactSlots", from = "RawPactSlots")]
pub struct PactSlots {
    pub pool: Pool,
    pub slot_level: u8,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawPactSlots {
    used: i64,
    max: i64,
    slot_level: i64,
}

impl From<RawPactSlots> for PactSlots {
    fn from(raw: RawPactSlots) -> Self {
        Self {
            pool: Pool::new(clamp_u32(raw.used), clamp_u32(raw.max)),
            slot_level: clamp_u8(raw.slot_level, 9),
        }
    }
}

impl From<PactSlots> for RawPactSlots {
    fn from(pact: PactSlots) -> Self {
        Self {
            used: pact.pool.used() as i64,
            max: pact.pool.max() as i64,
            slot_level: pact.slot_level as i64,
        }
    }
}

impl PactSlots {
    pub fn new(max: u32, slot_level: u8) -> Self {
        Self {
            pool: Pool::full(max),
            slot_level,
        }
    }
}

// ============================================================================
// Limited Features
// ============================================================================

/// Which rest restores a limited feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RechargeType {
    #[serde(rename = "short")]
    ShortRest,
    #[serde(rename = "long")]
    LongRest,
    /// Once per day; only a long rest brings it back.
    #[serde(rename = "dawn")]
    Dawn,
}

/// A class or subclass ability with a bounded number of uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RawFeature", from = "RawFeature")]
pub struct LimitedFeature {
    pub name: String,
    pub uses: Pool,
    pub recharge: RechargeType,
}

#[derive(Serialize, Deserialize)]
struct RawFeature {
    name: String,
    #[serde(default)]
    max: i64,
    #[serde(default)]
    used: i64,
    recharge: RechargeType,
}

impl From<RawFeature> for LimitedFeature {
    fn from(raw: RawFeature) -> Self {
        Self {
            name: raw.name,
            uses: Pool::new(clamp_u32(raw.used), clamp_u32(raw.max)),
            recharge: raw.recharge,
        }
    }
}

impl From<LimitedFeature> for RawFeature {
    fn from(feature: LimitedFeature) -> Self {
        Self {
            name: feature.name,
            max: feature.uses.max() as i64,
            used: feature.uses.used() as i64,
            recharge: feature.recharge,
        }
    }
}

impl LimitedFeature {
    pub fn new(name: impl Into<String>, max: u32, recharge: RechargeType) -> Self {
        Self {
            name: name.into(),
            uses: Pool::full(max),
            recharge,
        }
    }

    pub fn with_used(mut self, used: u32) -> Self {
        self.uses = Pool::new(used, self.uses.max());
        self
    }
}

// ============================================================================
// Resource Ledger
// ============================================================================

/// All consumable-resource counters for one character incarnation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawLedger")]
pub struct ResourceLedger {
    /// May be zero or negative; what that means is decided by combat logic.
    pub current_hp: i32,
    temp_hp: u32,
    pub hit_dice_pools: BTreeMap<DieType, Pool>,
    pub spell_slot_pools: BTreeMap<SpellLevel, Pool>,
    pub pact_slots: PactSlots,
    pub limited_features: BTreeMap<String, LimitedFeature>,
    death_save_successes: u8,
    death_save_failures: u8,
    exhaustion_level: u8,
    pub concentrating_on: Option<String>,
    pub conditions: Vec<String>,
    short_rests_taken: u32,
    long_rests_taken: u32,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawLedger {
    current_hp: i32,
    temp_hp: i64,
    hit_dice_pools: BTreeMap<DieType, Pool>,
    spell_slot_pools: BTreeMap<SpellLevel, Pool>,
    pact_slots: PactSlots,
    limited_features: BTreeMap<String, LimitedFeature>,
    death_save_successes: i64,
    death_save_failures: i64,
    exhaustion_level: i64,
    concentrating_on: Option<String>,
    conditions: Vec<String>,
    short_rests_taken: i64,
    long_rests_taken: i64,
}

impl From<RawLedger> for ResourceLedger {
    fn from(raw: RawLedger) -> Self {
        Self {
            current_hp: raw.current_hp,
            temp_hp: clamp_u32(raw.temp_hp),
            hit_dice_pools: raw.hit_dice_pools,
            spell_slot_pools: raw.spell_slot_pools,
            pact_slots: raw.pact_slots,
            limited_features: raw.limited_features,
            death_save_successes: clamp_u8(raw.death_save_successes, MAX_DEATH_SAVES),
            death_save_failures: clamp_u8(raw.death_save_failures, MAX_DEATH_SAVES),
            exhaustion_level: clamp_u8(raw.exhaustion_level, MAX_EXHAUSTION),
            concentrating_on: raw.concentrating_on,
            conditions: raw.conditions,
            short_rests_taken: clamp_u32(raw.short_rests_taken),
            long_rests_taken: clamp_u32(raw.long_rests_taken),
        }
    }
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ResourceLedger {
    /// An empty ledger at the given HP.
    pub fn new(current_hp: i32) -> Self {
        Self {
            current_hp,
            temp_hp: 0,
            hit_dice_pools: BTreeMap::new(),
            spell_slot_pools: BTreeMap::new(),
            pact_slots: PactSlots::default(),
            limited_features: BTreeMap::new(),
            death_save_successes: 0,
            death_save_failures: 0,
            exhaustion_level: 0,
            concentrating_on: None,
            conditions: Vec::new(),
            short_rests_taken: 0,
            long_rests_taken: 0,
        }
    }

    pub fn with_hit_dice(mut self, die_type: DieType, pool: Pool) -> Self {
        self.hit_dice_pools.insert(die_type, pool);
        self
    }

    pub fn with_spell_slots(mut self, level: SpellLevel, pool: Pool) -> Self {
        self.spell_slot_pools.insert(level, pool);
        self
    }

    pub fn with_pact_slots(mut self, pact: PactSlots) -> Self {
        self.pact_slots = pact;
        self
    }

    pub fn with_feature(mut self, key: impl Into<String>, feature: LimitedFeature) -> Self {
        self.limited_features.insert(key.into(), feature);
        self
    }

    pub fn with_temp_hp(mut self, temp_hp: i64) -> Self {
        self.set_temp_hp(temp_hp);
        self
    }

    pub fn with_exhaustion(mut self, level: i64) -> Self {
        self.set_exhaustion_level(level);
        self
    }

    pub fn temp_hp(&self) -> u32 {
        self.temp_hp
    }

    pub fn death_save_successes(&self) -> u8 {
        self.death_save_successes
    }

    pub fn death_save_failures(&self) -> u8 {
        self.death_save_failures
    }

    pub fn exhaustion_level(&self) -> u8 {
        self.exhaustion_level
    }

    pub fn short_rests_taken(&self) -> u32 {
        self.short_rests_taken
    }

    pub fn long_rests_taken(&self) -> u32 {
        self.long_rests_taken
    }

    /// Negative values clamp to 0.
    pub fn set_temp_hp(&mut self, value: i64) {
        self.temp_hp = clamp_u32(value);
    }

    pub fn set_death_save_successes(&mut self, value: i64) {
        self.death_save_successes = clamp_u8(value, MAX_DEATH_SAVES);
    }

    pub fn set_death_save_failures(&mut self, value: i64) {
        self.death_save_failures = clamp_u8(value, MAX_DEATH_SAVES);
    }

    pub fn set_exhaustion_level(&mut self, value: i64) {
        self.exhaustion_level = clamp_u8(value, MAX_EXHAUSTION);
    }

    pub fn clear_death_saves(&mut self) {
        self.death_save_successes = 0;
        self.death_save_failures = 0;
    }

    pub fn hit_dice(&self, die_type: DieType) -> Option<&Pool> {
        self.hit_dice_pools.get(&die_type)
    }

    pub fn spell_slots(&self, level: SpellLevel) -> Option<&Pool> {
        self.spell_slot_pools.get(&level)
    }

    pub fn feature(&self, key: &str) -> Option<&LimitedFeature> {
        self.limited_features.get(key)
    }

    pub(crate) fn record_short_rest(&mut self) {
        self.short_rests_taken = self.short_rests_taken.saturating_add(1);
    }

    pub(crate) fn record_long_rest(&mut self) {
        self.long_rests_taken = self.long_rests_taken.saturating_add(1);
    }

    /// Carry rest counters over from an earlier ledger of the same incarnation.
    pub(crate) fn inherit_rest_counters(&mut self, previous: &ResourceLedger) {
        self.short_rests_taken = self.short_rests_taken.max(previous.short_rests_taken);
        self.long_rests_taken = self.long_rests_taken.max(previous.long_rests_taken);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pool_clamps_on_construction() {
        let pool = Pool::new(7, 4);
        assert_eq!(pool.used(), 4);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_pool_spend_caps_at_max() {
        let mut pool = Pool::new(1, 3);
        assert_eq!(pool.spend(5), 2);
        assert_eq!(pool.used(), 3);
        assert_eq!(pool.spend(u32::MAX), 0);
    }

    #[test]
    fn test_pool_recover_floors_at_zero() {
        let mut pool = Pool::new(2, 3);
        assert_eq!(pool.recover(10), 2);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_pool_reset_reports_prior_use() {
        let mut pool = Pool::new(2, 3);
        assert_eq!(pool.reset(), 2);
        assert_eq!(pool.reset(), 0);
    }

    #[test]
    fn test_spell_level_bounds() {
        assert!(SpellLevel::new(1).is_ok());
        assert!(SpellLevel::new(9).is_ok());
        assert_eq!(
            SpellLevel::new(0).unwrap_err(),
            LedgerError::InvalidSpellLevel(0)
        );
        assert_eq!(
            SpellLevel::new(10).unwrap_err(),
            LedgerError::InvalidSpellLevel(10)
        );
    }

    #[test]
    fn test_deserialize_clamps_out_of_range_values() {
        let ledger: ResourceLedger = serde_json::from_value(json!({
            "currentHp": 12,
            "tempHp": -4,
            "hitDicePools": { "d8": { "used": 9, "max": 5 } },
            "spellSlotPools": { "1": { "used": -2, "max": 4 } },
            "pactSlots": { "used": 3, "max": 2, "slotLevel": 1 },
            "limitedFeatures": {
                "rage": { "name": "Rage", "max": 2, "used": 6, "recharge": "long" }
            },
            "deathSaveSuccesses": 5,
            "deathSaveFailures": -1,
            "exhaustionLevel": 9,
            "conditions": ["Poisoned", "Prone", "Poisoned"]
        }))
        .unwrap();

        assert_eq!(ledger.current_hp, 12);
        assert_eq!(ledger.temp_hp(), 0);
        assert_eq!(ledger.hit_dice(DieType::D8), Some(&Pool::new(5, 5)));
        let first = SpellLevel::new(1).unwrap();
        assert_eq!(ledger.spell_slots(first), Some(&Pool::new(0, 4)));
        assert_eq!(ledger.pact_slots.pool, Pool::new(2, 2));
        assert_eq!(ledger.feature("rage").unwrap().uses, Pool::new(2, 2));
        assert_eq!(ledger.death_save_successes(), 3);
        assert_eq!(ledger.death_save_failures(), 0);
        assert_eq!(ledger.exhaustion_level(), 6);
        assert_eq!(ledger.conditions, vec!["Poisoned", "Prone", "Poisoned"]);
    }

    #[test]
    fn test_deserialize_rejects_invalid_spell_level() {
        let result: Result<ResourceLedger, _> = serde_json::from_value(json!({
            "spellSlotPools": { "10": { "used": 0, "max": 1 } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_camel_case_shape() {
        let ledger = ResourceLedger::new(10)
            .with_hit_dice(DieType::D10, Pool::new(1, 3))
            .with_pact_slots(PactSlots::new(2, 1))
            .with_feature(
                "second-wind",
                LimitedFeature::new("Second Wind", 1, RechargeType::ShortRest),
            );

        let value = serde_json::to_value(&ledger).unwrap();
        assert_eq!(value["currentHp"], 10);
        assert_eq!(value["hitDicePools"]["d10"]["used"], 1);
        assert_eq!(value["pactSlots"]["slotLevel"], 1);
        assert_eq!(value["limitedFeatures"]["second-wind"]["recharge"], "short");
        assert_eq!(value["deathSaveSuccesses"], 0);

        let back: ResourceLedger = serde_json::from_value(value).unwrap();
        assert_eq!(back, ledger);
    }
}
