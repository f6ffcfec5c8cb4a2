//! QA tests for rest recovery, driven through the public API.
//!
//! Run with: `cargo test -p dnd-ledger --test qa_rest`

use dnd_ledger::testing::{
    assert_feature_used, assert_hit_dice, assert_spell_slots, sample_fighter, sample_multiclass,
    sample_warlock, sample_wizard, TestHarness,
};
use dnd_ledger::{
    long_rest, short_rest, DieType, LimitedFeature, LongRestRequest, PactSlots, Pool,
    RechargeType, ResourceLedger, ShortRestRequest, SpellLevel,
};
use serde_json::json;
use std::collections::BTreeMap;

// =============================================================================
// Short rest
// =============================================================================

#[tokio::test]
async fn test_fighter_adventuring_day() {
    let harness = TestHarness::new(sample_fighter()).await.unwrap();

    // Take a beating, burn the short-rest features.
    harness
        .apply_json(json!({"op": "update", "currentHp": 12, "maxHp": 49}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "useFeature", "key": "second-wind"}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "useFeature", "key": "action-surge"}))
        .await
        .unwrap();

    // CON 16: each d10 heals 6 + 3.
    let outcome = harness.short_rest(&[(DieType::D10, 3)]).await.unwrap();
    assert_eq!(outcome.report.hit_dice_spent, 3);
    assert_eq!(outcome.report.hp_restored, 27);
    assert_eq!(outcome.ledger.current_hp, 39);
    let mut reset = outcome.report.features_reset.clone();
    reset.sort();
    assert_eq!(reset, vec!["Action Surge", "Second Wind"]);
    assert_hit_dice(&outcome.ledger, DieType::D10, 3, 5);
    assert_feature_used(&outcome.ledger, "second-wind", 0);

    // Only two dice left; asking for five spends two.
    let outcome = harness.short_rest(&[(DieType::D10, 5)]).await.unwrap();
    assert_eq!(outcome.report.hit_dice_spent, 2);
    assert_eq!(outcome.ledger.current_hp, 49);
    assert_hit_dice(&outcome.ledger, DieType::D10, 5, 5);
    assert_eq!(outcome.ledger.short_rests_taken(), 2);
}

#[tokio::test]
async fn test_warlock_short_rest_restores_pact_slots() {
    let harness = TestHarness::new(sample_warlock()).await.unwrap();
    let ledger = harness.ledger().await.unwrap();
    assert_eq!(ledger.pact_slots, PactSlots::new(2, 3));

    harness
        .apply_json(json!({"op": "usePactSlot", "amount": 2}))
        .await
        .unwrap();
    let outcome = harness.short_rest(&[]).await.unwrap();

    assert_eq!(outcome.report.spell_slots_restored.pact, Some(2));
    assert!(outcome.report.spell_slots_restored.levels.is_empty());
    assert_eq!(outcome.ledger.pact_slots.pool.used(), 0);
    assert_eq!(outcome.report.hit_dice_spent, 0);
}

#[tokio::test]
async fn test_wizard_short_rest_keeps_slots_and_arcane_recovery() {
    let harness = TestHarness::new(sample_wizard()).await.unwrap();
    harness
        .apply_json(json!({"op": "useSpellSlot", "level": 3}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "useFeature", "key": "arcane-recovery"}))
        .await
        .unwrap();

    let outcome = harness.short_rest(&[]).await.unwrap();
    assert!(outcome.report.features_reset.is_empty());
    assert!(outcome.report.spell_slots_restored.is_empty());
    assert_spell_slots(&outcome.ledger, 3, 1, 2);
    assert_feature_used(&outcome.ledger, "arcane-recovery", 1);
}

#[test]
fn test_short_rest_with_negative_constitution() {
    let ledger = ResourceLedger::new(4).with_hit_dice(DieType::D8, Pool::full(3));
    let request = ShortRestRequest::new(30, -2).spend(DieType::D8, 2);
    let outcome = short_rest(&ledger, &request);

    // max(1, 5 - 2) = 3 per die.
    assert_eq!(outcome.report.hp_restored, 6);
    assert_eq!(outcome.ledger.current_hp, 10);
}

#[test]
fn test_short_rest_request_from_json() {
    let request: ShortRestRequest = serde_json::from_value(json!({
        "hitDice": [{"dieType": "d8", "count": 1}, {"dieType": "d10", "count": 2}],
        "constitutionModifier": 1,
        "maxHp": 40
    }))
    .unwrap();
    assert_eq!(request.hit_dice.len(), 2);
    assert_eq!(request.hit_dice[1].die_type, DieType::D10);

    let bad: Result<ShortRestRequest, _> = serde_json::from_value(json!({
        "hitDice": [{"dieType": "d7", "count": 1}],
        "maxHp": 40
    }));
    assert!(bad.is_err());
}

// =============================================================================
// Long rest
// =============================================================================

#[test]
fn test_long_rest_reference_scenario() {
    let ledger = ResourceLedger::new(1)
        .with_temp_hp(5)
        .with_exhaustion(2)
        .with_spell_slots(SpellLevel::new(1).unwrap(), Pool::new(3, 4))
        .with_pact_slots(PactSlots {
            pool: Pool::new(1, 1),
            slot_level: 1,
        });
    let outcome = long_rest(&ledger, &LongRestRequest::new(30, BTreeMap::new()));

    assert_eq!(outcome.ledger.current_hp, 30);
    assert_eq!(outcome.ledger.temp_hp(), 0);
    assert_eq!(outcome.ledger.exhaustion_level(), 1);
    assert_spell_slots(&outcome.ledger, 1, 0, 4);
    assert_eq!(outcome.ledger.pact_slots.pool.used(), 0);

    let report = serde_json::to_value(&outcome.report).unwrap();
    assert_eq!(
        report,
        json!({
            "restType": "long",
            "hpRestored": 29,
            "hitDiceSpent": 0,
            "hitDiceRecovered": 0,
            "featuresReset": [],
            "spellSlotsRestored": {"1": 3, "pact": 1},
            "exhaustionReduced": true
        })
    );
}

#[test]
fn test_long_rest_ten_spent_dice_recovers_five() {
    let ledger = ResourceLedger::new(10).with_hit_dice(DieType::D10, Pool::exhausted(10));
    let mut totals = BTreeMap::new();
    totals.insert(DieType::D10, 10);
    let outcome = long_rest(&ledger, &LongRestRequest::new(80, totals));
    assert_hit_dice(&outcome.ledger, DieType::D10, 5, 10);
}

#[test]
fn test_long_rest_dawn_feature_resets() {
    let ledger = ResourceLedger::new(10).with_feature(
        "arcane-recovery",
        LimitedFeature::new("Arcane Recovery", 1, RechargeType::Dawn).with_used(1),
    );
    let outcome = long_rest(&ledger, &LongRestRequest::from_ledger(&ledger, 10));
    assert_eq!(outcome.report.features_reset, vec!["Arcane Recovery"]);
}

#[tokio::test]
async fn test_multiclass_long_rest_recovers_each_die_size() {
    let harness = TestHarness::new(sample_multiclass()).await.unwrap();
    let ledger = harness.ledger().await.unwrap();
    assert_hit_dice(&ledger, DieType::D10, 0, 6);
    assert_hit_dice(&ledger, DieType::D6, 0, 2);
    assert_hit_dice(&ledger, DieType::D8, 0, 1);
    // Paladin 6 counts as 3 caster levels, Sorcerer 2 as 2.
    assert_spell_slots(&ledger, 3, 0, 2);

    harness.short_rest(&[(DieType::D10, 6)]).await.unwrap();
    harness.short_rest(&[(DieType::D6, 2), (DieType::D8, 1)]).await.unwrap();
    harness
        .apply_json(json!({"op": "useFeature", "key": "lay-on-hands", "amount": 30}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "useFeature", "key": "sorcery-points", "amount": 2}))
        .await
        .unwrap();

    let outcome = harness.long_rest().await.unwrap();
    assert_hit_dice(&outcome.ledger, DieType::D10, 3, 6);
    assert_hit_dice(&outcome.ledger, DieType::D6, 1, 2);
    assert_hit_dice(&outcome.ledger, DieType::D8, 0, 1);
    assert_eq!(outcome.report.hit_dice_recovered, 5);
    assert_feature_used(&outcome.ledger, "lay-on-hands", 0);
    assert_feature_used(&outcome.ledger, "sorcery-points", 0);
    assert!(outcome.report.warnings.is_empty());
    assert_eq!(outcome.ledger.long_rests_taken(), 1);
    assert_eq!(outcome.ledger.short_rests_taken(), 2);
}

#[tokio::test]
async fn test_long_rest_clears_status() {
    let harness = TestHarness::new(sample_wizard()).await.unwrap();
    harness
        .apply_json(json!({"op": "setConcentration", "spell": "Haste"}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "addCondition", "tag": "Frightened"}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "recordDeathSave", "success": false}))
        .await
        .unwrap();
    harness
        .apply_json(json!({"op": "grantTempHp", "amount": 8}))
        .await
        .unwrap();

    let outcome = harness.long_rest().await.unwrap();
    assert_eq!(outcome.ledger.concentrating_on, None);
    assert!(outcome.ledger.conditions.is_empty());
    assert_eq!(outcome.ledger.death_save_failures(), 0);
    assert_eq!(outcome.ledger.temp_hp(), 0);
    assert_eq!(outcome.ledger.current_hp, 32);
}
