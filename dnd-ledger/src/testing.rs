//! Testing utilities for the ledger.
//!
//! - Sample builds for the common caster shapes
//! - `TestHarness`: one incarnation over an in-memory store
//! - Assertion helpers for pool state

use crate::character::{Ability, AbilityScores, CharacterClass, ClassLevel};
use crate::dice::DieType;
use crate::init::CharacterBuild;
use crate::ledger::{IncarnationId, ResourceLedger, SpellLevel};
use crate::ops::{OperationOutcome, ResourceOperation};
use crate::rest::{LongRestRequest, RestOutcome, ShortRestRequest};
use crate::service::{LedgerService, ServiceError};
use crate::store::MemoryLedgerStore;
use serde_json::Value;

// ============================================================================
// Sample builds
// ============================================================================

/// Level 5 human fighter, CON 16.
pub fn sample_fighter() -> CharacterBuild {
    CharacterBuild::single_class(CharacterClass::Fighter, 5, 49)
        .with_ability_scores(AbilityScores::new(16, 12, 16, 10, 12, 8))
}

/// Level 5 wizard, CON 14.
pub fn sample_wizard() -> CharacterBuild {
    CharacterBuild::single_class(CharacterClass::Wizard, 5, 32)
        .with_ability_scores(AbilityScores::new(8, 14, 14, 16, 12, 10))
}

/// Level 5 warlock, CHA 16.
pub fn sample_warlock() -> CharacterBuild {
    CharacterBuild::single_class(CharacterClass::Warlock, 5, 38)
        .with_ability_scores(AbilityScores::new(8, 14, 14, 10, 12, 16))
}

/// Paladin 6 / Sorcerer 2 / Warlock 1.
pub fn sample_multiclass() -> CharacterBuild {
    CharacterBuild::new(76)
        .with_class(ClassLevel::new(CharacterClass::Paladin, 6).with_subclass("Devotion"))
        .with_class(ClassLevel::new(CharacterClass::Sorcerer, 2))
        .with_class(ClassLevel::new(CharacterClass::Warlock, 1))
        .with_ability_scores(AbilityScores::new(16, 10, 14, 8, 10, 16))
}

// ============================================================================
// Harness
// ============================================================================

/// Drives one incarnation through the service, as a host would.
pub struct TestHarness {
    service: LedgerService<MemoryLedgerStore>,
    id: IncarnationId,
    build: CharacterBuild,
}

impl TestHarness {
    /// Create a fresh incarnation and initialize its ledger from `build`.
    pub async fn new(build: CharacterBuild) -> Result<Self, ServiceError> {
        let service = LedgerService::new(MemoryLedgerStore::new());
        let id = IncarnationId::new();
        service.initialize(id, &build).await?;
        Ok(Self { service, id, build })
    }

    pub fn id(&self) -> IncarnationId {
        self.id
    }

    pub fn build(&self) -> &CharacterBuild {
        &self.build
    }

    pub fn service(&self) -> &LedgerService<MemoryLedgerStore> {
        &self.service
    }

    pub async fn ledger(&self) -> Result<ResourceLedger, ServiceError> {
        self.service.get(self.id).await
    }

    pub async fn apply(&self, operation: ResourceOperation) -> Result<OperationOutcome, ServiceError> {
        self.service.apply(self.id, &operation).await
    }

    /// Apply an operation in its client JSON form.
    pub async fn apply_json(&self, value: Value) -> Result<OperationOutcome, ServiceError> {
        let operation = ResourceOperation::from_json(value)?;
        self.apply(operation).await
    }

    /// Short rest using the build's max HP and CON modifier.
    pub async fn short_rest(&self, hit_dice: &[(DieType, u32)]) -> Result<RestOutcome, ServiceError> {
        let con = self.build.ability_scores.modifier(Ability::Constitution);
        let request = hit_dice
            .iter()
            .fold(ShortRestRequest::new(self.build.max_hp, con), |req, (die, count)| {
                req.spend(*die, *count)
            });
        self.service.short_rest(self.id, &request).await
    }

    /// Long rest using the build's max HP and hit dice totals.
    pub async fn long_rest(&self) -> Result<RestOutcome, ServiceError> {
        let request = LongRestRequest::new(self.build.max_hp, self.build.total_hit_dice());
        self.service.long_rest(self.id, &request).await
    }

    /// Switch to a new build, re-initializing if its shape changed.
    pub async fn rebuild(&mut self, build: CharacterBuild) -> Result<ResourceLedger, ServiceError> {
        let ledger = self.service.sync_build(self.id, &self.build, &build).await?;
        self.build = build;
        Ok(ledger)
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert a hit dice pool's `(used, max)`.
pub fn assert_hit_dice(ledger: &ResourceLedger, die_type: DieType, used: u32, max: u32) {
    let pool = ledger.hit_dice(die_type).copied().unwrap_or_default();
    assert_eq!(
        (pool.used(), pool.max()),
        (used, max),
        "Expected {die_type} hit dice {used}/{max}, got {}/{}",
        pool.used(),
        pool.max()
    );
}

/// Assert a spell slot pool's `(used, max)`.
pub fn assert_spell_slots(ledger: &ResourceLedger, level: u8, used: u32, max: u32) {
    let pool = SpellLevel::new(level as i64)
        .ok()
        .and_then(|level| ledger.spell_slots(level).copied())
        .unwrap_or_default();
    assert_eq!(
        (pool.used(), pool.max()),
        (used, max),
        "Expected level {level} slots {used}/{max}, got {}/{}",
        pool.used(),
        pool.max()
    );
}

/// Assert how many uses of a feature are spent.
pub fn assert_feature_used(ledger: &ResourceLedger, key: &str, used: u32) {
    let feature = ledger.feature(key);
    assert!(feature.is_some(), "Expected feature '{key}' in ledger");
    if let Some(feature) = feature {
        assert_eq!(
            feature.uses.used(),
            used,
            "Expected {used} uses of '{key}' spent, got {}",
            feature.uses.used()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_harness_round_trip() {
        let harness = TestHarness::new(sample_fighter()).await.unwrap();
        assert_hit_dice(&harness.ledger().await.unwrap(), DieType::D10, 0, 5);

        harness
            .apply_json(json!({"op": "useFeature", "key": "action-surge"}))
            .await
            .unwrap();
        let outcome = harness.short_rest(&[(DieType::D10, 2)]).await.unwrap();
        // Already at max HP; the dice are spent anyway.
        assert_eq!(outcome.report.hp_restored, 0);
        assert_feature_used(&outcome.ledger, "action-surge", 0);
        assert_hit_dice(&outcome.ledger, DieType::D10, 2, 5);
    }

    #[tokio::test]
    async fn test_harness_rebuild() {
        let mut harness = TestHarness::new(sample_wizard()).await.unwrap();
        let ledger = harness
            .rebuild(CharacterBuild::single_class(CharacterClass::Wizard, 7, 44))
            .await
            .unwrap();
        assert_spell_slots(&ledger, 4, 0, 1);
        assert_eq!(harness.build().character_level(), 7);
    }

    #[test]
    fn test_sample_builds_have_expected_levels() {
        assert_eq!(sample_fighter().character_level(), 5);
        assert_eq!(sample_multiclass().character_level(), 9);
        assert_eq!(sample_warlock().ability_scores.modifier(Ability::Charisma), 3);
    }
}
