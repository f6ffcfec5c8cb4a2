//! Resource operations: validated single-pool mutators.
//!
//! Every operation takes the current ledger by reference and returns a new
//! ledger plus the changes it made. Validation runs before anything is
//! touched, so a failed operation leaves no partial state behind.
//!
//! Pools follow one contract:
//! - use/spend: `used = clamp(used + amount, 0, max)`
//! - recover:   `used = clamp(used - amount, 0, max)`
//! - reset:     `used = 0`
//!
//! Overshoot clamps silently. Only malformed input is an error.

use crate::dice::DieType;
use crate::error::LedgerError;
use crate::ledger::{Pool, ResourceLedger, SpellLevel};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Amount
// ============================================================================

/// A validated, non-negative quantity. Defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "Value")]
pub struct Amount(u32);

impl Amount {
    pub const ONE: Amount = Amount(1);

    pub fn new(value: i64) -> Result<Self, LedgerError> {
        if value < 0 {
            return Err(LedgerError::NegativeAmount(value));
        }
        Ok(Self(value.min(u32::MAX as i64) as u32))
    }

    /// Validate an amount as it arrives from a client. A missing (`null`)
    /// amount means 1; strings, booleans and fractional numbers are rejected.
    pub fn from_json(value: &Value) -> Result<Self, LedgerError> {
        match value {
            Value::Null => Ok(Self::ONE),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Self::new(v)
                } else if let Some(v) = n.as_u64() {
                    Ok(Self(v.min(u32::MAX as u64) as u32))
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.is_finite() => Self::new(f as i64),
                        _ => Err(LedgerError::NonNumericAmount(n.to_string())),
                    }
                }
            }
            other => Err(LedgerError::NonNumericAmount(other.to_string())),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::ONE
    }
}

impl From<Amount> for u32 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl TryFrom<Value> for Amount {
    type Error = LedgerError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Amount::from_json(&value)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// One mutation of the ledger, in the shape clients send it:
/// `{"op": "useFeature", "key": "rage", "amount": 2}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResourceOperation {
    SpendHitDice {
        die_type: DieType,
        #[serde(default)]
        amount: Amount,
    },
    RecoverHitDice {
        die_type: DieType,
        #[serde(default)]
        amount: Amount,
    },
    UseSpellSlot {
        level: SpellLevel,
        #[serde(default)]
        amount: Amount,
    },
    RecoverSpellSlot {
        level: SpellLevel,
        #[serde(default)]
        amount: Amount,
    },
    UsePactSlot {
        #[serde(default)]
        amount: Amount,
    },
    RecoverPactSlot {
        #[serde(default)]
        amount: Amount,
    },
    ResetPactSlots,
    UseFeature {
        key: String,
        #[serde(default)]
        amount: Amount,
    },
    RecoverFeature {
        key: String,
        #[serde(default)]
        amount: Amount,
    },
    ResetFeature {
        key: String,
    },
    /// Raise HP, never past `max_hp` and never lowering it.
    Heal {
        #[serde(default)]
        amount: Amount,
        max_hp: i32,
    },
    /// Temporary HP doesn't stack; the larger value wins.
    GrantTempHp {
        amount: Amount,
    },
    RecordDeathSave {
        success: bool,
    },
    AddCondition {
        tag: String,
    },
    /// Removes the first matching tag.
    RemoveCondition {
        tag: String,
    },
    SetConcentration {
        spell: Option<String>,
    },
    /// Direct field replacement with clamping.
    Update(LedgerUpdate),
}

impl ResourceOperation {
    /// Parse an operation from client JSON.
    ///
    /// Amounts, die tags and slot levels are checked first so a bad value
    /// surfaces as its specific error rather than a generic parse failure.
    pub fn from_json(value: Value) -> Result<Self, LedgerError> {
        if let Some(amount) = value.get("amount") {
            Amount::from_json(amount)?;
        }
        if let Some(Value::String(tag)) = value.get("dieType") {
            tag.parse::<DieType>()?;
        }
        if let Some(level) = value.get("level").and_then(Value::as_i64) {
            SpellLevel::new(level)?;
        }

        serde_json::from_value(value).map_err(|e| LedgerError::MalformedOperation(e.to_string()))
    }
}

/// Direct replacement of scalar fields. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hp: Option<i64>,
    /// Required whenever `current_hp` is set; the new HP is capped at it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_hp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_save_successes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_save_failures: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhaustion_level: Option<i64>,
    /// `Some(None)` clears concentration; `None` leaves it untouched.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub concentrating_on: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
}

/// Distinguish an explicit `null` from a missing field.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Changes
// ============================================================================

/// A single state change produced by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Change {
    HitDice {
        die_type: DieType,
        used_before: u32,
        used_after: u32,
        max: u32,
    },
    SpellSlots {
        level: SpellLevel,
        used_before: u32,
        used_after: u32,
        max: u32,
    },
    PactSlots {
        used_before: u32,
        used_after: u32,
        max: u32,
    },
    Feature {
        key: String,
        name: String,
        used_before: u32,
        used_after: u32,
        max: u32,
    },
    Hp {
        before: i32,
        after: i32,
    },
    TempHp {
        before: u32,
        after: u32,
    },
    DeathSaves {
        successes: u8,
        failures: u8,
    },
    Exhaustion {
        before: u8,
        after: u8,
    },
    Conditions {
        conditions: Vec<String>,
    },
    Concentration {
        spell: Option<String>,
    },
}

/// The result of applying one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub ledger: ResourceLedger,
    pub changes: Vec<Change>,
}

#[derive(Clone, Copy)]
enum PoolAction {
    Spend(u32),
    Recover(u32),
    Reset,
}

/// Returns `(used_before, used_after)`.
fn act_on(pool: &mut Pool, action: PoolAction) -> (u32, u32) {
    let before = pool.used();
    match action {
        PoolAction::Spend(n) => {
            pool.spend(n);
        }
        PoolAction::Recover(n) => {
            pool.recover(n);
        }
        PoolAction::Reset => {
            pool.reset();
        }
    }
    (before, pool.used())
}

// ============================================================================
// Apply
// ============================================================================

/// Apply one operation to a ledger.
pub fn apply(
    ledger: &ResourceLedger,
    operation: &ResourceOperation,
) -> Result<OperationOutcome, LedgerError> {
    let mut next = ledger.clone();
    let mut changes = Vec::new();

    match operation {
        ResourceOperation::SpendHitDice { die_type, amount } => {
            changes.push(hit_dice(&mut next, *die_type, PoolAction::Spend(amount.get())));
        }
        ResourceOperation::RecoverHitDice { die_type, amount } => {
            changes.push(hit_dice(&mut next, *die_type, PoolAction::Recover(amount.get())));
        }
        ResourceOperation::UseSpellSlot { level, amount } => {
            changes.push(spell_slots(&mut next, *level, PoolAction::Spend(amount.get())));
        }
        ResourceOperation::RecoverSpellSlot { level, amount } => {
            changes.push(spell_slots(&mut next, *level, PoolAction::Recover(amount.get())));
        }
        ResourceOperation::UsePactSlot { amount } => {
            changes.push(pact_slots(&mut next, PoolAction::Spend(amount.get())));
        }
        ResourceOperation::RecoverPactSlot { amount } => {
            changes.push(pact_slots(&mut next, PoolAction::Recover(amount.get())));
        }
        ResourceOperation::ResetPactSlots => {
            changes.push(pact_slots(&mut next, PoolAction::Reset));
        }
        ResourceOperation::UseFeature { key, amount } => {
            changes.push(feature(&mut next, key, PoolAction::Spend(amount.get()))?);
        }
        ResourceOperation::RecoverFeature { key, amount } => {
            changes.push(feature(&mut next, key, PoolAction::Recover(amount.get()))?);
        }
        ResourceOperation::ResetFeature { key } => {
            changes.push(feature(&mut next, key, PoolAction::Reset)?);
        }
        ResourceOperation::Heal { amount, max_hp } => {
            let before = next.current_hp;
            if before < *max_hp {
                let healed = (before as i64 + amount.get() as i64).min(*max_hp as i64);
                next.current_hp = healed as i32;
            }
            changes.push(Change::Hp {
                before,
                after: next.current_hp,
            });
        }
        ResourceOperation::GrantTempHp { amount } => {
            let before = next.temp_hp();
            next.set_temp_hp(before.max(amount.get()) as i64);
            changes.push(Change::TempHp {
                before,
                after: next.temp_hp(),
            });
        }
        ResourceOperation::RecordDeathSave { success } => {
            if *success {
                next.set_death_save_successes(next.death_save_successes() as i64 + 1);
            } else {
                next.set_death_save_failures(next.death_save_failures() as i64 + 1);
            }
            changes.push(death_saves(&next));
        }
        ResourceOperation::AddCondition { tag } => {
            next.conditions.push(tag.clone());
            changes.push(Change::Conditions {
                conditions: next.conditions.clone(),
            });
        }
        ResourceOperation::RemoveCondition { tag } => {
            if let Some(pos) = next.conditions.iter().position(|c| c == tag) {
                next.conditions.remove(pos);
            }
            changes.push(Change::Conditions {
                conditions: next.conditions.clone(),
            });
        }
        ResourceOperation::SetConcentration { spell } => {
            next.concentrating_on = spell.clone();
            changes.push(Change::Concentration {
                spell: spell.clone(),
            });
        }
        ResourceOperation::Update(update) => {
            changes.extend(apply_update(&mut next, update)?);
        }
    }

    debug!(?operation, changes = changes.len(), "Applied resource operation");
    Ok(OperationOutcome {
        ledger: next,
        changes,
    })
}

/// A die type missing from the ledger behaves as an empty pool: nothing to
/// spend, nothing to recover, and no pool is created.
fn hit_dice(ledger: &mut ResourceLedger, die_type: DieType, action: PoolAction) -> Change {
    let (used_before, used_after, max) = match ledger.hit_dice_pools.get_mut(&die_type) {
        Some(pool) => {
            let (before, after) = act_on(pool, action);
            (before, after, pool.max())
        }
        None => (0, 0, 0),
    };
    Change::HitDice {
        die_type,
        used_before,
        used_after,
        max,
    }
}

fn spell_slots(ledger: &mut ResourceLedger, level: SpellLevel, action: PoolAction) -> Change {
    let (used_before, used_after, max) = match ledger.spell_slot_pools.get_mut(&level) {
        Some(pool) => {
            let (before, after) = act_on(pool, action);
            (before, after, pool.max())
        }
        None => (0, 0, 0),
    };
    Change::SpellSlots {
        level,
        used_before,
        used_after,
        max,
    }
}

fn pact_slots(ledger: &mut ResourceLedger, action: PoolAction) -> Change {
    let (used_before, used_after) = act_on(&mut ledger.pact_slots.pool, action);
    Change::PactSlots {
        used_before,
        used_after,
        max: ledger.pact_slots.pool.max(),
    }
}

fn feature(
    ledger: &mut ResourceLedger,
    key: &str,
    action: PoolAction,
) -> Result<Change, LedgerError> {
    let feature = ledger
        .limited_features
        .get_mut(key)
        .ok_or_else(|| LedgerError::UnknownFeature(key.to_string()))?;
    let (used_before, used_after) = act_on(&mut feature.uses, action);
    Ok(Change::Feature {
        key: key.to_string(),
        name: feature.name.clone(),
        used_before,
        used_after,
        max: feature.uses.max(),
    })
}

fn death_saves(ledger: &ResourceLedger) -> Change {
    Change::DeathSaves {
        successes: ledger.death_save_successes(),
        failures: ledger.death_save_failures(),
    }
}

fn apply_update(
    ledger: &mut ResourceLedger,
    update: &LedgerUpdate,
) -> Result<Vec<Change>, LedgerError> {
    let new_hp = match (update.current_hp, update.max_hp) {
        (Some(hp), Some(max_hp)) => {
            Some(hp.min(max_hp).clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        }
        (Some(_), None) => return Err(LedgerError::MissingMaxHp),
        (None, _) => None,
    };

    let mut changes = Vec::new();

    if let Some(hp) = new_hp {
        let before = ledger.current_hp;
        ledger.current_hp = hp;
        changes.push(Change::Hp { before, after: hp });
    }
    if let Some(temp) = update.temp_hp {
        let before = ledger.temp_hp();
        ledger.set_temp_hp(temp);
        changes.push(Change::TempHp {
            before,
            after: ledger.temp_hp(),
        });
    }
    if update.death_save_successes.is_some() || update.death_save_failures.is_some() {
        if let Some(successes) = update.death_save_successes {
            ledger.set_death_save_successes(successes);
        }
        if let Some(failures) = update.death_save_failures {
            ledger.set_death_save_failures(failures);
        }
        changes.push(death_saves(ledger));
    }
    if let Some(level) = update.exhaustion_level {
        let before = ledger.exhaustion_level();
        ledger.set_exhaustion_level(level);
        changes.push(Change::Exhaustion {
            before,
            after: ledger.exhaustion_level(),
        });
    }
    if let Some(spell) = &update.concentrating_on {
        ledger.concentrating_on = spell.clone();
        changes.push(Change::Concentration {
            spell: spell.clone(),
        });
    }
    if let Some(conditions) = &update.conditions {
        ledger.conditions = conditions.clone();
        changes.push(Change::Conditions {
            conditions: conditions.clone(),
        });
    }

    Ok(changes)
}
