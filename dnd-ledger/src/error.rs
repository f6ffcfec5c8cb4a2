//! Validation errors raised by ledger operations.
//!
//! Out-of-range quantities are not errors: pools clamp. These variants cover
//! input that cannot be clamped into meaning.

use crate::dice::DiceError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Amount must be non-negative, got {0}")]
    NegativeAmount(i64),

    #[error("Amount must be a whole number, got {0}")]
    NonNumericAmount(String),

    #[error("Unknown limited feature: {0}")]
    UnknownFeature(String),

    #[error("Spell slot level must be between 1 and 9, got {0}")]
    InvalidSpellLevel(i64),

    #[error("Invalid hit die: {0}")]
    InvalidDieType(#[from] DiceError),

    #[error("Setting current HP requires the character's maximum HP")]
    MissingMaxHp,

    #[error("Malformed operation: {0}")]
    MalformedOperation(String),
}
