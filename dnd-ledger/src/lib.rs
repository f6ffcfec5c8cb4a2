//! D&D 5e character resource ledger and rest engine.
//!
//! This crate provides:
//! - A strongly typed ledger of every consumable counter on a character
//!   (hit dice, spell slots, pact slots, limited-use features, HP and status)
//! - Discrete resource operations that clamp instead of failing
//! - Short and long rest recovery with a report of what changed
//! - Ledger initialization from class levels and ability scores
//! - Versioned storage and a service that keeps concurrent updates serializable
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd_ledger::{
//!     CharacterBuild, CharacterClass, IncarnationId, LedgerService, MemoryLedgerStore,
//!     ResourceOperation,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = LedgerService::new(MemoryLedgerStore::new());
//!     let id = IncarnationId::new();
//!
//!     let build = CharacterBuild::single_class(CharacterClass::Barbarian, 3, 35);
//!     service.initialize(id, &build).await?;
//!
//!     let rage = ResourceOperation::from_json(json!({"op": "useFeature", "key": "rage"}))?;
//!     let outcome = service.apply(id, &rage).await?;
//!     println!("{:?}", outcome.changes);
//!     Ok(())
//! }
//! ```

pub mod character;
pub mod class_data;
pub mod dice;
pub mod error;
pub mod init;
pub mod ledger;
pub mod ops;
pub mod rest;
pub mod service;
pub mod store;
pub mod testing;

// Primary public API
pub use character::{Ability, AbilityScores, CasterType, CharacterClass, ClassLevel};
pub use dice::{DiceError, DieType};
pub use error::LedgerError;
pub use init::{initialize, needs_reinitialization, reinitialize, CharacterBuild};
pub use ledger::{
    IncarnationId, LimitedFeature, PactSlots, Pool, RechargeType, ResourceLedger, SpellLevel,
};
pub use ops::{apply, Amount, Change, LedgerUpdate, OperationOutcome, ResourceOperation};
pub use rest::{
    long_rest, short_rest, HitDieSpend, LongRestRequest, RestOutcome, RestReport, RestType,
    ShortRestRequest, SpellSlotsRestored,
};
pub use service::{LedgerService, ServiceConfig, ServiceError};
pub use store::{JsonFileLedgerStore, LedgerStore, MemoryLedgerStore, StoreError, VersionedLedger};
pub use testing::TestHarness;
