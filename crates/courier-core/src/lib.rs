//! # courier-core: Foundational Types for the Courier Marketplace
//!
//! Every other crate in the workspace depends on `courier-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `ContractId`, `UserId` and
//!    `SensorId` are distinct types with validated constructors, so a sensor
//!    id can never be passed where a user id is expected.
//!
//! 2. **Non-negative amounts.** `Amount` rejects negative values at
//!    construction and converts to ledger drops with checked arithmetic.
//!
//! 3. **UTC-only timestamps** truncated to seconds precision.
//!
//! 4. **Ledger-neutral escrow handles.** `EscrowHandle` is the only record
//!    the rest of the system keeps of an on-ledger escrow.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `courier-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod escrow;
pub mod identity;
pub mod money;
pub mod temporal;
pub mod wallet;

pub use error::ValidationError;
pub use escrow::{EscrowHandle, EscrowKind};
pub use identity::{ContractId, SensorId, UserId};
pub use money::Amount;
pub use temporal::Timestamp;
pub use wallet::Wallet;
