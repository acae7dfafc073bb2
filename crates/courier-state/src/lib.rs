//! # courier-state: Contract Lifecycle and Payout Rules
//!
//! Pure domain logic with no I/O: the contract state machine, the escrow
//! leg bundle a contract carries once accepted, the payout policy that maps
//! sensor telemetry to a payout tier, and the telemetry accumulator itself.
//!
//! ## Design
//!
//! - **Closed status enum.** [`ContractStatus`] has an exhaustive
//!   transition table. Every `match` on it must handle all four variants.
//! - **All-or-nothing award.** Courier, sensor binding, award time and
//!   escrow handles live in one [`Award`] value, so a contract either has
//!   all of them or none.
//! - **Deterministic payout.** [`PayoutPolicy`] is a pure step function of
//!   the drop-alert count.
//!
//! ## Crate Policy
//!
//! - Depends only on `courier-core`.
//! - No `.unwrap()` outside tests.
//! - Callers pass `now` explicitly; nothing here reads the clock.

pub mod contract;
pub mod escrow;
pub mod payout;
pub mod registry;
pub mod status;
pub mod telemetry;

pub use contract::{Award, Contract, ContractError, ContractTerms, PartyRole};
pub use escrow::{EscrowLegs, LegName};
pub use payout::{CollateralDisposition, PayoutDecision, PayoutPolicy, PayoutTier};
pub use registry::{Sensor, User};
pub use status::ContractStatus;
pub use telemetry::{Position, Reading, SensorTelemetry};
