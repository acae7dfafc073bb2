//! # courier-engine: Contract Lifecycle Engine
//!
//! Ties the pure contract model in `courier-state` to storage and to the
//! escrow ledger. Every marketplace operation lives on [`Marketplace`],
//! implemented by [`ContractEngine`].
//!
//! ## Design
//!
//! - **One transaction per operation.** Reads, checks and writes go through
//!   a single [`RepositoryTx`]. Dropping it rolls back.
//! - **Storage enforces sensor exclusivity.** The engine checks for a busy
//!   sensor up front, but the final word is the backend's unique constraint.
//!   A lost race surfaces as [`EngineError::ConflictingWrite`].
//! - **Idempotent settlement.** Ledger state is consulted before every
//!   finish or cancel.
//!
//! ## Crate Policy
//!
//! - No `.unwrap()` outside tests.
//! - Metrics go through the `metrics` facade; the binary installs the
//!   exporter.

pub mod engine;
pub mod error;
pub mod memory;
pub mod repository;
pub mod view;

pub use engine::{ContractEngine, Marketplace};
pub use error::EngineError;
pub use memory::MemoryRepository;
pub use repository::{ContractRepository, RepositoryError, RepositoryTx, ACTIVE_SENSOR_CONSTRAINT};
pub use view::{AccountEscrow, AccountView, CompletionOutcome, ContractView, EscrowDirection, EscrowLegView};
