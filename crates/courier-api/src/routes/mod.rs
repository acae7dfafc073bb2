//! # API Route Modules
//!
//! - `users`: user registration with a ledger wallet, and the caller's balance.
//! - `sensors`: sensor registration and device reading ingestion.
//! - `contracts`: contract lifecycle.
//! - `escrows`: the caller's escrow history.

pub mod contracts;
pub mod escrows;
pub mod sensors;
pub mod users;
