//! # Escrow Handles
//!
//! An [`EscrowHandle`] is everything needed to later finish or cancel one
//! conditional, time-locked payment on the ledger: the owning account, the
//! sequence number of the creating transaction, and the crypto-condition
//! pair that locks it.
//!
//! The fulfillment is the unlock secret. Its `Debug` output is redacted;
//! read models decide separately whether a caller may see it.

use serde::{Deserialize, Serialize};

/// Whether a leg is a standard payout escrow or a courier collateral
/// escrow. The two kinds use different cancel windows on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowKind {
    /// Payout leg; cancellable once the contract deadline passes.
    Standard,
    /// Collateral leg; cancellable shortly after creation.
    Collateral,
}

/// Reference to one escrow on the ledger.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowHandle {
    /// Ledger address of the account that created (and funds) the escrow.
    pub owner: String,
    /// Sequence number of the creating transaction.
    pub sequence: u32,
    /// Uppercase hex of the binary crypto-condition.
    pub condition: String,
    /// Uppercase hex of the binary fulfillment (the unlock secret).
    pub fulfillment: String,
}

impl std::fmt::Debug for EscrowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscrowHandle")
            .field("owner", &self.owner)
            .field("sequence", &self.sequence)
            .field("condition", &self.condition)
            .field("fulfillment", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Display for EscrowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "escrow:{}/{}", self.owner, self.sequence)
    }
}
