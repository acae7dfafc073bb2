//! # courier-ledger: Escrow Ledger Port
//!
//! The boundary between the contract engine and a ledger that supports
//! time-locked conditional payments (XRPL escrows).
//!
//! ## Escrow protocol
//!
//! | Call | Effect |
//! |------|--------|
//! | `create` | One escrow per amount, each locked by a fresh PREIMAGE-SHA-256 condition |
//! | `finish` | Release the first `count` escrows to their destinations |
//! | `cancel` | Return one escrow to its source |
//! | `status` | Ledger-side state of one escrow, used to make retries idempotent |
//! | `balance` | Spendable balance of an account, in drops |
//!
//! Every escrow becomes claimable [`CLAIM_DELAY_SECS`] after creation.
//! Standard (payout) escrows expire at the contract deadline; collateral
//! escrows expire [`COLLATERAL_CANCEL_SECS`] after creation.
//!
//! ## Adapters
//!
//! - [`InMemoryLedger`]: full protocol semantics in process memory, with
//!   fault injection. Used for development and tests.
//! - [`GatewayLedger`]: HTTP client for an XRPL escrow gateway.
//!
//! Failures are always surfaced; no adapter swallows an error.

pub mod condition;
pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub(crate) mod retry;

pub use config::LedgerConfig;
pub use error::LedgerError;
pub use gateway::GatewayLedger;
pub use memory::{InMemoryLedger, OPENING_BALANCE_DROPS};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use courier_core::{Amount, EscrowHandle, EscrowKind, Timestamp, Wallet};

/// Seconds after creation before an escrow may be finished.
pub const CLAIM_DELAY_SECS: i64 = 10;

/// Seconds after creation before a collateral escrow may be cancelled.
pub const COLLATERAL_CANCEL_SECS: i64 = 15;

/// Ledger-side state of one escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowState {
    /// Funds held; may be finished or cancelled.
    Open,
    /// Released to the destination.
    Finished,
    /// Returned to the source.
    Cancelled,
    /// The ledger has no record of this escrow.
    #[serde(other)]
    Unknown,
}

impl EscrowState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

/// Ledger operation, for errors and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOp {
    Create,
    Finish,
    Cancel,
    Status,
    Balance,
}

impl LedgerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Finish => "finish",
            Self::Cancel => "cancel",
            Self::Status => "status",
            Self::Balance => "balance",
        }
    }
}

impl std::fmt::Display for LedgerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim and expiry times for a new escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowWindow {
    pub finish_after: Timestamp,
    pub cancel_after: Timestamp,
}

impl EscrowWindow {
    /// Window for an escrow created at `now`. `deadline` applies to
    /// standard escrows only.
    pub fn for_kind(kind: EscrowKind, deadline: Timestamp, now: Timestamp) -> Result<Self, LedgerError> {
        let finish_after = now.plus_secs(CLAIM_DELAY_SECS);
        let cancel_after = match kind {
            EscrowKind::Standard => deadline,
            EscrowKind::Collateral => now.plus_secs(COLLATERAL_CANCEL_SECS),
        };
        if cancel_after <= finish_after {
            return Err(LedgerError::EmptyWindow {
                finish_after,
                cancel_after,
            });
        }
        Ok(Self {
            finish_after,
            cancel_after,
        })
    }
}

/// Abstract escrow ledger.
///
/// Implementations must be safe to share across request handlers.
#[async_trait]
pub trait EscrowLedgerPort: Send + Sync {
    /// Create one escrow per amount from `source` to `destination`.
    ///
    /// Returns handles in the same order as `amounts`. If a later leg
    /// fails after earlier legs were created, the error is
    /// [`LedgerError::PartialCreate`] carrying the created handles.
    async fn create(
        &self,
        source: &Wallet,
        destination: &str,
        amounts: &[Amount],
        kind: EscrowKind,
        deadline: Timestamp,
    ) -> Result<Vec<EscrowHandle>, LedgerError>;

    /// Finish the first `count` of `handles`, in order.
    async fn finish(
        &self,
        submitter: &Wallet,
        handles: &[EscrowHandle],
        count: usize,
    ) -> Result<(), LedgerError>;

    /// Cancel one escrow back to its source.
    async fn cancel(&self, submitter: &Wallet, handle: &EscrowHandle) -> Result<(), LedgerError>;

    /// Current ledger-side state of an escrow.
    async fn status(&self, handle: &EscrowHandle) -> Result<EscrowState, LedgerError>;

    /// Balance of `address` at the last validated ledger, in drops.
    async fn balance(&self, address: &str) -> Result<u64, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Timestamp {
        Timestamp::parse("2026-05-01T00:00:00Z").unwrap()
    }

    #[test]
    fn standard_window_uses_deadline() {
        let deadline = t0().plus_secs(3600);
        let w = EscrowWindow::for_kind(EscrowKind::Standard, deadline, t0()).unwrap();
        assert_eq!(w.finish_after, t0().plus_secs(10));
        assert_eq!(w.cancel_after, deadline);
    }

    #[test]
    fn collateral_window_ignores_deadline() {
        let w = EscrowWindow::for_kind(EscrowKind::Collateral, t0().plus_secs(3600), t0()).unwrap();
        assert_eq!(w.cancel_after, t0().plus_secs(15));
    }

    #[test]
    fn deadline_inside_claim_delay_is_rejected() {
        let err = EscrowWindow::for_kind(EscrowKind::Standard, t0().plus_secs(5), t0()).unwrap_err();
        assert!(matches!(err, LedgerError::EmptyWindow { .. }));
    }

    #[test]
    fn unknown_state_is_the_serde_fallback() {
        let s: EscrowState = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(s, EscrowState::Unknown);
        let s: EscrowState = serde_json::from_str("\"finished\"").unwrap();
        assert_eq!(s, EscrowState::Finished);
    }
}
