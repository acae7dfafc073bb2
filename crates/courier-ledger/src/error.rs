//! Ledger error types.

use courier_core::{EscrowHandle, Timestamp};

use crate::config::ConfigError;
use crate::LedgerOp;

/// Errors surfaced by an [`EscrowLedgerPort`](crate::EscrowLedgerPort).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// HTTP transport failure after retries.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Gateway answered with a non-2xx status.
    #[error("ledger gateway {endpoint} returned {status}: {body}")]
    Gateway {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Gateway response did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The ledger refused or could not process the operation.
    #[error("ledger {op} unavailable: {reason}")]
    Unavailable { op: LedgerOp, reason: String },

    /// Escrow was already finished or cancelled.
    #[error("{escrow} was already consumed")]
    AlreadyConsumed { escrow: String },

    /// No such escrow on the ledger.
    #[error("{escrow} does not exist")]
    UnknownEscrow { escrow: String },

    /// Fulfillment does not match the escrow's condition.
    #[error("fulfillment does not unlock {escrow}")]
    InvalidFulfillment { escrow: String },

    /// Source account cannot fund the escrow.
    #[error("{account} holds {available} drops, escrow needs {needed}")]
    InsufficientFunds {
        account: String,
        needed: u64,
        available: u64,
    },

    /// Amount does not fit the ledger's drop representation.
    #[error("amount of {units} units overflows ledger drops")]
    AmountOverflow { units: u64 },

    /// The cancel window would close before the claim window opens.
    #[error("escrow window is empty: finish_after {finish_after} >= cancel_after {cancel_after}")]
    EmptyWindow {
        finish_after: Timestamp,
        cancel_after: Timestamp,
    },

    /// A multi-leg create failed after some legs were already on the ledger.
    #[error("escrow create failed after {} leg(s) were created: {source}", created.len())]
    PartialCreate {
        created: Vec<EscrowHandle>,
        source: Box<LedgerError>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LedgerError {
    /// Handles already committed on the ledger when this error occurred.
    pub fn orphaned_handles(&self) -> &[EscrowHandle] {
        match self {
            Self::PartialCreate { created, .. } => created,
            _ => &[],
        }
    }
}
