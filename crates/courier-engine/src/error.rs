//! # Engine Errors
//!
//! The caller-facing error taxonomy. Every variant is recoverable by the
//! caller; [`EngineError::code`] gives the stable machine-readable reason
//! the HTTP layer returns.

use thiserror::Error;

use courier_core::ValidationError;
use courier_ledger::LedgerError;
use courier_state::ContractError;

use crate::repository::RepositoryError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Sensor is not owned by the caller.
    #[error("sensor {0} is not owned by the caller")]
    NotOwned(String),

    /// Sensor is already bound to an active contract.
    #[error("sensor {0} is bound to another active contract")]
    SensorBusy(String),

    #[error("courier already reported completion")]
    AlreadyReported,

    #[error("courier has not reported completion yet")]
    CourierHasNotReported,

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Lost a race with a concurrent write; the caller may retry.
    #[error("conflicting write: {0}")]
    ConflictingWrite(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotOwned(_) => "NOT_OWNED",
            Self::SensorBusy(_) => "SENSOR_BUSY",
            Self::AlreadyReported => "ALREADY_REPORTED",
            Self::CourierHasNotReported => "COURIER_HAS_NOT_REPORTED",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
            Self::ConflictingWrite(_) => "CONFLICTING_WRITE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation { .. } | RepositoryError::SerializationFailure => {
                Self::ConflictingWrite(err.to_string())
            }
            RepositoryError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::EmptyWindow { .. } | LedgerError::InsufficientFunds { .. } => {
                Self::PreconditionFailed(err.to_string())
            }
            LedgerError::AmountOverflow { .. } => Self::InvalidInput(err.to_string()),
            other => Self::LedgerUnavailable(other.to_string()),
        }
    }
}

/// Status-dependent contract errors surface as `NotFound`: an operation on
/// a contract outside its required status behaves as if the contract did
/// not exist.
impl From<ContractError> for EngineError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::WrongStatus { contract_id, .. } => {
                Self::NotFound(format!("{contract_id} is not available for this operation"))
            }
            ContractError::InvalidTransition { .. } => Self::NotFound(err.to_string()),
            ContractError::AlreadyReported { .. } => Self::AlreadyReported,
            ContractError::CourierHasNotReported { .. } => Self::CourierHasNotReported,
            ContractError::Invalid(v) => Self::InvalidInput(v.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ContractId;
    use courier_ledger::LedgerOp;
    use courier_state::ContractStatus;

    #[test]
    fn unique_violation_is_conflicting_write() {
        let err: EngineError = RepositoryError::UniqueViolation {
            constraint: "x".into(),
        }
        .into();
        assert_eq!(err.code(), "CONFLICTING_WRITE");
    }

    #[test]
    fn wrong_status_is_not_found() {
        let err: EngineError = ContractError::WrongStatus {
            contract_id: ContractId::new(),
            expected: ContractStatus::Open,
            actual: ContractStatus::Fulfillment,
        }
        .into();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn ledger_failures_are_unavailable() {
        let err: EngineError = LedgerError::Unavailable {
            op: LedgerOp::Finish,
            reason: "down".into(),
        }
        .into();
        assert_eq!(err.code(), "LEDGER_UNAVAILABLE");
    }

    #[test]
    fn codes_are_distinct() {
        let all = [
            EngineError::InvalidInput(String::new()),
            EngineError::Unauthenticated,
            EngineError::Forbidden(String::new()),
            EngineError::NotFound(String::new()),
            EngineError::NotOwned(String::new()),
            EngineError::SensorBusy(String::new()),
            EngineError::AlreadyReported,
            EngineError::CourierHasNotReported,
            EngineError::PreconditionFailed(String::new()),
            EngineError::LedgerUnavailable(String::new()),
            EngineError::ConflictingWrite(String::new()),
            EngineError::Internal(String::new()),
        ];
        let mut codes: Vec<_> = all.iter().map(EngineError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
