//! # Delivery Contract
//!
//! The contract aggregate and every transition it can make. Methods check
//! the current status and the completion attestations, then mutate in
//! place; persistence and ledger effects belong to the caller.
//!
//! ## Completion protocol
//!
//! Completion takes two attestations in a fixed order. The courier reports
//! first (`completion_time`), then the proposer confirms
//! (`confirm_completion_time`), which moves the contract to COMPLETED.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use courier_core::{Amount, ContractId, SensorId, Timestamp, UserId, ValidationError};

use crate::escrow::EscrowLegs;
use crate::status::ContractStatus;

/// Upper bound on title length, in characters.
pub const MAX_TITLE_LEN: usize = 200;
/// Upper bound on description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 4000;

// ─── Errors ──────────────────────────────────────────────────────────

/// Rejected contract operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// Transition not in the status table.
    #[error("invalid contract transition: {from} -> {to}")]
    InvalidTransition {
        from: ContractStatus,
        to: ContractStatus,
    },

    /// Operation requires a different current status.
    #[error("{contract_id} is {actual}, operation requires {expected}")]
    WrongStatus {
        contract_id: ContractId,
        expected: ContractStatus,
        actual: ContractStatus,
    },

    /// Courier already attested completion.
    #[error("courier already reported completion of {contract_id}")]
    AlreadyReported { contract_id: ContractId },

    /// Proposer tried to confirm before the courier reported.
    #[error("courier has not reported completion of {contract_id}")]
    CourierHasNotReported { contract_id: ContractId },

    /// Terms failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ─── Terms ───────────────────────────────────────────────────────────

/// Proposer-editable terms of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub title: String,
    pub description: String,
    /// Delivery deadline; also the expiry of the payout escrows.
    pub timeout: Timestamp,
    pub required_collateral: Amount,
    pub base_price: Amount,
    pub tier1_bonus: Amount,
    pub tier2_bonus: Amount,
}

impl ContractTerms {
    pub fn validate(&self, now: Timestamp) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::field("title", "must not be blank"));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationError::field(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::field(
                "description",
                format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
            ));
        }
        if self.timeout <= now {
            return Err(ValidationError::field(
                "timeout",
                format!("must be in the future (got {}, now {})", self.timeout, now),
            ));
        }
        Ok(())
    }

    /// Payout leg amounts in release order.
    pub fn payout_amounts(&self) -> [Amount; 3] {
        [self.base_price, self.tier1_bonus, self.tier2_bonus]
    }
}

// ─── Award ───────────────────────────────────────────────────────────

/// Everything set when a courier accepts. Present iff the contract has
/// left OPEN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub courier_id: UserId,
    pub sensor_id: SensorId,
    pub award_time: Timestamp,
    pub escrow: EscrowLegs,
}

/// A caller's relationship to a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Proposer,
    Courier,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposer => "proposer",
            Self::Courier => "courier",
        }
    }
}

// ─── Contract ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub proposer_id: UserId,
    pub status: ContractStatus,
    pub terms: ContractTerms,
    pub award: Option<Award>,
    /// Courier's completion attestation.
    pub completion_time: Option<Timestamp>,
    /// Proposer's confirmation; set together with COMPLETED.
    pub confirm_completion_time: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Contract {
    /// Create an OPEN contract.
    pub fn propose(
        proposer_id: UserId,
        terms: ContractTerms,
        now: Timestamp,
    ) -> Result<Self, ContractError> {
        terms.validate(now)?;
        Ok(Self {
            id: ContractId::new(),
            proposer_id,
            status: ContractStatus::Open,
            terms,
            award: None,
            completion_time: None,
            confirm_completion_time: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the terms wholesale (OPEN only).
    pub fn revise(&mut self, terms: ContractTerms, now: Timestamp) -> Result<(), ContractError> {
        self.require_status(ContractStatus::Open)?;
        terms.validate(now)?;
        self.terms = terms;
        self.updated_at = now;
        Ok(())
    }

    /// Bind a courier, sensor and escrow legs (OPEN → FULFILLMENT).
    pub fn award(&mut self, award: Award, now: Timestamp) -> Result<(), ContractError> {
        self.require_status(ContractStatus::Open)?;
        self.transition(ContractStatus::Fulfillment, now)?;
        self.award = Some(award);
        Ok(())
    }

    /// Courier's completion attestation. Status stays FULFILLMENT.
    pub fn record_courier_report(&mut self, now: Timestamp) -> Result<(), ContractError> {
        self.require_status(ContractStatus::Fulfillment)?;
        if self.completion_time.is_some() {
            return Err(ContractError::AlreadyReported {
                contract_id: self.id,
            });
        }
        self.completion_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Proposer's confirmation (FULFILLMENT → COMPLETED).
    pub fn confirm_completion(&mut self, now: Timestamp) -> Result<(), ContractError> {
        self.require_status(ContractStatus::Fulfillment)?;
        if self.completion_time.is_none() {
            return Err(ContractError::CourierHasNotReported {
                contract_id: self.id,
            });
        }
        self.transition(ContractStatus::Completed, now)?;
        self.confirm_completion_time = Some(now);
        Ok(())
    }

    /// Move along the status table. Exposed for lifecycle extensions such
    /// as a FAILED sweep; the built-in operations use the methods above.
    pub fn transition(&mut self, to: ContractStatus, now: Timestamp) -> Result<(), ContractError> {
        if !self.status.can_transition_to(to) {
            return Err(ContractError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn role_of(&self, user: &UserId) -> Option<PartyRole> {
        if &self.proposer_id == user {
            Some(PartyRole::Proposer)
        } else if self.courier_id() == Some(user) {
            Some(PartyRole::Courier)
        } else {
            None
        }
    }

    pub fn courier_id(&self) -> Option<&UserId> {
        self.award.as_ref().map(|a| &a.courier_id)
    }

    pub fn sensor_id(&self) -> Option<&SensorId> {
        self.award.as_ref().map(|a| &a.sensor_id)
    }

    pub fn escrow(&self) -> Option<&EscrowLegs> {
        self.award.as_ref().map(|a| &a.escrow)
    }

    fn require_status(&self, expected: ContractStatus) -> Result<(), ContractError> {
        if self.status != expected {
            return Err(ContractError::WrongStatus {
                contract_id: self.id,
                expected,
                actual: self.status,
            });
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
