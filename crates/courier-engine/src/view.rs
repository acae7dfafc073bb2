//! # Contract Read Model
//!
//! One projection of a [`Contract`] for every caller. Public fields are
//! visible to everyone; the sensor binding and escrow handles only to the
//! proposer and courier. Fulfillments are never projected: either party
//! holding one could settle a leg without the other.

use serde::Serialize;

use courier_core::{Amount, ContractId, SensorId, Timestamp, UserId};
use courier_ledger::EscrowState;
use courier_state::{Contract, ContractStatus, LegName, PartyRole};

/// Escrow leg as shown to a contract party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscrowLegView {
    pub leg: LegName,
    pub owner: String,
    pub sequence: u32,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractView {
    pub id: ContractId,
    pub proposer_id: UserId,
    pub courier_id: Option<UserId>,
    pub status: ContractStatus,
    pub title: String,
    pub description: String,
    pub timeout: Timestamp,
    pub required_collateral: Amount,
    pub base_price: Amount,
    pub tier1_bonus: Amount,
    pub tier2_bonus: Amount,
    pub award_time: Option<Timestamp>,
    pub completion_time: Option<Timestamp>,
    pub confirm_completion_time: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// The caller's role, if any.
    pub viewer_role: Option<PartyRole>,
    /// Parties only.
    pub sensor_id: Option<SensorId>,
    /// Parties only.
    pub escrow: Option<Vec<EscrowLegView>>,
}

impl ContractView {
    pub fn project(contract: &Contract, viewer: Option<&UserId>) -> Self {
        let viewer_role = viewer.and_then(|v| contract.role_of(v));
        let is_party = viewer_role.is_some();
        let terms = &contract.terms;

        Self {
            id: contract.id,
            proposer_id: contract.proposer_id.clone(),
            courier_id: contract.courier_id().cloned(),
            status: contract.status,
            title: terms.title.clone(),
            description: terms.description.clone(),
            timeout: terms.timeout,
            required_collateral: terms.required_collateral,
            base_price: terms.base_price,
            tier1_bonus: terms.tier1_bonus,
            tier2_bonus: terms.tier2_bonus,
            award_time: contract.award.as_ref().map(|a| a.award_time),
            completion_time: contract.completion_time,
            confirm_completion_time: contract.confirm_completion_time,
            created_at: contract.created_at,
            updated_at: contract.updated_at,
            viewer_role,
            sensor_id: contract.sensor_id().filter(|_| is_party).cloned(),
            escrow: contract.escrow().filter(|_| is_party).map(|legs| {
                legs.all()
                    .iter()
                    .map(|(leg, h)| EscrowLegView {
                        leg: *leg,
                        owner: h.owner.clone(),
                        sequence: h.sequence,
                        condition: h.condition.clone(),
                    })
                    .collect()
            }),
        }
    }
}

/// Which way funds in an escrow flow relative to the account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowDirection {
    Sent,
    Received,
}

/// One escrow leg in a user's account history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountEscrow {
    pub contract_id: ContractId,
    pub leg: LegName,
    pub direction: EscrowDirection,
    pub counterparty: UserId,
    pub amount: Amount,
    pub owner: String,
    pub sequence: u32,
    pub state: EscrowState,
}

/// A user's wallet as seen by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub user_id: UserId,
    pub wallet_address: String,
    /// Validated ledger balance.
    pub balance_drops: u64,
}

/// Result of a completion report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub status: ContractStatus,
    pub message: String,
}
