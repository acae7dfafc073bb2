//! # Account Escrows
//!
//! The caller's escrow history across all contracts, with each leg's
//! current ledger state, split by the direction funds flow.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use courier_engine::{AccountEscrow, EscrowDirection};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowEntry {
    pub contract_id: Uuid,
    /// `base`, `tier1`, `tier2` or `collateral`.
    pub leg: String,
    pub counterparty: String,
    pub amount: i64,
    pub owner: String,
    pub sequence: u32,
    /// `open`, `finished`, `cancelled` or `unknown`.
    pub state: String,
}

impl From<AccountEscrow> for EscrowEntry {
    fn from(e: AccountEscrow) -> Self {
        Self {
            contract_id: *e.contract_id.as_uuid(),
            leg: e.leg.as_str().to_owned(),
            counterparty: e.counterparty.as_str().to_owned(),
            amount: e.amount.as_i64(),
            owner: e.owner,
            sequence: e.sequence,
            state: e.state.as_str().to_owned(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct EscrowListResponse {
    /// Legs funded by the caller.
    pub sent: Vec<EscrowEntry>,
    /// Legs payable to the caller.
    pub received: Vec<EscrowEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/me/escrows", get(list_escrows))
}

/// GET /v1/me/escrows: Escrow legs the caller sent or received.
#[utoipa::path(
    get,
    path = "/v1/me/escrows",
    responses(
        (status = 200, description = "Escrow history", body = EscrowListResponse),
        (status = 401, description = "No principal", body = crate::error::ErrorBody),
        (status = 502, description = "Ledger unavailable", body = crate::error::ErrorBody),
    ),
    tag = "escrows"
)]
pub async fn list_escrows(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<EscrowListResponse>, AppError> {
    let escrows = state.market.list_escrows(&caller.user_id).await?;

    let mut response = EscrowListResponse::default();
    for escrow in escrows {
        match escrow.direction {
            EscrowDirection::Sent => response.sent.push(escrow.into()),
            EscrowDirection::Received => response.received.push(escrow.into()),
        }
    }
    Ok(Json(response))
}
