//! # Contract API
//!
//! Contract lifecycle: propose, list, read, revise, withdraw, accept and
//! report completion. Handlers only translate between JSON and domain
//! types; every rule is enforced by the marketplace engine.
//!
//! Reads take `Option<CallerIdentity>`: anonymous callers get the public
//! projection, parties additionally see the sensor binding and escrow
//! handles.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use courier_core::{Amount, ContractId, SensorId, Timestamp};
use courier_engine::{CompletionOutcome, ContractView, EscrowLegView};
use courier_state::ContractTerms;

use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ── Request DTOs ────────────────────────────────────────────────────────────

/// Terms for a new contract, or the full replacement terms of an update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ContractTermsRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Delivery deadline, RFC 3339.
    pub timeout: String,
    pub required_collateral: i64,
    pub base_price: i64,
    pub tier1_bonus: i64,
    pub tier2_bonus: i64,
}

impl Validate for ContractTermsRequest {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.timeout.trim().is_empty() {
            return Err("timeout must not be empty".to_string());
        }
        Ok(())
    }
}

impl ContractTermsRequest {
    fn into_terms(self) -> Result<ContractTerms, AppError> {
        Ok(ContractTerms {
            title: self.title,
            description: self.description,
            timeout: Timestamp::parse(&self.timeout)?,
            required_collateral: Amount::new("required_collateral", self.required_collateral)?,
            base_price: Amount::new("base_price", self.base_price)?,
            tier1_bonus: Amount::new("tier1_bonus", self.tier1_bonus)?,
            tier2_bonus: Amount::new("tier2_bonus", self.tier2_bonus)?,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptRequest {
    /// Sensor that will monitor the delivery. Must belong to the caller.
    pub sensor_id: String,
}

impl Validate for AcceptRequest {
    fn validate(&self) -> Result<(), String> {
        if self.sensor_id.trim().is_empty() {
            return Err("sensor_id must not be empty".to_string());
        }
        Ok(())
    }
}

// ── Response DTOs ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EscrowLegResponse {
    pub leg: String,
    pub owner: String,
    pub sequence: u32,
    pub condition: String,
}

impl From<EscrowLegView> for EscrowLegResponse {
    fn from(v: EscrowLegView) -> Self {
        Self {
            leg: v.leg.as_str().to_owned(),
            owner: v.owner,
            sequence: v.sequence,
            condition: v.condition,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContractResponse {
    pub id: Uuid,
    pub proposer_id: String,
    pub courier_id: Option<String>,
    /// OPEN, FULFILLMENT, COMPLETED or FAILED.
    pub status: String,
    pub title: String,
    pub description: String,
    pub timeout: DateTime<Utc>,
    pub required_collateral: i64,
    pub base_price: i64,
    pub tier1_bonus: i64,
    pub tier2_bonus: i64,
    pub award_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    pub confirm_completion_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `proposer` or `courier` when the caller is a party.
    pub viewer_role: Option<String>,
    /// Parties only.
    pub sensor_id: Option<String>,
    /// Parties only.
    pub escrow: Option<Vec<EscrowLegResponse>>,
}

impl From<ContractView> for ContractResponse {
    fn from(v: ContractView) -> Self {
        Self {
            id: *v.id.as_uuid(),
            proposer_id: v.proposer_id.as_str().to_owned(),
            courier_id: v.courier_id.map(|u| u.as_str().to_owned()),
            status: v.status.as_str().to_owned(),
            title: v.title,
            description: v.description,
            timeout: *v.timeout.as_datetime(),
            required_collateral: v.required_collateral.as_i64(),
            base_price: v.base_price.as_i64(),
            tier1_bonus: v.tier1_bonus.as_i64(),
            tier2_bonus: v.tier2_bonus.as_i64(),
            award_time: v.award_time.map(|t| *t.as_datetime()),
            completion_time: v.completion_time.map(|t| *t.as_datetime()),
            confirm_completion_time: v.confirm_completion_time.map(|t| *t.as_datetime()),
            created_at: *v.created_at.as_datetime(),
            updated_at: *v.updated_at.as_datetime(),
            viewer_role: v.viewer_role.map(|r| r.as_str().to_owned()),
            sensor_id: v.sensor_id.map(|s| s.as_str().to_owned()),
            escrow: v
                .escrow
                .map(|legs| legs.into_iter().map(EscrowLegResponse::from).collect()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    pub status: String,
    pub message: String,
}

impl From<CompletionOutcome> for CompletionResponse {
    fn from(o: CompletionOutcome) -> Self {
        Self {
            status: o.status.as_str().to_owned(),
            message: o.message,
        }
    }
}

fn responses(views: Vec<ContractView>) -> Json<Vec<ContractResponse>> {
    Json(views.into_iter().map(ContractResponse::from).collect())
}

// ── Router ──────────────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/contracts", post(propose_contract))
        .route("/v1/contracts/open", get(list_open_contracts))
        .route("/v1/contracts/mine", get(list_my_contracts))
        .route(
            "/v1/contracts/{id}",
            get(get_contract).put(update_contract).delete(delete_contract),
        )
        .route("/v1/contracts/{id}/accept", post(accept_contract))
        .route("/v1/contracts/{id}/completion", post(report_completion))
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// GET /v1/contracts/open: All OPEN contracts, oldest first.
#[utoipa::path(
    get,
    path = "/v1/contracts/open",
    responses(
        (status = 200, description = "Open contracts", body = Vec<ContractResponse>),
    ),
    tag = "contracts"
)]
pub async fn list_open_contracts(
    State(state): State<AppState>,
    caller: Option<CallerIdentity>,
) -> Result<Json<Vec<ContractResponse>>, AppError> {
    let viewer = caller.as_ref().map(|c| &c.user_id);
    Ok(responses(state.market.list_open(viewer).await?))
}

/// GET /v1/contracts/mine: Contracts the caller proposed or carries.
#[utoipa::path(
    get,
    path = "/v1/contracts/mine",
    responses(
        (status = 200, description = "Caller's contracts", body = Vec<ContractResponse>),
        (status = 401, description = "No principal", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn list_my_contracts(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Vec<ContractResponse>>, AppError> {
    Ok(responses(state.market.list_mine(&caller.user_id).await?))
}

/// POST /v1/contracts: Propose a contract.
#[utoipa::path(
    post,
    path = "/v1/contracts",
    request_body = ContractTermsRequest,
    responses(
        (status = 201, description = "Contract proposed", body = ContractResponse),
        (status = 401, description = "No principal", body = ErrorBody),
        (status = 422, description = "Invalid terms", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn propose_contract(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ContractTermsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContractResponse>), AppError> {
    let terms = extract_validated_json(body)?.into_terms()?;
    let view = state.market.propose(&caller.user_id, terms).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /v1/contracts/{id}: One contract, projected for the caller.
#[utoipa::path(
    get,
    path = "/v1/contracts/{id}",
    params(("id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Contract found", body = ContractResponse),
        (status = 404, description = "Contract not found", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn get_contract(
    State(state): State<AppState>,
    caller: Option<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractResponse>, AppError> {
    let viewer = caller.as_ref().map(|c| &c.user_id);
    let view = state.market.get(viewer, ContractId::from_uuid(id)).await?;
    Ok(Json(view.into()))
}

/// PUT /v1/contracts/{id}: Replace the terms of an OPEN contract.
#[utoipa::path(
    put,
    path = "/v1/contracts/{id}",
    params(("id" = Uuid, Path, description = "Contract ID")),
    request_body = ContractTermsRequest,
    responses(
        (status = 200, description = "Contract updated", body = ContractResponse),
        (status = 403, description = "Caller is not the proposer", body = ErrorBody),
        (status = 404, description = "No OPEN contract with this id", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn update_contract(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ContractTermsRequest>, JsonRejection>,
) -> Result<Json<ContractResponse>, AppError> {
    let terms = extract_validated_json(body)?.into_terms()?;
    let view = state
        .market
        .update(&caller.user_id, ContractId::from_uuid(id), terms)
        .await?;
    Ok(Json(view.into()))
}

/// DELETE /v1/contracts/{id}: Withdraw an OPEN contract.
#[utoipa::path(
    delete,
    path = "/v1/contracts/{id}",
    params(("id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 204, description = "Contract deleted"),
        (status = 403, description = "Caller is not the proposer", body = ErrorBody),
        (status = 404, description = "No OPEN contract with this id", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn delete_contract(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .market
        .delete(&caller.user_id, ContractId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/contracts/{id}/accept: Take on a contract with a sensor.
#[utoipa::path(
    post,
    path = "/v1/contracts/{id}/accept",
    params(("id" = Uuid, Path, description = "Contract ID")),
    request_body = AcceptRequest,
    responses(
        (status = 200, description = "Contract accepted, escrows locked", body = ContractResponse),
        (status = 403, description = "Sensor not owned, or own contract", body = ErrorBody),
        (status = 404, description = "No OPEN contract with this id", body = ErrorBody),
        (status = 409, description = "Sensor busy or concurrent accept", body = ErrorBody),
        (status = 502, description = "Ledger unavailable", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn accept_contract(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AcceptRequest>, JsonRejection>,
) -> Result<Json<ContractResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let sensor_id = SensorId::new(req.sensor_id)?;
    let view = state
        .market
        .accept(&caller.user_id, ContractId::from_uuid(id), sensor_id)
        .await?;
    Ok(Json(view.into()))
}

/// POST /v1/contracts/{id}/completion: Courier reports, proposer confirms.
#[utoipa::path(
    post,
    path = "/v1/contracts/{id}/completion",
    params(("id" = Uuid, Path, description = "Contract ID")),
    responses(
        (status = 200, description = "Completion recorded", body = CompletionResponse),
        (status = 403, description = "Caller is not a party", body = ErrorBody),
        (status = 404, description = "No contract in fulfillment with this id", body = ErrorBody),
        (status = 409, description = "Out-of-order report", body = ErrorBody),
        (status = 502, description = "Ledger unavailable", body = ErrorBody),
    ),
    tag = "contracts"
)]
pub async fn report_completion(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CompletionResponse>, AppError> {
    let outcome = state
        .market
        .report_completion(&caller.user_id, ContractId::from_uuid(id))
        .await?;
    Ok(Json(outcome.into()))
}
