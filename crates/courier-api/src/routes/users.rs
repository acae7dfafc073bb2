//! # Users
//!
//! Registers a marketplace user with the ledger wallet that funds and
//! receives their escrows, and shows the caller their own wallet balance.
//! The wallet is supplied by the caller.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use courier_core::{UserId, Wallet};
use courier_engine::AccountView;
use courier_state::User;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterUserRequest {
    pub user_id: String,
    /// Ledger account address.
    pub wallet_address: String,
    /// Ledger signing secret. Stored, never returned.
    pub wallet_secret: String,
}

impl Validate for RegisterUserRequest {
    fn validate(&self) -> Result<(), String> {
        if self.wallet_address.trim().is_empty() {
            return Err("wallet_address must not be empty".to_string());
        }
        if self.wallet_address.len() > 128 {
            return Err("wallet_address must not exceed 128 characters".to_string());
        }
        if self.wallet_secret.is_empty() {
            return Err("wallet_secret must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub user_id: String,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id.as_str().to_owned(),
            wallet_address: user.wallet.address.clone(),
            created_at: *user.created_at.as_datetime(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub user_id: String,
    pub wallet_address: String,
    /// Validated ledger balance in drops (1 XRP = 1,000,000 drops).
    pub balance_drops: u64,
}

impl From<AccountView> for AccountResponse {
    fn from(v: AccountView) -> Self {
        Self {
            user_id: v.user_id.as_str().to_owned(),
            wallet_address: v.wallet_address,
            balance_drops: v.balance_drops,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(register_user))
        .route("/v1/me", get(get_account))
}

/// POST /v1/users: Register a user and their wallet.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 409, description = "User id taken", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid input", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    body: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let user_id = UserId::new(req.user_id)?;
    let wallet = Wallet::new(req.wallet_address, req.wallet_secret);

    let user = state.market.register_user(user_id, wallet).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /v1/me: The caller's wallet and its ledger balance.
#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Caller's account", body = AccountResponse),
        (status = 401, description = "No principal", body = crate::error::ErrorBody),
        (status = 404, description = "Caller is not registered", body = crate::error::ErrorBody),
        (status = 502, description = "Ledger unavailable", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
pub async fn get_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state.market.account(&caller.user_id).await?;
    Ok(Json(account.into()))
}
