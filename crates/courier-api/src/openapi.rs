//! # OpenAPI Document Assembly
//!
//! Assembles the utoipa-documented routes into a single OpenAPI 3.1
//! document served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier Marketplace API",
        version = "0.1.0",
        description = "Delivery contracts between proposers and couriers, settled through ledger escrows according to sensor telemetry."
    ),
    paths(
        crate::routes::users::register_user,
        crate::routes::users::get_account,
        crate::routes::sensors::register_sensor,
        crate::routes::sensors::record_reading,
        crate::routes::contracts::list_open_contracts,
        crate::routes::contracts::list_my_contracts,
        crate::routes::contracts::propose_contract,
        crate::routes::contracts::get_contract,
        crate::routes::contracts::update_contract,
        crate::routes::contracts::delete_contract,
        crate::routes::contracts::accept_contract,
        crate::routes::contracts::report_completion,
        crate::routes::escrows::list_escrows,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::users::RegisterUserRequest,
        crate::routes::users::UserResponse,
        crate::routes::users::AccountResponse,
        crate::routes::sensors::RegisterSensorRequest,
        crate::routes::sensors::SensorResponse,
        crate::routes::sensors::ReadingRequest,
        crate::routes::sensors::TelemetryResponse,
        crate::routes::contracts::ContractTermsRequest,
        crate::routes::contracts::AcceptRequest,
        crate::routes::contracts::ContractResponse,
        crate::routes::contracts::EscrowLegResponse,
        crate::routes::contracts::CompletionResponse,
        crate::routes::escrows::EscrowEntry,
        crate::routes::escrows::EscrowListResponse,
    )),
    tags(
        (name = "users", description = "User registration and account balance"),
        (name = "sensors", description = "Sensors and telemetry"),
        (name = "contracts", description = "Contract lifecycle"),
        (name = "escrows", description = "Escrow history"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
