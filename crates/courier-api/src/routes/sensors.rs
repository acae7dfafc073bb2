//! # Sensor API
//!
//! Sensor registration and device reading ingestion. Readings are accepted
//! without a principal, as devices report directly; the engine rejects a
//! reading unless the sensor is bound to a contract in fulfillment.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use courier_core::SensorId;
use courier_state::{Position, Reading, Sensor, SensorTelemetry};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterSensorRequest {
    pub sensor_id: String,
}

impl Validate for RegisterSensorRequest {
    fn validate(&self) -> Result<(), String> {
        if self.sensor_id.trim().is_empty() {
            return Err("sensor_id must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorResponse {
    pub sensor_id: String,
    pub owner_id: String,
    pub registered_at: DateTime<Utc>,
}

impl From<Sensor> for SensorResponse {
    fn from(sensor: Sensor) -> Self {
        Self {
            sensor_id: sensor.sensor_id.as_str().to_owned(),
            owner_id: sensor.owner_id.as_str().to_owned(),
            registered_at: *sensor.registered_at.as_datetime(),
        }
    }
}

/// One device report. Counters are deltas since the previous report.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReadingRequest {
    pub sensor_id: String,
    /// New drop alerts.
    #[serde(default)]
    pub fall: i64,
    /// New over-temperature alerts.
    #[serde(default)]
    pub temp: i64,
    /// New water-exposure events.
    #[serde(default)]
    pub hum: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Validate for ReadingRequest {
    fn validate(&self) -> Result<(), String> {
        if self.latitude.is_some() != self.longitude.is_some() {
            return Err("latitude and longitude must be given together".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TelemetryResponse {
    pub sensor_id: String,
    pub drop_alerts: u32,
    pub overtemp_alerts: u32,
    pub water_events: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl From<SensorTelemetry> for TelemetryResponse {
    fn from(t: SensorTelemetry) -> Self {
        Self {
            sensor_id: t.sensor_id.as_str().to_owned(),
            drop_alerts: t.drop_alerts,
            overtemp_alerts: t.overtemp_alerts,
            water_events: t.water_events,
            latitude: t.position.map(|p| p.latitude),
            longitude: t.position.map(|p| p.longitude),
            updated_at: *t.updated_at.as_datetime(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sensors", post(register_sensor))
        .route("/v1/sensors/readings", post(record_reading))
}

/// POST /v1/sensors: Register a sensor owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/sensors",
    request_body = RegisterSensorRequest,
    responses(
        (status = 201, description = "Sensor registered", body = SensorResponse),
        (status = 401, description = "No principal", body = crate::error::ErrorBody),
        (status = 409, description = "Sensor id taken", body = crate::error::ErrorBody),
    ),
    tag = "sensors"
)]
pub async fn register_sensor(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<RegisterSensorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SensorResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let sensor_id = SensorId::new(req.sensor_id)?;

    let sensor = state.market.register_sensor(&caller.user_id, sensor_id).await?;
    Ok((StatusCode::CREATED, Json(sensor.into())))
}

/// POST /v1/sensors/readings: Record a device reading.
#[utoipa::path(
    post,
    path = "/v1/sensors/readings",
    request_body = ReadingRequest,
    responses(
        (status = 200, description = "Telemetry after the reading", body = TelemetryResponse),
        (status = 400, description = "Sensor not in a fulfillment", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown sensor", body = crate::error::ErrorBody),
    ),
    tag = "sensors"
)]
pub async fn record_reading(
    State(state): State<AppState>,
    body: Result<Json<ReadingRequest>, JsonRejection>,
) -> Result<Json<TelemetryResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let sensor_id = SensorId::new(req.sensor_id)?;
    let position = match (req.latitude, req.longitude) {
        (Some(lat), Some(lon)) => Some(Position::new(lat, lon)?),
        _ => None,
    };
    let reading = Reading::from_deltas(req.fall, req.temp, req.hum, position)?;

    let telemetry = state.market.record_reading(&sensor_id, reading).await?;
    Ok(Json(telemetry.into()))
}
