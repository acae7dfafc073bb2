//! Sensor telemetry persistence. One row per sensor, upserted on every
//! reading and on settlement reset.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use courier_core::{SensorId, Timestamp};
use courier_engine::RepositoryError;
use courier_state::{Position, SensorTelemetry};

use super::{classify, corrupt};

#[derive(sqlx::FromRow)]
struct TelemetryRow {
    sensor_id: String,
    drop_alerts: i64,
    overtemp_alerts: i64,
    water_events: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    updated_at: DateTime<Utc>,
}

fn counter(value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|e| corrupt("sensor_telemetry", e))
}

impl TelemetryRow {
    fn into_telemetry(self) -> Result<SensorTelemetry, RepositoryError> {
        let position = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                Some(Position::new(lat, lon).map_err(|e| corrupt("sensor_telemetry", e))?)
            }
            _ => None,
        };
        Ok(SensorTelemetry {
            sensor_id: SensorId::new(self.sensor_id).map_err(|e| corrupt("sensor_telemetry", e))?,
            drop_alerts: counter(self.drop_alerts)?,
            overtemp_alerts: counter(self.overtemp_alerts)?,
            water_events: counter(self.water_events)?,
            position,
            updated_at: Timestamp::from_utc(self.updated_at),
        })
    }
}

pub async fn get(
    conn: &mut PgConnection,
    sensor: &SensorId,
) -> Result<Option<SensorTelemetry>, RepositoryError> {
    sqlx::query_as::<_, TelemetryRow>(
        "SELECT sensor_id, drop_alerts, overtemp_alerts, water_events, latitude, longitude, updated_at
         FROM sensor_telemetry WHERE sensor_id = $1",
    )
    .bind(sensor.as_str())
    .fetch_optional(conn)
    .await
    .map_err(classify)?
    .map(TelemetryRow::into_telemetry)
    .transpose()
}

pub async fn upsert(conn: &mut PgConnection, t: &SensorTelemetry) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO sensor_telemetry
             (sensor_id, drop_alerts, overtemp_alerts, water_events, latitude, longitude, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (sensor_id) DO UPDATE SET
             drop_alerts = EXCLUDED.drop_alerts,
             overtemp_alerts = EXCLUDED.overtemp_alerts,
             water_events = EXCLUDED.water_events,
             latitude = EXCLUDED.latitude,
             longitude = EXCLUDED.longitude,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(t.sensor_id.as_str())
    .bind(i64::from(t.drop_alerts))
    .bind(i64::from(t.overtemp_alerts))
    .bind(i64::from(t.water_events))
    .bind(t.position.map(|p| p.latitude))
    .bind(t.position.map(|p| p.longitude))
    .bind(*t.updated_at.as_datetime())
    .execute(conn)
    .await
    .map_err(classify)?;
    Ok(())
}
