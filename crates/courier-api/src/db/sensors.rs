//! Sensor persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use courier_core::{SensorId, Timestamp, UserId};
use courier_engine::RepositoryError;
use courier_state::Sensor;

use super::{classify, corrupt};

#[derive(sqlx::FromRow)]
struct SensorRow {
    sensor_id: String,
    owner_id: String,
    registered_at: DateTime<Utc>,
}

impl SensorRow {
    fn into_sensor(self) -> Result<Sensor, RepositoryError> {
        Ok(Sensor {
            sensor_id: SensorId::new(self.sensor_id).map_err(|e| corrupt("sensors", e))?,
            owner_id: UserId::new(self.owner_id).map_err(|e| corrupt("sensors", e))?,
            registered_at: Timestamp::from_utc(self.registered_at),
        })
    }
}

pub async fn insert(conn: &mut PgConnection, sensor: &Sensor) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO sensors (sensor_id, owner_id, registered_at) VALUES ($1, $2, $3)")
        .bind(sensor.sensor_id.as_str())
        .bind(sensor.owner_id.as_str())
        .bind(*sensor.registered_at.as_datetime())
        .execute(conn)
        .await
        .map_err(classify)?;
    Ok(())
}

pub async fn get(conn: &mut PgConnection, id: &SensorId) -> Result<Option<Sensor>, RepositoryError> {
    sqlx::query_as::<_, SensorRow>(
        "SELECT sensor_id, owner_id, registered_at FROM sensors WHERE sensor_id = $1",
    )
    .bind(id.as_str())
    .fetch_optional(conn)
    .await
    .map_err(classify)?
    .map(SensorRow::into_sensor)
    .transpose()
}
