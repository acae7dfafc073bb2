//! # Sensor Telemetry
//!
//! Cumulative incident counters for one sensor over one fulfillment
//! window. Devices report deltas; the record accumulates them until
//! settlement resets it.

use serde::{Deserialize, Serialize};

use courier_core::{SensorId, Timestamp, ValidationError};

/// Last reported GPS position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::field(
                "latitude",
                format!("must be within [-90, 90], got {latitude}"),
            ));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::field(
                "longitude",
                format!("must be within [-180, 180], got {longitude}"),
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// One device report: counter deltas since the previous report.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub drop_alerts: u32,
    pub overtemp_alerts: u32,
    pub water_events: u32,
    pub position: Option<Position>,
}

impl Reading {
    /// Build from signed device deltas, rejecting negatives and values
    /// beyond `u32::MAX`.
    pub fn from_deltas(
        fall: i64,
        temp: i64,
        hum: i64,
        position: Option<Position>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            drop_alerts: delta("fall", fall)?,
            overtemp_alerts: delta("temp", temp)?,
            water_events: delta("hum", hum)?,
            position,
        })
    }
}

fn delta(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    if value < 0 {
        return Err(ValidationError::field(field, format!("delta must not be negative, got {value}")));
    }
    u32::try_from(value).map_err(|_| {
        ValidationError::field(field, format!("delta must be at most {}, got {value}", u32::MAX))
    })
}

/// Accumulated telemetry for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTelemetry {
    pub sensor_id: SensorId,
    pub drop_alerts: u32,
    pub overtemp_alerts: u32,
    pub water_events: u32,
    pub position: Option<Position>,
    pub updated_at: Timestamp,
}

impl SensorTelemetry {
    /// A zeroed record, as created on first reading.
    pub fn empty(sensor_id: SensorId, now: Timestamp) -> Self {
        Self {
            sensor_id,
            drop_alerts: 0,
            overtemp_alerts: 0,
            water_events: 0,
            position: None,
            updated_at: now,
        }
    }

    /// Add a reading's deltas. Counters saturate; a reported position
    /// replaces the previous one.
    pub fn apply(&mut self, reading: &Reading, now: Timestamp) {
        self.drop_alerts = self.drop_alerts.saturating_add(reading.drop_alerts);
        self.overtemp_alerts = self.overtemp_alerts.saturating_add(reading.overtemp_alerts);
        self.water_events = self.water_events.saturating_add(reading.water_events);
        if reading.position.is_some() {
            self.position = reading.position;
        }
        self.updated_at = now;
    }

    /// Zero all counters and clear the position.
    pub fn reset(&mut self, now: Timestamp) {
        self.drop_alerts = 0;
        self.overtemp_alerts = 0;
        self.water_events = 0;
        self.position = None;
        self.updated_at = now;
    }

    pub fn is_zero(&self) -> bool {
        self.drop_alerts == 0 && self.overtemp_alerts == 0 && self.water_events == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor() -> SensorId {
        SensorId::new("ESP32-01").unwrap()
    }

    #[test]
    fn apply_accumulates_deltas() {
        let now = Timestamp::now();
        let mut t = SensorTelemetry::empty(sensor(), now);
        let r = Reading::from_deltas(2, 1, 0, None).unwrap();
        t.apply(&r, now);
        t.apply(&r, now);
        assert_eq!(t.drop_alerts, 4);
        assert_eq!(t.overtemp_alerts, 2);
        assert_eq!(t.water_events, 0);
    }

    #[test]
    fn apply_saturates() {
        let now = Timestamp::now();
        let mut t = SensorTelemetry::empty(sensor(), now);
        t.drop_alerts = u32::MAX - 1;
        t.apply(&Reading::from_deltas(10, 0, 0, None).unwrap(), now);
        assert_eq!(t.drop_alerts, u32::MAX);
    }

    #[test]
    fn position_overwritten_only_when_reported() {
        let now = Timestamp::now();
        let mut t = SensorTelemetry::empty(sensor(), now);
        let p = Position::new(51.5, -0.12).unwrap();
        t.apply(&Reading::from_deltas(0, 0, 0, Some(p)).unwrap(), now);
        t.apply(&Reading::from_deltas(1, 0, 0, None).unwrap(), now);
        assert_eq!(t.position, Some(p));
    }

    #[test]
    fn reset_zeroes_everything() {
        let now = Timestamp::now();
        let mut t = SensorTelemetry::empty(sensor(), now);
        t.apply(
            &Reading::from_deltas(3, 3, 3, Some(Position::new(1.0, 2.0).unwrap())).unwrap(),
            now,
        );
        t.reset(now);
        assert!(t.is_zero());
        assert!(t.position.is_none());
    }

    #[test]
    fn negative_delta_rejected() {
        assert!(Reading::from_deltas(-1, 0, 0, None).is_err());
        assert!(Reading::from_deltas(0, 0, -4, None).is_err());
    }

    #[test]
    fn oversized_delta_rejected() {
        let err = Reading::from_deltas(i64::from(u32::MAX) + 1, 0, 0, None).unwrap_err();
        assert!(err.to_string().contains("fall"));
        assert!(Reading::from_deltas(0, i64::from(u32::MAX), 0, None).is_ok());
    }

    #[test]
    fn position_bounds() {
        assert!(Position::new(91.0, 0.0).is_err());
        assert!(Position::new(0.0, -180.5).is_err());
        assert!(Position::new(f64::NAN, 0.0).is_err());
        assert!(Position::new(-90.0, 180.0).is_ok());
    }
}
