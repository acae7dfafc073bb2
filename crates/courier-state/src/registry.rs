//! Registered users and sensors.

use serde::{Deserialize, Serialize};

use courier_core::{SensorId, Timestamp, UserId, Wallet};

/// A marketplace principal and its ledger wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub wallet: Wallet,
    pub created_at: Timestamp,
}

/// A telemetry device owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub sensor_id: SensorId,
    pub owner_id: UserId,
    pub registered_at: Timestamp,
}

impl Sensor {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }
}
