//! # Repository Port
//!
//! Transactional access to contracts, sensors, telemetry and users. Every
//! engine operation opens one [`RepositoryTx`], does all its reads and
//! writes through it, and either commits or drops it. Dropping a
//! transaction without committing rolls it back.
//!
//! Backends must enforce at write time that at most one OPEN or
//! FULFILLMENT contract references a given sensor, reporting a breach as
//! [`RepositoryError::UniqueViolation`].

use async_trait::async_trait;
use thiserror::Error;

use courier_core::{ContractId, SensorId, UserId};
use courier_state::{Contract, Sensor, SensorTelemetry, User};

/// Name of the sensor-exclusivity constraint.
pub const ACTIVE_SENSOR_CONSTRAINT: &str = "contracts_active_sensor_key";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// A unique constraint rejected the write.
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    /// The backend aborted the transaction due to a concurrent writer.
    #[error("transaction aborted by a concurrent write")]
    SerializationFailure,

    /// Any other backend failure.
    #[error("repository backend error: {0}")]
    Backend(String),
}

/// Factory for transactions.
#[async_trait]
pub trait ContractRepository: Send + Sync + 'static {
    type Tx: RepositoryTx;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;

    /// Cheap liveness probe of the backend.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// One open transaction.
#[async_trait]
pub trait RepositoryTx: Send {
    // -- Users and sensors --

    async fn insert_user(&mut self, user: &User) -> Result<(), RepositoryError>;
    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn insert_sensor(&mut self, sensor: &Sensor) -> Result<(), RepositoryError>;
    async fn get_sensor(&mut self, id: &SensorId) -> Result<Option<Sensor>, RepositoryError>;

    // -- Contracts --

    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError>;

    /// Read without locking.
    async fn get_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError>;

    /// Read and lock the row until the transaction ends.
    async fn lock_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError>;

    async fn update_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError>;

    /// Returns whether a row was deleted.
    async fn delete_contract(&mut self, id: ContractId) -> Result<bool, RepositoryError>;

    /// The OPEN or FULFILLMENT contract bound to `sensor`, if any.
    async fn active_contract_for_sensor(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<Contract>, RepositoryError>;

    async fn list_open(&mut self) -> Result<Vec<Contract>, RepositoryError>;

    /// Contracts where `user` is proposer or courier.
    async fn list_for_party(&mut self, user: &UserId) -> Result<Vec<Contract>, RepositoryError>;

    // -- Telemetry --

    async fn get_telemetry(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<SensorTelemetry>, RepositoryError>;

    async fn put_telemetry(&mut self, telemetry: &SensorTelemetry) -> Result<(), RepositoryError>;

    async fn commit(self) -> Result<(), RepositoryError>;
}
