//! [`ContractRepository`] over Postgres.
//!
//! Each transaction runs at SERIALIZABLE isolation. Contract rows touched
//! by a state change are read with `SELECT … FOR UPDATE`. A dropped
//! [`PgTx`] rolls back when sqlx returns its connection to the pool.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use courier_core::{ContractId, SensorId, UserId};
use courier_engine::{ContractRepository, RepositoryError, RepositoryTx};
use courier_state::{Contract, Sensor, SensorTelemetry, User};

use super::{classify, contracts, sensors, telemetry, users};

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ContractRepository for PgRepository {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        Ok(PgTx { tx })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl RepositoryTx for PgTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), RepositoryError> {
        users::insert(&mut self.tx, user).await
    }

    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        users::get(&mut self.tx, id).await
    }

    async fn insert_sensor(&mut self, sensor: &Sensor) -> Result<(), RepositoryError> {
        sensors::insert(&mut self.tx, sensor).await
    }

    async fn get_sensor(&mut self, id: &SensorId) -> Result<Option<Sensor>, RepositoryError> {
        sensors::get(&mut self.tx, id).await
    }

    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError> {
        contracts::insert(&mut self.tx, contract).await
    }

    async fn get_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        contracts::get(&mut self.tx, id, false).await
    }

    async fn lock_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        contracts::get(&mut self.tx, id, true).await
    }

    async fn update_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError> {
        if contracts::update(&mut self.tx, contract).await? {
            Ok(())
        } else {
            Err(RepositoryError::Backend(format!("{} does not exist", contract.id)))
        }
    }

    async fn delete_contract(&mut self, id: ContractId) -> Result<bool, RepositoryError> {
        contracts::delete(&mut self.tx, id).await
    }

    async fn active_contract_for_sensor(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<Contract>, RepositoryError> {
        contracts::active_for_sensor(&mut self.tx, sensor).await
    }

    async fn list_open(&mut self) -> Result<Vec<Contract>, RepositoryError> {
        contracts::list_open(&mut self.tx).await
    }

    async fn list_for_party(&mut self, user: &UserId) -> Result<Vec<Contract>, RepositoryError> {
        contracts::list_for_party(&mut self.tx, user).await
    }

    async fn get_telemetry(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<SensorTelemetry>, RepositoryError> {
        telemetry::get(&mut self.tx, sensor).await
    }

    async fn put_telemetry(&mut self, telemetry: &SensorTelemetry) -> Result<(), RepositoryError> {
        telemetry::upsert(&mut self.tx, telemetry).await
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(classify)
    }
}
