//! # In-Memory Repository
//!
//! Transactions are serialized behind one async mutex. A transaction works
//! on a private copy of the tables and publishes it on commit, so dropping
//! it discards every write. The sensor-exclusivity and primary-key
//! constraints are checked on each write, as a relational backend would.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use courier_core::{ContractId, SensorId, UserId};
use courier_state::{Contract, ContractStatus, Sensor, SensorTelemetry, User};

use crate::repository::{ContractRepository, RepositoryError, RepositoryTx, ACTIVE_SENSOR_CONSTRAINT};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sensors: HashMap<SensorId, Sensor>,
    contracts: HashMap<ContractId, Contract>,
    telemetry: HashMap<SensorId, SensorTelemetry>,
}

impl Tables {
    fn check_sensor_exclusive(&self, contract: &Contract) -> Result<(), RepositoryError> {
        let Some(sensor) = contract.sensor_id() else {
            return Ok(());
        };
        if !contract.status.is_active() {
            return Ok(());
        }
        let taken = self.contracts.values().any(|other| {
            other.id != contract.id && other.status.is_active() && other.sensor_id() == Some(sensor)
        });
        if taken {
            return Err(RepositoryError::UniqueViolation {
                constraint: ACTIVE_SENSOR_CONSTRAINT.into(),
            });
        }
        Ok(())
    }

    fn sorted(mut contracts: Vec<Contract>) -> Vec<Contract> {
        contracts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        contracts
    }
}

/// Process-local [`ContractRepository`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transaction over [`MemoryRepository`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

#[async_trait]
impl ContractRepository for MemoryRepository {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }
}

#[async_trait]
impl RepositoryTx for MemoryTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), RepositoryError> {
        if self.work.users.contains_key(&user.user_id) {
            return Err(RepositoryError::UniqueViolation {
                constraint: "users_pkey".into(),
            });
        }
        self.work.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.work.users.get(id).cloned())
    }

    async fn insert_sensor(&mut self, sensor: &Sensor) -> Result<(), RepositoryError> {
        if self.work.sensors.contains_key(&sensor.sensor_id) {
            return Err(RepositoryError::UniqueViolation {
                constraint: "sensors_pkey".into(),
            });
        }
        self.work.sensors.insert(sensor.sensor_id.clone(), sensor.clone());
        Ok(())
    }

    async fn get_sensor(&mut self, id: &SensorId) -> Result<Option<Sensor>, RepositoryError> {
        Ok(self.work.sensors.get(id).cloned())
    }

    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError> {
        if self.work.contracts.contains_key(&contract.id) {
            return Err(RepositoryError::UniqueViolation {
                constraint: "contracts_pkey".into(),
            });
        }
        self.work.check_sensor_exclusive(contract)?;
        self.work.contracts.insert(contract.id, contract.clone());
        Ok(())
    }

    async fn get_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        Ok(self.work.contracts.get(&id).cloned())
    }

    async fn lock_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        // The transaction already holds the whole store.
        self.get_contract(id).await
    }

    async fn update_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError> {
        if !self.work.contracts.contains_key(&contract.id) {
            return Err(RepositoryError::Backend(format!("{} does not exist", contract.id)));
        }
        self.work.check_sensor_exclusive(contract)?;
        self.work.contracts.insert(contract.id, contract.clone());
        Ok(())
    }

    async fn delete_contract(&mut self, id: ContractId) -> Result<bool, RepositoryError> {
        Ok(self.work.contracts.remove(&id).is_some())
    }

    async fn active_contract_for_sensor(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<Contract>, RepositoryError> {
        Ok(self
            .work
            .contracts
            .values()
            .find(|c| c.status.is_active() && c.sensor_id() == Some(sensor))
            .cloned())
    }

    async fn list_open(&mut self) -> Result<Vec<Contract>, RepositoryError> {
        Ok(Tables::sorted(
            self.work
                .contracts
                .values()
                .filter(|c| c.status == ContractStatus::Open)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_party(&mut self, user: &UserId) -> Result<Vec<Contract>, RepositoryError> {
        Ok(Tables::sorted(
            self.work
                .contracts
                .values()
                .filter(|c| c.role_of(user).is_some())
                .cloned()
                .collect(),
        ))
    }

    async fn get_telemetry(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<SensorTelemetry>, RepositoryError> {
        Ok(self.work.telemetry.get(sensor).cloned())
    }

    async fn put_telemetry(&mut self, telemetry: &SensorTelemetry) -> Result<(), RepositoryError> {
        self.work
            .telemetry
            .insert(telemetry.sensor_id.clone(), telemetry.clone());
        Ok(())
    }

    async fn commit(mut self) -> Result<(), RepositoryError> {
        *self.guard = std::mem::take(&mut self.work);
        Ok(())
    }
}
