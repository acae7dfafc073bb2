//! # Contract Engine
//!
//! Orchestrates the contract lifecycle over a [`ContractRepository`] and an
//! [`EscrowLedgerPort`].
//!
//! ## Transaction shape
//!
//! Each operation runs in one repository transaction. Operations that
//! change a contract lock its row first, so concurrent accepts or
//! settlements of the same contract serialize. Ledger calls happen inside
//! the transaction: if a ledger call fails the transaction is dropped and
//! the contract keeps its previous status.
//!
//! ## Ledger side effects
//!
//! Escrow legs created before a later failure cannot be rolled back from
//! here. They are logged at `warn` with their handles and expire through
//! the ledger's own cancel window. Settlement checks each leg's ledger
//! state before finishing or cancelling it, so a retried settlement only
//! submits what is still pending. A leg the ledger has no record of fails
//! the attempt instead of being skipped.
//!
//! ## Frozen telemetry
//!
//! Readings stop being accepted once the courier reports completion, so
//! every settlement attempt of a contract computes the same payout tier.

use std::sync::Arc;

use async_trait::async_trait;

use courier_core::{ContractId, EscrowHandle, EscrowKind, SensorId, Timestamp, UserId, Wallet};
use courier_ledger::{EscrowLedgerPort, EscrowState, LedgerError, LedgerOp};
use courier_state::{
    Award, CollateralDisposition, Contract, ContractStatus, ContractTerms, EscrowLegs, LegName,
    PartyRole, PayoutPolicy, Reading, Sensor, SensorTelemetry, User,
};

use crate::error::EngineError;
use crate::repository::{ContractRepository, RepositoryTx};
use crate::view::{AccountEscrow, AccountView, CompletionOutcome, ContractView, EscrowDirection};

/// Marketplace operations as seen by a transport layer.
///
/// Object-safe so that a server can hold `Arc<dyn Marketplace>` regardless
/// of which repository backend it was started with.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Register a user and the ledger wallet that funds their escrows.
    async fn register_user(&self, user_id: UserId, wallet: Wallet) -> Result<User, EngineError>;

    /// Register a sensor owned by `owner`.
    async fn register_sensor(&self, owner: &UserId, sensor_id: SensorId) -> Result<Sensor, EngineError>;

    /// Fold a device reading into the sensor's telemetry. The sensor must
    /// be bound to a contract in FULFILLMENT whose courier has not yet
    /// reported completion.
    async fn record_reading(
        &self,
        sensor_id: &SensorId,
        reading: Reading,
    ) -> Result<SensorTelemetry, EngineError>;

    async fn propose(&self, proposer: &UserId, terms: ContractTerms) -> Result<ContractView, EngineError>;

    /// Bind a courier and sensor to an OPEN contract and lock its funds.
    async fn accept(
        &self,
        courier: &UserId,
        contract_id: ContractId,
        sensor_id: SensorId,
    ) -> Result<ContractView, EngineError>;

    /// Courier attestation, or proposer confirmation followed by settlement.
    async fn report_completion(
        &self,
        caller: &UserId,
        contract_id: ContractId,
    ) -> Result<CompletionOutcome, EngineError>;

    async fn update(
        &self,
        caller: &UserId,
        contract_id: ContractId,
        terms: ContractTerms,
    ) -> Result<ContractView, EngineError>;

    async fn delete(&self, caller: &UserId, contract_id: ContractId) -> Result<(), EngineError>;

    async fn get(&self, viewer: Option<&UserId>, contract_id: ContractId) -> Result<ContractView, EngineError>;

    async fn list_open(&self, viewer: Option<&UserId>) -> Result<Vec<ContractView>, EngineError>;

    /// Contracts where the caller is proposer or courier.
    async fn list_mine(&self, caller: &UserId) -> Result<Vec<ContractView>, EngineError>;

    /// Every escrow leg the caller sent or received, with its ledger state.
    async fn list_escrows(&self, caller: &UserId) -> Result<Vec<AccountEscrow>, EngineError>;

    /// The caller's wallet and its ledger balance.
    async fn account(&self, caller: &UserId) -> Result<AccountView, EngineError>;

    /// Backend readiness.
    async fn ready(&self) -> Result<(), EngineError>;
}

/// The marketplace engine.
pub struct ContractEngine<R> {
    repo: Arc<R>,
    ledger: Arc<dyn EscrowLedgerPort>,
}

impl<R> Clone for ContractEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<R: ContractRepository> ContractEngine<R> {
    pub fn new(repo: R, ledger: Arc<dyn EscrowLedgerPort>) -> Self {
        Self {
            repo: Arc::new(repo),
            ledger,
        }
    }

    // ─── Settlement ──────────────────────────────────────────────────

    async fn settle(
        &self,
        mut tx: R::Tx,
        mut contract: Contract,
        now: Timestamp,
    ) -> Result<CompletionOutcome, EngineError> {
        contract.confirm_completion(now)?;
        let award = contract
            .award
            .clone()
            .ok_or_else(|| EngineError::Internal(format!("{} has no award", contract.id)))?;

        let telemetry = tx.get_telemetry(&award.sensor_id).await?;
        let decision = PayoutPolicy::decide(telemetry.as_ref());
        let proposer = require_wallet(&mut tx, &contract.proposer_id).await?;
        let courier = require_wallet(&mut tx, &award.courier_id).await?;

        let mut release = Vec::new();
        for (leg, handle) in award.escrow.payout().into_iter().take(decision.tier.legs_released()) {
            if self.still_open(contract.id, leg, handle).await? {
                release.push(handle.clone());
            }
        }
        if !release.is_empty() {
            self.ledger
                .finish(&proposer.wallet, &release, release.len())
                .await
                .map_err(|e| ledger_failure(contract.id, LedgerOp::Finish, e))?;
        }

        let collateral = &award.escrow.collateral;
        if self.still_open(contract.id, LegName::Collateral, collateral).await? {
            match decision.collateral {
                CollateralDisposition::ReturnToCourier => self
                    .ledger
                    .cancel(&courier.wallet, collateral)
                    .await
                    .map_err(|e| ledger_failure(contract.id, LedgerOp::Cancel, e))?,
                CollateralDisposition::ForfeitToProposer => self
                    .ledger
                    .finish(&courier.wallet, std::slice::from_ref(collateral), 1)
                    .await
                    .map_err(|e| ledger_failure(contract.id, LedgerOp::Finish, e))?,
            }
        }

        if let Some(mut telemetry) = telemetry {
            telemetry.reset(now);
            tx.put_telemetry(&telemetry).await?;
        }
        tx.update_contract(&contract).await?;
        tx.commit().await?;

        metrics::counter!("contracts_settled_total", "tier" => decision.tier.to_string()).increment(1);
        tracing::info!(
            contract = %contract.id,
            tier = %decision.tier,
            collateral = ?decision.collateral,
            "contract settled"
        );
        Ok(CompletionOutcome {
            status: contract.status,
            message: format!(
                "completed: {} of 3 payout legs released, collateral {}",
                decision.tier,
                match decision.collateral {
                    CollateralDisposition::ReturnToCourier => "returned to courier",
                    CollateralDisposition::ForfeitToProposer => "forfeited to proposer",
                }
            ),
        })
    }

    /// Whether a leg still needs a finish or cancel.
    async fn still_open(
        &self,
        contract_id: ContractId,
        leg: LegName,
        handle: &EscrowHandle,
    ) -> Result<bool, EngineError> {
        let state = self
            .ledger
            .status(handle)
            .await
            .map_err(|e| ledger_failure(contract_id, LedgerOp::Status, e))?;
        match state {
            EscrowState::Open => Ok(true),
            EscrowState::Finished | EscrowState::Cancelled => {
                tracing::info!(contract = %contract_id, leg = %leg.as_str(), ?state, "escrow leg already settled, skipping");
                Ok(false)
            }
            EscrowState::Unknown => {
                metrics::counter!("ledger_failures_total", "op" => LedgerOp::Status.as_str()).increment(1);
                tracing::error!(contract = %contract_id, leg = %leg.as_str(), escrow = %handle, "ledger has no record of escrow leg");
                Err(EngineError::LedgerUnavailable(format!(
                    "ledger has no record of {} leg {handle}",
                    leg.as_str()
                )))
            }
        }
    }

    async fn create_legs(
        &self,
        contract: &Contract,
        proposer: &User,
        courier: &User,
    ) -> Result<EscrowLegs, EngineError> {
        let terms = &contract.terms;
        let payout = self
            .ledger
            .create(
                &proposer.wallet,
                &courier.wallet.address,
                &terms.payout_amounts(),
                EscrowKind::Standard,
                terms.timeout,
            )
            .await
            .map_err(|e| ledger_failure(contract.id, LedgerOp::Create, e))?;

        let collateral = match self
            .ledger
            .create(
                &courier.wallet,
                &proposer.wallet.address,
                &[terms.required_collateral],
                EscrowKind::Collateral,
                terms.timeout,
            )
            .await
        {
            Ok(mut created) if created.len() == 1 => created.remove(0),
            Ok(created) => {
                log_orphans(contract.id, payout.iter().chain(created.iter()));
                return Err(EngineError::Internal(format!(
                    "ledger returned {} collateral legs",
                    created.len()
                )));
            }
            Err(e) => {
                log_orphans(contract.id, payout.iter());
                return Err(ledger_failure(contract.id, LedgerOp::Create, e));
            }
        };

        let count = payout.len();
        EscrowLegs::from_created(payout, collateral).ok_or_else(|| {
            EngineError::Internal(format!("ledger returned {count} payout legs, expected 3"))
        })
    }
}

#[async_trait]
impl<R: ContractRepository> Marketplace for ContractEngine<R> {
    async fn register_user(&self, user_id: UserId, wallet: Wallet) -> Result<User, EngineError> {
        if wallet.address.trim().is_empty() || wallet.secret().trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "wallet address and secret must not be blank".into(),
            ));
        }
        let user = User {
            user_id,
            wallet,
            created_at: Timestamp::now(),
        };
        let mut tx = self.repo.begin().await?;
        tx.insert_user(&user).await?;
        tx.commit().await?;
        tracing::info!(user = %user.user_id, address = %user.wallet.address, "user registered");
        Ok(user)
    }

    async fn register_sensor(&self, owner: &UserId, sensor_id: SensorId) -> Result<Sensor, EngineError> {
        let sensor = Sensor {
            sensor_id,
            owner_id: owner.clone(),
            registered_at: Timestamp::now(),
        };
        let mut tx = self.repo.begin().await?;
        tx.insert_sensor(&sensor).await?;
        tx.commit().await?;
        tracing::info!(sensor = %sensor.sensor_id, owner = %owner, "sensor registered");
        Ok(sensor)
    }

    async fn record_reading(
        &self,
        sensor_id: &SensorId,
        reading: Reading,
    ) -> Result<SensorTelemetry, EngineError> {
        let now = Timestamp::now();
        let mut tx = self.repo.begin().await?;
        if tx.get_sensor(sensor_id).await?.is_none() {
            return Err(EngineError::NotFound(format!("sensor {sensor_id}")));
        }
        let bound = tx
            .active_contract_for_sensor(sensor_id)
            .await?
            .filter(|c| c.status == ContractStatus::Fulfillment)
            .ok_or_else(|| {
                EngineError::PreconditionFailed(format!(
                    "sensor {sensor_id} is not bound to a contract in fulfillment"
                ))
            })?;
        if bound.completion_time.is_some() {
            return Err(EngineError::PreconditionFailed(format!(
                "courier already reported completion of {}, telemetry is frozen",
                bound.id
            )));
        }

        let mut telemetry = tx
            .get_telemetry(sensor_id)
            .await?
            .unwrap_or_else(|| SensorTelemetry::empty(sensor_id.clone(), now));
        telemetry.apply(&reading, now);
        tx.put_telemetry(&telemetry).await?;
        tx.commit().await?;

        tracing::debug!(sensor = %sensor_id, drops = telemetry.drop_alerts, "reading recorded");
        Ok(telemetry)
    }

    async fn propose(&self, proposer: &UserId, terms: ContractTerms) -> Result<ContractView, EngineError> {
        let contract = Contract::propose(proposer.clone(), terms, Timestamp::now())?;
        let mut tx = self.repo.begin().await?;
        tx.insert_contract(&contract).await?;
        tx.commit().await?;

        metrics::counter!("contracts_proposed_total").increment(1);
        tracing::info!(contract = %contract.id, proposer = %proposer, "contract proposed");
        Ok(ContractView::project(&contract, Some(proposer)))
    }

    async fn accept(
        &self,
        courier: &UserId,
        contract_id: ContractId,
        sensor_id: SensorId,
    ) -> Result<ContractView, EngineError> {
        let now = Timestamp::now();
        let mut tx = self.repo.begin().await?;

        let mut contract = tx
            .lock_contract(contract_id)
            .await?
            .filter(|c| c.status == ContractStatus::Open)
            .ok_or_else(|| EngineError::NotFound(format!("open contract {contract_id}")))?;
        let owned = tx
            .get_sensor(&sensor_id)
            .await?
            .is_some_and(|s| s.is_owned_by(courier));
        if !owned {
            return Err(EngineError::NotOwned(sensor_id.to_string()));
        }
        if tx.active_contract_for_sensor(&sensor_id).await?.is_some() {
            return Err(EngineError::SensorBusy(sensor_id.to_string()));
        }
        if &contract.proposer_id == courier {
            return Err(EngineError::Forbidden(
                "a proposer cannot accept their own contract".into(),
            ));
        }

        let proposer = require_wallet(&mut tx, &contract.proposer_id).await?;
        let courier_user = require_wallet(&mut tx, courier).await?;
        let legs = self.create_legs(&contract, &proposer, &courier_user).await?;

        let handles: Vec<EscrowHandle> = legs.all().iter().map(|(_, h)| (*h).clone()).collect();
        contract.award(
            Award {
                courier_id: courier.clone(),
                sensor_id,
                award_time: now,
                escrow: legs,
            },
            now,
        )?;
        if let Err(e) = tx.update_contract(&contract).await {
            log_orphans(contract.id, handles.iter());
            return Err(e.into());
        }
        if let Err(e) = tx.commit().await {
            log_orphans(contract.id, handles.iter());
            return Err(e.into());
        }

        metrics::counter!("contracts_accepted_total").increment(1);
        tracing::info!(contract = %contract.id, courier = %courier, "contract accepted");
        Ok(ContractView::project(&contract, Some(courier)))
    }

    async fn report_completion(
        &self,
        caller: &UserId,
        contract_id: ContractId,
    ) -> Result<CompletionOutcome, EngineError> {
        let now = Timestamp::now();
        let mut tx = self.repo.begin().await?;
        let mut contract = tx
            .lock_contract(contract_id)
            .await?
            .filter(|c| c.status == ContractStatus::Fulfillment)
            .ok_or_else(|| EngineError::NotFound(format!("contract {contract_id} in fulfillment")))?;

        match contract.role_of(caller) {
            Some(PartyRole::Courier) => {
                contract.record_courier_report(now)?;
                tx.update_contract(&contract).await?;
                tx.commit().await?;
                tracing::info!(contract = %contract.id, "courier reported completion");
                Ok(CompletionOutcome {
                    status: contract.status,
                    message: "completion recorded, awaiting proposer confirmation".into(),
                })
            }
            Some(PartyRole::Proposer) => self.settle(tx, contract, now).await,
            None => Err(EngineError::Forbidden(format!(
                "caller is not a party to {contract_id}"
            ))),
        }
    }

    async fn update(
        &self,
        caller: &UserId,
        contract_id: ContractId,
        terms: ContractTerms,
    ) -> Result<ContractView, EngineError> {
        let mut tx = self.repo.begin().await?;
        let mut contract = tx
            .lock_contract(contract_id)
            .await?
            .filter(|c| c.status == ContractStatus::Open && &c.proposer_id == caller)
            .ok_or_else(|| EngineError::NotFound(format!("open contract {contract_id}")))?;
        contract.revise(terms, Timestamp::now())?;
        tx.update_contract(&contract).await?;
        tx.commit().await?;
        Ok(ContractView::project(&contract, Some(caller)))
    }

    async fn delete(&self, caller: &UserId, contract_id: ContractId) -> Result<(), EngineError> {
        let mut tx = self.repo.begin().await?;
        let contract = tx
            .lock_contract(contract_id)
            .await?
            .filter(|c| c.status == ContractStatus::Open)
            .ok_or_else(|| EngineError::NotFound(format!("open contract {contract_id}")))?;
        if &contract.proposer_id != caller {
            return Err(EngineError::Forbidden("only the proposer may delete a contract".into()));
        }
        tx.delete_contract(contract_id).await?;
        tx.commit().await?;
        tracing::info!(contract = %contract_id, "contract deleted");
        Ok(())
    }

    async fn get(&self, viewer: Option<&UserId>, contract_id: ContractId) -> Result<ContractView, EngineError> {
        let mut tx = self.repo.begin().await?;
        let contract = tx
            .get_contract(contract_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("contract {contract_id}")))?;
        Ok(ContractView::project(&contract, viewer))
    }

    async fn list_open(&self, viewer: Option<&UserId>) -> Result<Vec<ContractView>, EngineError> {
        let mut tx = self.repo.begin().await?;
        let open = tx.list_open().await?;
        Ok(open.iter().map(|c| ContractView::project(c, viewer)).collect())
    }

    async fn list_mine(&self, caller: &UserId) -> Result<Vec<ContractView>, EngineError> {
        let mut tx = self.repo.begin().await?;
        let mine = tx.list_for_party(caller).await?;
        Ok(mine.iter().map(|c| ContractView::project(c, Some(caller))).collect())
    }

    async fn list_escrows(&self, caller: &UserId) -> Result<Vec<AccountEscrow>, EngineError> {
        let contracts = {
            let mut tx = self.repo.begin().await?;
            tx.list_for_party(caller).await?
        };

        let mut out = Vec::new();
        for contract in &contracts {
            let (Some(award), Some(role)) = (contract.award.as_ref(), contract.role_of(caller)) else {
                continue;
            };
            let terms = &contract.terms;
            for (leg, handle) in award.escrow.all() {
                let from_proposer = leg != LegName::Collateral;
                let direction = match (role, from_proposer) {
                    (PartyRole::Proposer, true) | (PartyRole::Courier, false) => EscrowDirection::Sent,
                    _ => EscrowDirection::Received,
                };
                let counterparty = match role {
                    PartyRole::Proposer => award.courier_id.clone(),
                    PartyRole::Courier => contract.proposer_id.clone(),
                };
                let state = self
                    .ledger
                    .status(handle)
                    .await
                    .map_err(|e| ledger_failure(contract.id, LedgerOp::Status, e))?;
                out.push(AccountEscrow {
                    contract_id: contract.id,
                    leg,
                    direction,
                    counterparty,
                    amount: match leg {
                        LegName::Base => terms.base_price,
                        LegName::Tier1 => terms.tier1_bonus,
                        LegName::Tier2 => terms.tier2_bonus,
                        LegName::Collateral => terms.required_collateral,
                    },
                    owner: handle.owner.clone(),
                    sequence: handle.sequence,
                    state,
                });
            }
        }
        Ok(out)
    }

    async fn account(&self, caller: &UserId) -> Result<AccountView, EngineError> {
        let user = {
            let mut tx = self.repo.begin().await?;
            tx.get_user(caller)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("user {caller}")))?
        };
        let balance_drops = self.ledger.balance(&user.wallet.address).await.map_err(|e| {
            metrics::counter!("ledger_failures_total", "op" => LedgerOp::Balance.as_str()).increment(1);
            tracing::error!(user = %caller, error = %e, "balance lookup failed");
            EngineError::from(e)
        })?;
        Ok(AccountView {
            wallet_address: user.wallet.address.clone(),
            user_id: user.user_id,
            balance_drops,
        })
    }

    async fn ready(&self) -> Result<(), EngineError> {
        self.repo.ping().await.map_err(EngineError::from)
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

async fn require_wallet<T: RepositoryTx>(tx: &mut T, user: &UserId) -> Result<User, EngineError> {
    tx.get_user(user)
        .await?
        .ok_or_else(|| EngineError::PreconditionFailed(format!("user {user} has no registered wallet")))
}

fn ledger_failure(contract_id: ContractId, op: LedgerOp, err: LedgerError) -> EngineError {
    log_orphans(contract_id, err.orphaned_handles().iter());
    metrics::counter!("ledger_failures_total", "op" => op.as_str()).increment(1);
    tracing::error!(contract = %contract_id, op = %op, error = %err, "ledger operation failed");
    EngineError::from(err)
}

fn log_orphans<'a>(contract_id: ContractId, handles: impl Iterator<Item = &'a EscrowHandle>) {
    for handle in handles {
        tracing::warn!(
            contract = %contract_id,
            escrow = %handle,
            "escrow leg orphaned; it will expire through the ledger cancel window"
        );
    }
}
