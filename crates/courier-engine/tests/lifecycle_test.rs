//! End-to-end contract lifecycle over the in-memory repository and ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing_subscriber::fmt::MakeWriter;

use courier_core::{Amount, ContractId, EscrowHandle, SensorId, Timestamp, UserId, Wallet};
use courier_engine::memory::MemoryTx;
use courier_engine::{
    ContractEngine, ContractRepository, ContractView, EngineError, EscrowDirection, Marketplace,
    MemoryRepository, RepositoryError, RepositoryTx, ACTIVE_SENSOR_CONSTRAINT,
};
use courier_ledger::{EscrowLedgerPort, EscrowState, InMemoryLedger, LedgerOp, OPENING_BALANCE_DROPS};
use courier_state::{Contract, ContractStatus, ContractTerms, LegName, Reading, Sensor, SensorTelemetry, User};

struct Harness {
    engine: ContractEngine<MemoryRepository>,
    ledger: Arc<InMemoryLedger>,
    alice: UserId,
    bob: UserId,
    sensor: SensorId,
}

fn uid(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn terms(title: &str) -> ContractTerms {
    let a = |v| Amount::new("x", v).unwrap();
    ContractTerms {
        title: title.into(),
        description: "two boxes, keep upright".into(),
        timeout: Timestamp::now().plus_secs(3600),
        required_collateral: a(50),
        base_price: a(100),
        tier1_bonus: a(20),
        tier2_bonus: a(10),
    }
}

async fn harness() -> Harness {
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = ContractEngine::new(MemoryRepository::new(), ledger.clone());
    let alice = uid("alice");
    let bob = uid("bob");
    engine
        .register_user(alice.clone(), Wallet::new("rAlice", "sAlice"))
        .await
        .unwrap();
    engine
        .register_user(bob.clone(), Wallet::new("rBob", "sBob"))
        .await
        .unwrap();
    let sensor = SensorId::new("pi-01").unwrap();
    engine.register_sensor(&bob, sensor.clone()).await.unwrap();
    Harness {
        engine,
        ledger,
        alice,
        bob,
        sensor,
    }
}

impl Harness {
    async fn proposed(&self) -> ContractId {
        self.engine.propose(&self.alice, terms("Parcel")).await.unwrap().id
    }

    async fn accepted(&self) -> ContractId {
        let id = self.proposed().await;
        self.engine
            .accept(&self.bob, id, self.sensor.clone())
            .await
            .unwrap();
        id
    }

    async fn drops(&self, n: i64) {
        let reading = Reading::from_deltas(n, 0, 0, None).unwrap();
        self.engine.record_reading(&self.sensor, reading).await.unwrap();
    }

    async fn handles(&self, id: ContractId) -> Vec<(LegName, EscrowHandle)> {
        let view = self.engine.get(Some(&self.alice), id).await.unwrap();
        view.escrow
            .unwrap()
            .into_iter()
            .map(|leg| {
                let handle = EscrowHandle {
                    owner: leg.owner.clone(),
                    sequence: leg.sequence,
                    condition: leg.condition.clone(),
                    fulfillment: String::new(),
                };
                (leg.leg, handle)
            })
            .collect()
    }

    async fn leg_states(&self, id: ContractId) -> Vec<(LegName, EscrowState)> {
        let mut out = Vec::new();
        for (leg, handle) in self.handles(id).await {
            out.push((leg, self.ledger.status(&handle).await.unwrap()));
        }
        out
    }
}

fn states(legs: &[(LegName, EscrowState)]) -> Vec<EscrowState> {
    legs.iter().map(|(_, s)| *s).collect()
}

// ── Propose / accept ─────────────────────────────────────────────────

#[tokio::test]
async fn proposed_contract_is_listed_open() {
    let h = harness().await;
    let id = h.proposed().await;
    let open = h.engine.list_open(None).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, id);
    assert_eq!(open[0].status, ContractStatus::Open);
    assert!(open[0].courier_id.is_none());
}

#[tokio::test]
async fn propose_rejects_past_timeout() {
    let h = harness().await;
    let mut t = terms("Late");
    t.timeout = Timestamp::now().plus_secs(-60);
    let err = h.engine.propose(&h.alice, t).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn accept_locks_four_legs_and_binds_sensor() {
    let h = harness().await;
    let id = h.accepted().await;

    let view = h.engine.get(Some(&h.bob), id).await.unwrap();
    assert_eq!(view.status, ContractStatus::Fulfillment);
    assert_eq!(view.courier_id.as_ref(), Some(&h.bob));
    assert_eq!(view.sensor_id.as_ref(), Some(&h.sensor));
    assert!(view.award_time.is_some());

    assert_eq!(h.ledger.open_escrows_from("rAlice"), 3);
    assert_eq!(h.ledger.open_escrows_from("rBob"), 1);
    assert!(h.engine.list_open(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn accept_checks_contract_then_ownership_then_busy() {
    let h = harness().await;
    let carol = uid("carol");
    h.engine
        .register_user(carol.clone(), Wallet::new("rCarol", "sCarol"))
        .await
        .unwrap();

    let missing = ContractId::new();
    let err = h.engine.accept(&h.bob, missing, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let id = h.proposed().await;
    let err = h.engine.accept(&carol, id, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotOwned(_)));

    h.accepted().await;
    let err = h.engine.accept(&h.bob, id, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::SensorBusy(_)));
}

#[tokio::test]
async fn accept_requires_registered_wallets() {
    let h = harness().await;
    let dave = uid("dave");
    let id = h.engine.propose(&dave, terms("Orphan")).await.unwrap().id;
    let err = h.engine.accept(&h.bob, id, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
    assert_eq!(h.ledger.applied(LedgerOp::Create), 0);
}

#[tokio::test]
async fn proposer_cannot_accept_own_contract() {
    let h = harness().await;
    let own = SensorId::new("alice-pi").unwrap();
    h.engine.register_sensor(&h.alice, own.clone()).await.unwrap();
    let id = h.proposed().await;
    let err = h.engine.accept(&h.alice, id, own).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn failed_payout_creation_leaves_contract_open() {
    let h = harness().await;
    let id = h.proposed().await;
    h.ledger.fail_after(LedgerOp::Create, 0);

    let err = h.engine.accept(&h.bob, id, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerUnavailable(_)));
    let view = h.engine.get(None, id).await.unwrap();
    assert_eq!(view.status, ContractStatus::Open);
    assert!(view.courier_id.is_none());
}

#[tokio::test]
async fn failed_collateral_creation_orphans_payout_legs() {
    let h = harness().await;
    let id = h.proposed().await;
    h.ledger.fail_after(LedgerOp::Create, 3);

    let err = h.engine.accept(&h.bob, id, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerUnavailable(_)));
    assert_eq!(h.engine.get(None, id).await.unwrap().status, ContractStatus::Open);
    assert_eq!(h.ledger.open_escrows_from("rAlice"), 3);
    assert_eq!(h.ledger.open_escrows_from("rBob"), 0);

    // The sensor stays free for a retry.
    h.engine.accept(&h.bob, id, h.sensor.clone()).await.unwrap();
}

// ── Completion and settlement ────────────────────────────────────────

#[tokio::test]
async fn clean_delivery_releases_everything() {
    let h = harness().await;
    let id = h.accepted().await;
    h.drops(2).await;

    let out = h.engine.report_completion(&h.bob, id).await.unwrap();
    assert_eq!(out.status, ContractStatus::Fulfillment);
    let out = h.engine.report_completion(&h.alice, id).await.unwrap();
    assert_eq!(out.status, ContractStatus::Completed);

    let legs = h.leg_states(id).await;
    assert_eq!(
        states(&legs),
        vec![
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Cancelled
        ]
    );

    let view = h.engine.get(Some(&h.alice), id).await.unwrap();
    assert!(view.completion_time.is_some());
    assert!(view.confirm_completion_time.is_some());
}

#[tokio::test]
async fn rough_delivery_drops_top_bonus() {
    let h = harness().await;
    let id = h.accepted().await;
    h.drops(3).await;
    h.engine.report_completion(&h.bob, id).await.unwrap();
    h.engine.report_completion(&h.alice, id).await.unwrap();

    let legs = h.leg_states(id).await;
    assert_eq!(
        states(&legs),
        vec![
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Open,
            EscrowState::Cancelled
        ]
    );
}

#[tokio::test]
async fn wrecked_delivery_forfeits_collateral() {
    let h = harness().await;
    let id = h.accepted().await;
    h.drops(4).await;
    h.drops(3).await;
    h.engine.report_completion(&h.bob, id).await.unwrap();
    h.engine.report_completion(&h.alice, id).await.unwrap();

    let legs = h.leg_states(id).await;
    assert_eq!(
        states(&legs),
        vec![
            EscrowState::Open,
            EscrowState::Open,
            EscrowState::Open,
            EscrowState::Finished
        ]
    );
}

#[tokio::test]
async fn settlement_resets_sensor_telemetry() {
    let h = harness().await;
    let first = h.accepted().await;
    h.drops(5).await;
    h.engine.report_completion(&h.bob, first).await.unwrap();
    h.engine.report_completion(&h.alice, first).await.unwrap();

    h.accepted().await;
    let reading = Reading::from_deltas(0, 1, 0, None).unwrap();
    let t = h.engine.record_reading(&h.sensor, reading).await.unwrap();
    assert_eq!(t.drop_alerts, 0);
    assert_eq!(t.overtemp_alerts, 1);
}

#[tokio::test]
async fn proposer_must_wait_for_courier_report() {
    let h = harness().await;
    let id = h.accepted().await;
    let err = h.engine.report_completion(&h.alice, id).await.unwrap_err();
    assert!(matches!(err, EngineError::CourierHasNotReported));
    assert_eq!(h.ledger.applied(LedgerOp::Finish), 0);
}

#[tokio::test]
async fn courier_reports_once() {
    let h = harness().await;
    let id = h.accepted().await;
    h.engine.report_completion(&h.bob, id).await.unwrap();
    let err = h.engine.report_completion(&h.bob, id).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyReported));
}

#[tokio::test]
async fn outsiders_cannot_report() {
    let h = harness().await;
    let id = h.accepted().await;
    let err = h.engine.report_completion(&uid("eve"), id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn report_on_open_or_completed_contract_is_not_found() {
    let h = harness().await;
    let open = h.proposed().await;
    let err = h.engine.report_completion(&h.alice, open).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let id = h.accepted().await;
    h.engine.report_completion(&h.bob, id).await.unwrap();
    h.engine.report_completion(&h.alice, id).await.unwrap();
    let err = h.engine.report_completion(&h.alice, id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn interrupted_settlement_resumes_without_double_finish() {
    let h = harness().await;
    let id = h.accepted().await;
    h.engine.report_completion(&h.bob, id).await.unwrap();

    h.ledger.fail_after(LedgerOp::Finish, 1);
    let err = h.engine.report_completion(&h.alice, id).await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerUnavailable(_)));
    assert_eq!(
        h.engine.get(None, id).await.unwrap().status,
        ContractStatus::Fulfillment
    );
    assert_eq!(h.ledger.applied(LedgerOp::Finish), 1);

    let out = h.engine.report_completion(&h.alice, id).await.unwrap();
    assert_eq!(out.status, ContractStatus::Completed);
    assert_eq!(h.ledger.applied(LedgerOp::Finish), 3);
    assert_eq!(h.ledger.applied(LedgerOp::Cancel), 1);
}

#[tokio::test]
async fn retried_settlement_pays_the_tier_of_the_first_attempt() {
    let h = harness().await;
    let id = h.accepted().await;
    h.drops(1).await;
    h.engine.report_completion(&h.bob, id).await.unwrap();

    h.ledger.fail_after(LedgerOp::Cancel, 0);
    let err = h.engine.report_completion(&h.alice, id).await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerUnavailable(_)));
    assert_eq!(
        states(&h.leg_states(id).await),
        vec![
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Open
        ]
    );

    // A wreck reported between attempts must not change the outcome.
    let reading = Reading::from_deltas(7, 0, 0, None).unwrap();
    let err = h.engine.record_reading(&h.sensor, reading).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));

    let out = h.engine.report_completion(&h.alice, id).await.unwrap();
    assert_eq!(out.status, ContractStatus::Completed);
    assert_eq!(out.message, "completed: 3 of 3 payout legs released, collateral returned to courier");
    assert_eq!(
        states(&h.leg_states(id).await),
        vec![
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Finished,
            EscrowState::Cancelled
        ]
    );
}

#[tokio::test]
async fn unindexed_leg_fails_settlement() {
    let h = harness().await;
    let id = h.accepted().await;
    h.engine.report_completion(&h.bob, id).await.unwrap();

    let (_, base) = h.handles(id).await.remove(0);
    h.ledger.forget(&base);
    let err = h.engine.report_completion(&h.alice, id).await.unwrap_err();
    assert!(matches!(err, EngineError::LedgerUnavailable(_)));
    assert_eq!(
        h.engine.get(None, id).await.unwrap().status,
        ContractStatus::Fulfillment
    );
    assert_eq!(h.ledger.applied(LedgerOp::Finish), 0);
    assert_eq!(h.ledger.applied(LedgerOp::Cancel), 0);
}

// ── Telemetry ────────────────────────────────────────────────────────

#[tokio::test]
async fn readings_need_a_bound_contract() {
    let h = harness().await;
    let reading = Reading::from_deltas(1, 0, 0, None).unwrap();

    let err = h
        .engine
        .record_reading(&SensorId::new("ghost").unwrap(), reading)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = h.engine.record_reading(&h.sensor, reading).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

#[tokio::test]
async fn readings_stop_once_courier_reports() {
    let h = harness().await;
    let id = h.accepted().await;
    h.drops(2).await;
    h.engine.report_completion(&h.bob, id).await.unwrap();

    let reading = Reading::from_deltas(1, 0, 0, None).unwrap();
    let err = h.engine.record_reading(&h.sensor, reading).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

#[tokio::test]
async fn readings_accumulate() {
    let h = harness().await;
    h.accepted().await;
    h.drops(1).await;
    let reading = Reading::from_deltas(2, 1, 3, None).unwrap();
    let t = h.engine.record_reading(&h.sensor, reading).await.unwrap();
    assert_eq!((t.drop_alerts, t.overtemp_alerts, t.water_events), (3, 1, 3));
}

// ── Update / delete / queries ────────────────────────────────────────

#[tokio::test]
async fn only_proposer_updates_open_contract() {
    let h = harness().await;
    let id = h.proposed().await;

    let err = h.engine.update(&h.bob, id, terms("Hijack")).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let view = h.engine.update(&h.alice, id, terms("Renamed")).await.unwrap();
    assert_eq!(view.title, "Renamed");
}

#[tokio::test]
async fn delete_rules() {
    let h = harness().await;
    let id = h.proposed().await;
    let err = h.engine.delete(&h.bob, id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    h.engine.delete(&h.alice, id).await.unwrap();
    assert!(matches!(
        h.engine.get(None, id).await,
        Err(EngineError::NotFound(_))
    ));

    let taken = h.accepted().await;
    let err = h.engine.delete(&h.alice, taken).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn list_mine_covers_both_roles() {
    let h = harness().await;
    h.proposed().await;
    h.accepted().await;

    let alice: Vec<ContractView> = h.engine.list_mine(&h.alice).await.unwrap();
    let bob = h.engine.list_mine(&h.bob).await.unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(bob.len(), 1);
    assert!(h.engine.list_mine(&uid("eve")).await.unwrap().is_empty());
}

#[tokio::test]
async fn escrow_history_shows_direction_and_state() {
    let h = harness().await;
    let id = h.accepted().await;

    let alice = h.engine.list_escrows(&h.alice).await.unwrap();
    assert_eq!(alice.len(), 4);
    let sent = alice
        .iter()
        .filter(|e| e.direction == EscrowDirection::Sent)
        .count();
    assert_eq!(sent, 3);
    assert!(alice.iter().all(|e| e.contract_id == id));
    assert!(alice.iter().all(|e| e.state == EscrowState::Open));

    let bob = h.engine.list_escrows(&h.bob).await.unwrap();
    let collateral = bob.iter().find(|e| e.leg == LegName::Collateral).unwrap();
    assert_eq!(collateral.direction, EscrowDirection::Sent);
    assert_eq!(collateral.amount.units(), 50);
    assert_eq!(collateral.counterparty, h.alice);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = harness().await;
    let err = h
        .engine
        .register_user(h.alice.clone(), Wallet::new("rOther", "sOther"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConflictingWrite(_)));

    let err = h
        .engine
        .register_sensor(&h.alice, h.sensor.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConflictingWrite(_)));
}

// ── Accounts ─────────────────────────────────────────────────────────

#[tokio::test]
async fn account_reports_wallet_balance() {
    let h = harness().await;
    let id = h.accepted().await;
    h.engine.report_completion(&h.bob, id).await.unwrap();
    h.engine.report_completion(&h.alice, id).await.unwrap();

    let alice = h.engine.account(&h.alice).await.unwrap();
    assert_eq!(alice.wallet_address, "rAlice");
    assert_eq!(alice.balance_drops, OPENING_BALANCE_DROPS - 130_000_000);
    let bob = h.engine.account(&h.bob).await.unwrap();
    assert_eq!(bob.balance_drops, OPENING_BALANCE_DROPS + 130_000_000);

    let err = h.engine.account(&uid("eve")).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn unfundable_contract_is_not_accepted() {
    let h = harness().await;
    let mut t = terms("Freighter");
    t.base_price = Amount::new("base_price", 2_000).unwrap();
    let id = h.engine.propose(&h.alice, t).await.unwrap().id;

    let err = h.engine.accept(&h.bob, id, h.sensor.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
    assert_eq!(h.engine.get(None, id).await.unwrap().status, ContractStatus::Open);
}

// ── Concurrency ──────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_accepts_share_one_sensor() {
    let h = harness().await;
    let first = h.proposed().await;
    let second = h.proposed().await;

    let (a, b) = tokio::join!(
        h.engine.accept(&h.bob, first, h.sensor.clone()),
        h.engine.accept(&h.bob, second, h.sensor.clone()),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.into_iter().find_map(Result::err).unwrap();
    assert!(
        matches!(loser, EngineError::SensorBusy(_) | EngineError::ConflictingWrite(_)),
        "unexpected error: {loser:?}"
    );
    assert_eq!(h.engine.list_open(None).await.unwrap().len(), 1);
    assert_eq!(h.ledger.open_escrows_from("rAlice"), 3);
}

/// Memory repository whose award writes can be made to lose the
/// sensor-exclusivity race, as if another transaction bound the sensor
/// after the engine's busy check.
#[derive(Clone, Default)]
struct RacingRepository {
    inner: MemoryRepository,
    lose_race: Arc<AtomicBool>,
}

struct RacingTx {
    inner: MemoryTx,
    lose_race: Arc<AtomicBool>,
}

#[async_trait]
impl ContractRepository for RacingRepository {
    type Tx = RacingTx;

    async fn begin(&self) -> Result<RacingTx, RepositoryError> {
        Ok(RacingTx {
            inner: self.inner.begin().await?,
            lose_race: self.lose_race.clone(),
        })
    }
}

#[async_trait]
impl RepositoryTx for RacingTx {
    async fn insert_user(&mut self, user: &User) -> Result<(), RepositoryError> {
        self.inner.insert_user(user).await
    }
    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.get_user(id).await
    }
    async fn insert_sensor(&mut self, sensor: &Sensor) -> Result<(), RepositoryError> {
        self.inner.insert_sensor(sensor).await
    }
    async fn get_sensor(&mut self, id: &SensorId) -> Result<Option<Sensor>, RepositoryError> {
        self.inner.get_sensor(id).await
    }
    async fn insert_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError> {
        self.inner.insert_contract(contract).await
    }
    async fn get_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        self.inner.get_contract(id).await
    }
    async fn lock_contract(&mut self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        self.inner.lock_contract(id).await
    }
    async fn update_contract(&mut self, contract: &Contract) -> Result<(), RepositoryError> {
        if contract.status == ContractStatus::Fulfillment && self.lose_race.load(Ordering::SeqCst) {
            return Err(RepositoryError::UniqueViolation {
                constraint: ACTIVE_SENSOR_CONSTRAINT.into(),
            });
        }
        self.inner.update_contract(contract).await
    }
    async fn delete_contract(&mut self, id: ContractId) -> Result<bool, RepositoryError> {
        self.inner.delete_contract(id).await
    }
    async fn active_contract_for_sensor(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<Contract>, RepositoryError> {
        self.inner.active_contract_for_sensor(sensor).await
    }
    async fn list_open(&mut self) -> Result<Vec<Contract>, RepositoryError> {
        self.inner.list_open().await
    }
    async fn list_for_party(&mut self, user: &UserId) -> Result<Vec<Contract>, RepositoryError> {
        self.inner.list_for_party(user).await
    }
    async fn get_telemetry(
        &mut self,
        sensor: &SensorId,
    ) -> Result<Option<SensorTelemetry>, RepositoryError> {
        self.inner.get_telemetry(sensor).await
    }
    async fn put_telemetry(&mut self, telemetry: &SensorTelemetry) -> Result<(), RepositoryError> {
        self.inner.put_telemetry(telemetry).await
    }
    async fn commit(self) -> Result<(), RepositoryError> {
        self.inner.commit().await
    }
}

/// Log sink for asserting on emitted events.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn lost_sensor_race_is_a_conflicting_write_with_logged_orphans() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let repo = RacingRepository::default();
    let lose_race = repo.lose_race.clone();
    let ledger = Arc::new(InMemoryLedger::new());
    let engine = ContractEngine::new(repo, ledger.clone());
    let (alice, bob) = (uid("alice"), uid("bob"));
    engine
        .register_user(alice.clone(), Wallet::new("rAlice", "sAlice"))
        .await
        .unwrap();
    engine
        .register_user(bob.clone(), Wallet::new("rBob", "sBob"))
        .await
        .unwrap();
    let sensor = SensorId::new("pi-01").unwrap();
    engine.register_sensor(&bob, sensor.clone()).await.unwrap();
    let id = engine.propose(&alice, terms("Parcel")).await.unwrap().id;

    lose_race.store(true, Ordering::SeqCst);
    let err = engine.accept(&bob, id, sensor).await.unwrap_err();
    assert!(matches!(err, EngineError::ConflictingWrite(_)));
    assert_eq!(engine.get(None, id).await.unwrap().status, ContractStatus::Open);

    // All four legs reached the ledger and every one of them is logged.
    assert_eq!(ledger.open_escrows_from("rAlice"), 3);
    assert_eq!(ledger.open_escrows_from("rBob"), 1);
    let out = logs.contents();
    assert_eq!(out.matches("escrow leg orphaned").count(), 4);
    for seq in 1..=3 {
        assert!(out.contains(&format!("escrow:rAlice/{seq}")), "{out}");
    }
    assert!(out.contains("escrow:rBob/1"), "{out}");
}
