//! # In-Memory Ledger
//!
//! A process-local ledger with the same create/finish/cancel semantics as
//! the real one: per-account transaction sequences, condition checks on
//! finish, and single consumption of every escrow. Claim and cancel
//! windows are recorded but not enforced against the wall clock.
//!
//! Accounts come into existence on first use holding
//! [`OPENING_BALANCE_DROPS`], like a freshly funded testnet wallet.
//! Creating an escrow debits its source; finishing credits the
//! destination and cancelling refunds the source.
//!
//! Tests can schedule failures with [`InMemoryLedger::fail_after`]. Faults
//! count per-leg operations, so a three-leg `finish` whose second leg is
//! scheduled to fail leaves the first leg finished.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use courier_core::{Amount, EscrowHandle, EscrowKind, Timestamp, Wallet};

use crate::condition::{self, PreimageCondition};
use crate::{EscrowLedgerPort, EscrowState, EscrowWindow, LedgerError, LedgerOp};

/// Balance of an account the ledger has not seen before (1000 XRP).
pub const OPENING_BALANCE_DROPS: u64 = 1_000_000_000;

/// One escrow object on the simulated ledger.
#[derive(Debug, Clone)]
pub struct EscrowEntry {
    pub source: String,
    pub destination: String,
    pub drops: u64,
    pub kind: EscrowKind,
    pub condition: String,
    pub window: EscrowWindow,
    pub state: EscrowState,
}

#[derive(Debug)]
struct Fault {
    op: LedgerOp,
    successes_left: usize,
}

#[derive(Debug, Default)]
struct Book {
    sequences: HashMap<String, u32>,
    escrows: HashMap<(String, u32), EscrowEntry>,
    balances: HashMap<String, u64>,
    faults: Vec<Fault>,
    applied: HashMap<LedgerOp, usize>,
}

impl Book {
    /// Consume a scheduled fault for `op`, if one is due.
    fn trip(&mut self, op: LedgerOp) -> Result<(), LedgerError> {
        if let Some(pos) = self.faults.iter().position(|f| f.op == op) {
            if self.faults[pos].successes_left == 0 {
                self.faults.remove(pos);
                return Err(LedgerError::Unavailable {
                    op,
                    reason: "injected failure".into(),
                });
            }
            self.faults[pos].successes_left -= 1;
        }
        Ok(())
    }

    fn next_sequence(&mut self, account: &str) -> u32 {
        let seq = self.sequences.entry(account.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }

    fn open_entry(&mut self, handle: &EscrowHandle) -> Result<&mut EscrowEntry, LedgerError> {
        let entry = self
            .escrows
            .get_mut(&(handle.owner.clone(), handle.sequence))
            .ok_or_else(|| LedgerError::UnknownEscrow {
                escrow: handle.to_string(),
            })?;
        if !entry.state.is_open() {
            return Err(LedgerError::AlreadyConsumed {
                escrow: handle.to_string(),
            });
        }
        Ok(entry)
    }

    fn balance_of(&self, account: &str) -> u64 {
        self.balances.get(account).copied().unwrap_or(OPENING_BALANCE_DROPS)
    }

    fn debit(&mut self, account: &str, drops: u64) -> Result<(), LedgerError> {
        let available = self.balance_of(account);
        let rest = available
            .checked_sub(drops)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                account: account.to_string(),
                needed: drops,
                available,
            })?;
        self.balances.insert(account.to_string(), rest);
        Ok(())
    }

    fn credit(&mut self, account: &str, drops: u64) {
        let next = self.balance_of(account).saturating_add(drops);
        self.balances.insert(account.to_string(), next);
    }

    fn record(&mut self, op: LedgerOp) {
        *self.applied.entry(op).or_default() += 1;
    }
}

/// Simulated escrow ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    book: Mutex<Book>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `successes` more per-leg `op` calls succeed, then fail the next
    /// one. Each call schedules one failure.
    pub fn fail_after(&self, op: LedgerOp, successes: usize) {
        self.book.lock().faults.push(Fault {
            op,
            successes_left: successes,
        });
    }

    /// Drop all scheduled failures.
    pub fn clear_faults(&self) {
        self.book.lock().faults.clear();
    }

    /// Number of per-leg operations of `op` that took effect.
    pub fn applied(&self, op: LedgerOp) -> usize {
        self.book.lock().applied.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of one escrow.
    pub fn entry(&self, handle: &EscrowHandle) -> Option<EscrowEntry> {
        self.book
            .lock()
            .escrows
            .get(&(handle.owner.clone(), handle.sequence))
            .cloned()
    }

    /// Drop an escrow from the book, as a gateway that has not indexed it
    /// yet would. Later status queries report it as unknown.
    pub fn forget(&self, handle: &EscrowHandle) {
        self.book
            .lock()
            .escrows
            .remove(&(handle.owner.clone(), handle.sequence));
    }

    /// Open escrows whose source is `address`.
    pub fn open_escrows_from(&self, address: &str) -> usize {
        self.book
            .lock()
            .escrows
            .values()
            .filter(|e| e.source == address && e.state.is_open())
            .count()
    }
}

#[async_trait]
impl EscrowLedgerPort for InMemoryLedger {
    async fn create(
        &self,
        source: &Wallet,
        destination: &str,
        amounts: &[Amount],
        kind: EscrowKind,
        deadline: Timestamp,
    ) -> Result<Vec<EscrowHandle>, LedgerError> {
        let window = EscrowWindow::for_kind(kind, deadline, Timestamp::now())?;
        let mut book = self.book.lock();
        let mut created = Vec::with_capacity(amounts.len());

        for amount in amounts {
            let leg = book
                .trip(LedgerOp::Create)
                .and_then(|()| {
                    amount.to_drops().ok_or(LedgerError::AmountOverflow {
                        units: amount.units(),
                    })
                })
                .and_then(|drops| book.debit(&source.address, drops).map(|()| drops));
            let drops = match leg {
                Ok(drops) => drops,
                Err(e) if created.is_empty() => return Err(e),
                Err(e) => {
                    return Err(LedgerError::PartialCreate {
                        created,
                        source: Box::new(e),
                    })
                }
            };

            let lock = PreimageCondition::generate();
            let sequence = book.next_sequence(&source.address);
            book.escrows.insert(
                (source.address.clone(), sequence),
                EscrowEntry {
                    source: source.address.clone(),
                    destination: destination.to_string(),
                    drops,
                    kind,
                    condition: lock.condition.clone(),
                    window,
                    state: EscrowState::Open,
                },
            );
            book.record(LedgerOp::Create);
            tracing::debug!(owner = %source.address, sequence, drops, "escrow created");
            created.push(EscrowHandle {
                owner: source.address.clone(),
                sequence,
                condition: lock.condition,
                fulfillment: lock.fulfillment,
            });
        }

        Ok(created)
    }

    async fn finish(
        &self,
        _submitter: &Wallet,
        handles: &[EscrowHandle],
        count: usize,
    ) -> Result<(), LedgerError> {
        let mut book = self.book.lock();
        for handle in handles.iter().take(count) {
            book.trip(LedgerOp::Finish)?;
            let entry = book.open_entry(handle)?;
            if !condition::verify(&entry.condition, &handle.fulfillment) {
                return Err(LedgerError::InvalidFulfillment {
                    escrow: handle.to_string(),
                });
            }
            entry.state = EscrowState::Finished;
            let (destination, drops) = (entry.destination.clone(), entry.drops);
            book.credit(&destination, drops);
            book.record(LedgerOp::Finish);
            tracing::debug!(escrow = %handle, "escrow finished");
        }
        Ok(())
    }

    async fn cancel(&self, _submitter: &Wallet, handle: &EscrowHandle) -> Result<(), LedgerError> {
        let mut book = self.book.lock();
        book.trip(LedgerOp::Cancel)?;
        let entry = book.open_entry(handle)?;
        entry.state = EscrowState::Cancelled;
        let (source, drops) = (entry.source.clone(), entry.drops);
        book.credit(&source, drops);
        book.record(LedgerOp::Cancel);
        tracing::debug!(escrow = %handle, "escrow cancelled");
        Ok(())
    }

    async fn status(&self, handle: &EscrowHandle) -> Result<EscrowState, LedgerError> {
        let mut book = self.book.lock();
        book.trip(LedgerOp::Status)?;
        Ok(book
            .escrows
            .get(&(handle.owner.clone(), handle.sequence))
            .map(|e| e.state)
            .unwrap_or(EscrowState::Unknown))
    }

    async fn balance(&self, address: &str) -> Result<u64, LedgerError> {
        let mut book = self.book.lock();
        book.trip(LedgerOp::Balance)?;
        Ok(book.balance_of(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(values: &[i64]) -> Vec<Amount> {
        values.iter().map(|v| Amount::new("x", *v).unwrap()).collect()
    }

    fn alice() -> Wallet {
        Wallet::new("rAlice", "sAlice")
    }

    fn deadline() -> Timestamp {
        Timestamp::now().plus_secs(3600)
    }

    #[tokio::test]
    async fn create_assigns_sequential_handles() {
        let ledger = InMemoryLedger::new();
        let handles = ledger
            .create(&alice(), "rBob", &amounts(&[10, 5, 1]), EscrowKind::Standard, deadline())
            .await
            .unwrap();
        let seqs: Vec<u32> = handles.iter().map(|h| h.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(handles.iter().all(|h| h.owner == "rAlice"));
        let entry = ledger.entry(&handles[0]).unwrap();
        assert_eq!(entry.drops, 10_000_000);
        assert_eq!(entry.destination, "rBob");
        assert_eq!(ledger.open_escrows_from("rAlice"), 3);
    }

    #[tokio::test]
    async fn collateral_window_is_short() {
        let ledger = InMemoryLedger::new();
        let h = ledger
            .create(&alice(), "rBob", &amounts(&[1]), EscrowKind::Collateral, deadline())
            .await
            .unwrap();
        let w = ledger.entry(&h[0]).unwrap().window;
        assert_eq!(w.cancel_after.epoch_secs() - w.finish_after.epoch_secs(), 5);
    }

    #[tokio::test]
    async fn finish_consumes_only_first_count() {
        let ledger = InMemoryLedger::new();
        let h = ledger
            .create(&alice(), "rBob", &amounts(&[1, 2, 3]), EscrowKind::Standard, deadline())
            .await
            .unwrap();
        ledger.finish(&alice(), &h, 2).await.unwrap();
        assert_eq!(ledger.status(&h[0]).await.unwrap(), EscrowState::Finished);
        assert_eq!(ledger.status(&h[1]).await.unwrap(), EscrowState::Finished);
        assert_eq!(ledger.status(&h[2]).await.unwrap(), EscrowState::Open);
    }

    #[tokio::test]
    async fn double_consumption_rejected() {
        let ledger = InMemoryLedger::new();
        let h = ledger
            .create(&alice(), "rBob", &amounts(&[1]), EscrowKind::Collateral, deadline())
            .await
            .unwrap();
        ledger.cancel(&alice(), &h[0]).await.unwrap();
        assert!(matches!(
            ledger.cancel(&alice(), &h[0]).await,
            Err(LedgerError::AlreadyConsumed { .. })
        ));
        assert!(matches!(
            ledger.finish(&alice(), &h, 1).await,
            Err(LedgerError::AlreadyConsumed { .. })
        ));
    }

    #[tokio::test]
    async fn wrong_fulfillment_rejected() {
        let ledger = InMemoryLedger::new();
        let mut h = ledger
            .create(&alice(), "rBob", &amounts(&[1, 1]), EscrowKind::Standard, deadline())
            .await
            .unwrap();
        h[0].fulfillment = h[1].fulfillment.clone();
        assert!(matches!(
            ledger.finish(&alice(), &h, 1).await,
            Err(LedgerError::InvalidFulfillment { .. })
        ));
        assert_eq!(ledger.status(&h[0]).await.unwrap(), EscrowState::Open);
    }

    #[tokio::test]
    async fn unknown_escrow_status() {
        let ledger = InMemoryLedger::new();
        let ghost = EscrowHandle {
            owner: "rNobody".into(),
            sequence: 9,
            condition: String::new(),
            fulfillment: String::new(),
        };
        assert_eq!(ledger.status(&ghost).await.unwrap(), EscrowState::Unknown);
    }

    #[tokio::test]
    async fn injected_create_failure_reports_partial_legs() {
        let ledger = InMemoryLedger::new();
        ledger.fail_after(LedgerOp::Create, 1);
        let err = ledger
            .create(&alice(), "rBob", &amounts(&[1, 2, 3]), EscrowKind::Standard, deadline())
            .await
            .unwrap_err();
        assert_eq!(err.orphaned_handles().len(), 1);
        assert_eq!(ledger.applied(LedgerOp::Create), 1);
    }

    #[tokio::test]
    async fn injected_failure_on_first_leg_is_plain() {
        let ledger = InMemoryLedger::new();
        ledger.fail_after(LedgerOp::Create, 0);
        let err = ledger
            .create(&alice(), "rBob", &amounts(&[1]), EscrowKind::Standard, deadline())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable { op: LedgerOp::Create, .. }));
        // One-shot: the next call succeeds.
        assert!(ledger
            .create(&alice(), "rBob", &amounts(&[1]), EscrowKind::Standard, deadline())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn injected_finish_failure_keeps_earlier_legs() {
        let ledger = InMemoryLedger::new();
        let h = ledger
            .create(&alice(), "rBob", &amounts(&[1, 2, 3]), EscrowKind::Standard, deadline())
            .await
            .unwrap();
        ledger.fail_after(LedgerOp::Finish, 1);
        assert!(ledger.finish(&alice(), &h, 3).await.is_err());
        assert_eq!(ledger.status(&h[0]).await.unwrap(), EscrowState::Finished);
        assert_eq!(ledger.status(&h[1]).await.unwrap(), EscrowState::Open);
        assert_eq!(ledger.applied(LedgerOp::Finish), 1);
    }

    #[tokio::test]
    async fn escrows_move_balances() {
        let ledger = InMemoryLedger::new();
        let h = ledger
            .create(&alice(), "rBob", &amounts(&[10, 5]), EscrowKind::Standard, deadline())
            .await
            .unwrap();
        assert_eq!(ledger.balance("rAlice").await.unwrap(), OPENING_BALANCE_DROPS - 15_000_000);

        ledger.finish(&alice(), &h, 1).await.unwrap();
        ledger.cancel(&alice(), &h[1]).await.unwrap();
        assert_eq!(ledger.balance("rBob").await.unwrap(), OPENING_BALANCE_DROPS + 10_000_000);
        assert_eq!(ledger.balance("rAlice").await.unwrap(), OPENING_BALANCE_DROPS - 10_000_000);
    }

    #[tokio::test]
    async fn create_beyond_balance_is_rejected() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .create(&alice(), "rBob", &amounts(&[600, 600]), EscrowKind::Standard, deadline())
            .await
            .unwrap_err();
        assert_eq!(err.orphaned_handles().len(), 1);
        assert_eq!(ledger.balance("rAlice").await.unwrap(), OPENING_BALANCE_DROPS - 600_000_000);
    }

    #[tokio::test]
    async fn forgotten_escrow_reads_unknown() {
        let ledger = InMemoryLedger::new();
        let h = ledger
            .create(&alice(), "rBob", &amounts(&[1]), EscrowKind::Standard, deadline())
            .await
            .unwrap();
        ledger.forget(&h[0]);
        assert_eq!(ledger.status(&h[0]).await.unwrap(), EscrowState::Unknown);
    }
}
