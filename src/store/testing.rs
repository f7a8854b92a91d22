//! Test doubles that fail on demand around the in-memory stores.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::memory::{InMemoryReceivableStore, InMemoryReconciliationStore};
use super::traits::{BankLedger, ReceivableStore, ReconciliationStore};
use crate::error::{AppError, AppResult};
use crate::ledger::models::{BankAccount, LedgerEntryRequest, PostingReceipt};
use crate::receivables::models::{LedgerPostingStatus, Receivable};
use crate::reconciliation::models::{NewReconciliation, ReconciliationRecord, ReconciliationUpdate};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write_failure() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

/// Fails `mark_settled` for the configured receivable ids, and every
/// `set_ledger_status` when `fail_status_writes` is set
pub struct FlakyReceivableStore {
    pub inner: Arc<InMemoryReceivableStore>,
    pub fail_ids: HashSet<Uuid>,
    pub fail_status_writes: bool,
}

#[async_trait]
impl ReceivableStore for FlakyReceivableStore {
    async fn fetch_receivables(&self, branch_id: Option<Uuid>) -> AppResult<Vec<Receivable>> {
        self.inner.fetch_receivables(branch_id).await
    }

    async fn get_receivable(&self, id: Uuid) -> AppResult<Option<Receivable>> {
        self.inner.get_receivable(id).await
    }

    async fn mark_settled(
        &self,
        id: Uuid,
        expected_version: i64,
        net_amount: Decimal,
        settled_by: Option<Uuid>,
    ) -> AppResult<Receivable> {
        if self.fail_ids.contains(&id) {
            return Err(write_failure());
        }
        self.inner
            .mark_settled(id, expected_version, net_amount, settled_by)
            .await
    }

    async fn set_ledger_status(&self, id: Uuid, status: LedgerPostingStatus) -> AppResult<()> {
        if self.fail_status_writes {
            return Err(write_failure());
        }
        self.inner.set_ledger_status(id, status).await
    }

    async fn fetch_unposted_settlements(&self) -> AppResult<Vec<Receivable>> {
        self.inner.fetch_unposted_settlements().await
    }
}

/// Fails creates and updates that belong to the configured receivable ids
pub struct FlakyReconciliationStore {
    pub inner: Arc<InMemoryReconciliationStore>,
    pub fail_receivable_ids: HashSet<Uuid>,
}

#[async_trait]
impl ReconciliationStore for FlakyReconciliationStore {
    async fn fetch_reconciliations(
        &self,
        branch_id: Option<Uuid>,
    ) -> AppResult<Vec<ReconciliationRecord>> {
        self.inner.fetch_reconciliations(branch_id).await
    }

    async fn find_linked(
        &self,
        receivable_id: Uuid,
        order_reference: Option<&str>,
    ) -> AppResult<Option<ReconciliationRecord>> {
        self.inner.find_linked(receivable_id, order_reference).await
    }

    async fn create_reconciliation(
        &self,
        record: NewReconciliation,
    ) -> AppResult<ReconciliationRecord> {
        if record
            .receivable_id
            .is_some_and(|id| self.fail_receivable_ids.contains(&id))
        {
            return Err(write_failure());
        }
        self.inner.create_reconciliation(record).await
    }

    async fn update_reconciliation(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ReconciliationUpdate,
    ) -> AppResult<ReconciliationRecord> {
        let linked_to_failing = self
            .inner
            .get(id)
            .await
            .and_then(|r| r.receivable_id)
            .is_some_and(|rid| self.fail_receivable_ids.contains(&rid));
        if linked_to_failing {
            return Err(write_failure());
        }
        self.inner.update_reconciliation(id, expected_version, update).await
    }
}

/// Resolves a fixed account but rejects every posting, counting attempts
pub struct RejectingBankLedger {
    pub account: BankAccount,
    pub attempts: AtomicUsize,
}

impl RejectingBankLedger {
    pub fn new(branch_id: Option<Uuid>) -> Self {
        Self {
            account: BankAccount {
                id: Uuid::new_v4(),
                branch_id,
                name: "main".to_string(),
                is_active: true,
            },
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BankLedger for RejectingBankLedger {
    async fn find_active_account(&self, _branch_id: Option<Uuid>) -> AppResult<Option<BankAccount>> {
        Ok(Some(self.account.clone()))
    }

    async fn post_entry(&self, _entry: LedgerEntryRequest) -> AppResult<PostingReceipt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::LedgerPosting("bank service unavailable".to_string()))
    }
}
