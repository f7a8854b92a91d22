use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppResult;
use crate::ledger::models::{BankAccount, LedgerEntryRequest, PostingReceipt};
use crate::receivables::models::{LedgerPostingStatus, Receivable};
use crate::reconciliation::models::{NewReconciliation, ReconciliationRecord, ReconciliationUpdate};

/// Receivable storage. Rows are created by the order subsystem; this engine
/// only reads them and moves them to settled.
#[async_trait]
pub trait ReceivableStore: Send + Sync {
    /// Card/terminal receivables, optionally restricted to a branch,
    /// ordered by due date ascending.
    async fn fetch_receivables(&self, branch_id: Option<Uuid>) -> AppResult<Vec<Receivable>>;

    async fn get_receivable(&self, id: Uuid) -> AppResult<Option<Receivable>>;

    /// Compare-and-swap `pending -> settled` on `expected_version`, storing the
    /// realized net amount, the settling user and a `pending` ledger status.
    async fn mark_settled(
        &self,
        id: Uuid,
        expected_version: i64,
        net_amount: Decimal,
        settled_by: Option<Uuid>,
    ) -> AppResult<Receivable>;

    async fn set_ledger_status(&self, id: Uuid, status: LedgerPostingStatus) -> AppResult<()>;

    /// Settled receivables whose ledger posting still needs attention
    async fn fetch_unposted_settlements(&self) -> AppResult<Vec<Receivable>>;
}

/// Reconciliation record storage
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Records ordered by sale date descending
    async fn fetch_reconciliations(
        &self,
        branch_id: Option<Uuid>,
    ) -> AppResult<Vec<ReconciliationRecord>>;

    /// The record linked to a receivable: by back-reference first, then by
    /// order reference. More than one record on the same order reference is a
    /// `DuplicateOrderReference` error.
    async fn find_linked(
        &self,
        receivable_id: Uuid,
        order_reference: Option<&str>,
    ) -> AppResult<Option<ReconciliationRecord>>;

    /// Insert a record. Rejects an order reference that is already linked.
    async fn create_reconciliation(&self, record: NewReconciliation)
        -> AppResult<ReconciliationRecord>;

    /// Compare-and-swap update on `expected_version`
    async fn update_reconciliation(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ReconciliationUpdate,
    ) -> AppResult<ReconciliationRecord>;
}

/// Bank-account service as seen from settlement: find where to credit and
/// post the credit. Balances and history belong to the other side.
#[async_trait]
pub trait BankLedger: Send + Sync {
    /// First active account of the branch, if any
    async fn find_active_account(&self, branch_id: Option<Uuid>) -> AppResult<Option<BankAccount>>;

    /// Post a credit. Idempotent on `(receivable_id, category)`: a repeated
    /// request returns `AlreadyPosted` and leaves the balance alone.
    async fn post_entry(&self, entry: LedgerEntryRequest) -> AppResult<PostingReceipt>;
}
