use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::{BankLedger, ReceivableStore, ReconciliationStore};
use crate::error::{AppError, AppResult, ReconciliationError, SettlementError};
use crate::ledger::models::{BankAccount, LedgerEntryRequest, PostingReceipt};
use crate::receivables::models::{
    is_receivable_payment_method, LedgerPostingStatus, Receivable, ReceivableStatus,
};
use crate::reconciliation::models::{NewReconciliation, ReconciliationRecord, ReconciliationUpdate};

/// Receivable store held in process memory
pub struct InMemoryReceivableStore {
    receivables: RwLock<HashMap<Uuid, Receivable>>,
}

impl InMemoryReceivableStore {
    pub fn new() -> Self {
        Self {
            receivables: RwLock::new(HashMap::new()),
        }
    }

    /// Record a receivable as the order subsystem would
    pub async fn insert(&self, receivable: Receivable) -> Receivable {
        let mut receivables = self.receivables.write().await;
        receivables.insert(receivable.id, receivable.clone());
        receivable
    }
}

impl Default for InMemoryReceivableStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReceivableStore for InMemoryReceivableStore {
    async fn fetch_receivables(&self, branch_id: Option<Uuid>) -> AppResult<Vec<Receivable>> {
        let receivables = self.receivables.read().await;
        let mut rows: Vec<Receivable> = receivables
            .values()
            .filter(|r| is_receivable_payment_method(&r.payment_method))
            .filter(|r| branch_id.is_none() || r.branch_id == branch_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }

    async fn get_receivable(&self, id: Uuid) -> AppResult<Option<Receivable>> {
        let receivables = self.receivables.read().await;
        Ok(receivables.get(&id).cloned())
    }

    async fn mark_settled(
        &self,
        id: Uuid,
        expected_version: i64,
        net_amount: Decimal,
        settled_by: Option<Uuid>,
    ) -> AppResult<Receivable> {
        let mut receivables = self.receivables.write().await;
        let receivable = receivables
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Receivable {} not found", id)))?;

        if receivable.status == ReceivableStatus::Settled {
            return Err(SettlementError::AlreadySettled(id).into());
        }
        if receivable.version != expected_version {
            return Err(AppError::Conflict {
                entity: "receivable",
                id,
                expected_version,
            });
        }

        let now = Utc::now();
        receivable.status = ReceivableStatus::Settled;
        receivable.net_amount = Some(net_amount);
        receivable.settled_at = Some(now);
        receivable.settled_by = settled_by;
        receivable.ledger_status = LedgerPostingStatus::Pending;
        receivable.version += 1;
        receivable.updated_at = now;

        Ok(receivable.clone())
    }

    async fn set_ledger_status(&self, id: Uuid, status: LedgerPostingStatus) -> AppResult<()> {
        let mut receivables = self.receivables.write().await;
        let receivable = receivables
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Receivable {} not found", id)))?;

        receivable.ledger_status = status;
        receivable.version += 1;
        receivable.updated_at = Utc::now();
        Ok(())
    }

    async fn fetch_unposted_settlements(&self) -> AppResult<Vec<Receivable>> {
        let receivables = self.receivables.read().await;
        let mut rows: Vec<Receivable> = receivables
            .values()
            .filter(|r| r.is_settled() && r.ledger_status.needs_retry())
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.settled_at);
        Ok(rows)
    }
}

/// Reconciliation store held in process memory
pub struct InMemoryReconciliationStore {
    records: RwLock<HashMap<Uuid, ReconciliationRecord>>,
}

impl InMemoryReconciliationStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a record as the deposit import would
    pub async fn insert(&self, record: ReconciliationRecord) -> ReconciliationRecord {
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        record
    }

    pub async fn get(&self, id: Uuid) -> Option<ReconciliationRecord> {
        self.records.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryReconciliationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryReconciliationStore {
    async fn fetch_reconciliations(
        &self,
        branch_id: Option<Uuid>,
    ) -> AppResult<Vec<ReconciliationRecord>> {
        let records = self.records.read().await;
        let mut rows: Vec<ReconciliationRecord> = records
            .values()
            .filter(|r| branch_id.is_none() || r.branch_id == branch_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.sale_date
                .cmp(&a.sale_date)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(rows)
    }

    async fn find_linked(
        &self,
        receivable_id: Uuid,
        order_reference: Option<&str>,
    ) -> AppResult<Option<ReconciliationRecord>> {
        let records = self.records.read().await;

        if let Some(record) = records
            .values()
            .find(|r| r.receivable_id == Some(receivable_id))
        {
            return Ok(Some(record.clone()));
        }

        let Some(order) = order_reference else {
            return Ok(None);
        };

        let mut matches = records
            .values()
            .filter(|r| r.order_reference.as_deref() == Some(order));
        let first = matches.next();
        if matches.next().is_some() {
            return Err(ReconciliationError::DuplicateOrderReference(order.to_string()).into());
        }

        Ok(first.cloned())
    }

    async fn create_reconciliation(
        &self,
        record: NewReconciliation,
    ) -> AppResult<ReconciliationRecord> {
        let mut records = self.records.write().await;

        if let Some(order) = record.order_reference.as_deref() {
            if records
                .values()
                .any(|r| r.order_reference.as_deref() == Some(order))
            {
                return Err(ReconciliationError::DuplicateOrderReference(order.to_string()).into());
            }
        }
        if let Some(receivable_id) = record.receivable_id {
            if records
                .values()
                .any(|r| r.receivable_id == Some(receivable_id))
            {
                return Err(AppError::Validation(format!(
                    "Receivable {} already has a reconciliation record",
                    receivable_id
                )));
            }
        }

        let created = record.into_record(Uuid::new_v4(), Utc::now());
        records.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_reconciliation(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ReconciliationUpdate,
    ) -> AppResult<ReconciliationRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Reconciliation {} not found", id)))?;

        if record.version != expected_version {
            return Err(AppError::Conflict {
                entity: "reconciliation",
                id,
                expected_version,
            });
        }

        record.received_net = Some(update.received_net);
        record.deposit_date = Some(update.deposit_date);
        record.status = update.status;
        record.version += 1;
        record.updated_at = Utc::now();

        Ok(record.clone())
    }
}

/// Bank ledger held in process memory; keeps every posted entry
pub struct InMemoryBankLedger {
    accounts: RwLock<Vec<BankAccount>>,
    entries: RwLock<Vec<LedgerEntryRequest>>,
}

impl InMemoryBankLedger {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_account(&self, branch_id: Option<Uuid>, name: &str, is_active: bool) -> BankAccount {
        let account = BankAccount {
            id: Uuid::new_v4(),
            branch_id,
            name: name.to_string(),
            is_active,
        };
        self.accounts.write().await.push(account.clone());
        account
    }

    pub async fn entries(&self) -> Vec<LedgerEntryRequest> {
        self.entries.read().await.clone()
    }
}

impl Default for InMemoryBankLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BankLedger for InMemoryBankLedger {
    async fn find_active_account(&self, branch_id: Option<Uuid>) -> AppResult<Option<BankAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .iter()
            .find(|a| a.is_active && a.branch_id == branch_id)
            .cloned())
    }

    async fn post_entry(&self, entry: LedgerEntryRequest) -> AppResult<PostingReceipt> {
        let accounts = self.accounts.read().await;
        if !accounts.iter().any(|a| a.id == entry.account_id) {
            return Err(AppError::LedgerPosting(format!(
                "Unknown bank account {}",
                entry.account_id
            )));
        }
        drop(accounts);

        let mut entries = self.entries.write().await;
        if entries
            .iter()
            .any(|e| e.receivable_id == entry.receivable_id && e.category == entry.category)
        {
            return Ok(PostingReceipt::AlreadyPosted);
        }
        entries.push(entry);
        Ok(PostingReceipt::Posted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::models::ReconciliationStatus;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_receivables_filters_and_orders() {
        let store = InMemoryReceivableStore::new();
        let branch = Uuid::new_v4();
        store
            .insert(Receivable::new("late", dec!(10), dec!(1), date(2024, 6, 9), "debito").with_branch(branch))
            .await;
        store
            .insert(Receivable::new("early", dec!(10), dec!(1), date(2024, 6, 1), "pix_maquininha").with_branch(branch))
            .await;
        store
            .insert(Receivable::new("cash", dec!(10), dec!(0), date(2024, 6, 2), "dinheiro").with_branch(branch))
            .await;
        store
            .insert(Receivable::new("elsewhere", dec!(10), dec!(1), date(2024, 6, 3), "credito"))
            .await;

        let rows = store.fetch_receivables(Some(branch)).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);

        let all = store.fetch_receivables(None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_mark_settled_checks_version_and_status() {
        let store = InMemoryReceivableStore::new();
        let receivable = store
            .insert(Receivable::new("sale", dec!(10), dec!(1), date(2024, 6, 1), "debito"))
            .await;

        let stale = store.mark_settled(receivable.id, 7, dec!(9), None).await;
        assert!(matches!(stale, Err(AppError::Conflict { .. })));

        let settled = store.mark_settled(receivable.id, 0, dec!(9), None).await.unwrap();
        assert_eq!(settled.status, ReceivableStatus::Settled);
        assert_eq!(settled.ledger_status, LedgerPostingStatus::Pending);
        assert_eq!(settled.version, 1);

        let again = store.mark_settled(receivable.id, 1, dec!(9), None).await;
        assert!(matches!(
            again,
            Err(AppError::Settlement(SettlementError::AlreadySettled(_)))
        ));
    }

    #[tokio::test]
    async fn test_order_reference_uniqueness_enforced_on_create() {
        let store = InMemoryReconciliationStore::new();
        let receivable = Receivable::new("sale", dec!(10), dec!(1), date(2024, 6, 1), "debito")
            .with_order_reference("ORD9");
        let new = NewReconciliation::from_receivable(
            &receivable,
            dec!(9),
            date(2024, 6, 2),
            ReconciliationStatus::Confirmed,
        );

        store.create_reconciliation(new.clone()).await.unwrap();
        let mut duplicate = new;
        duplicate.receivable_id = None;
        let err = store.create_reconciliation(duplicate).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Reconciliation(ReconciliationError::DuplicateOrderReference(ref o)) if o == "ORD9"
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_linked_reports_imported_duplicates() {
        let store = InMemoryReconciliationStore::new();
        let receivable = Receivable::new("sale", dec!(10), dec!(1), date(2024, 6, 1), "debito")
            .with_order_reference("ORD3");
        for _ in 0..2 {
            let mut imported = NewReconciliation::from_receivable(
                &receivable,
                dec!(9),
                date(2024, 6, 2),
                ReconciliationStatus::Unreconciled,
            );
            imported.receivable_id = None;
            store
                .insert(imported.into_record(Uuid::new_v4(), Utc::now()))
                .await;
        }

        let err = store
            .find_linked(receivable.id, Some("ORD3"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Reconciliation(ReconciliationError::DuplicateOrderReference(_))
        ));
    }

    #[tokio::test]
    async fn test_ledger_account_lookup_is_per_branch_and_active_only() {
        let ledger = InMemoryBankLedger::new();
        let branch = Uuid::new_v4();
        ledger.add_account(Some(branch), "closed", false).await;
        let active = ledger.add_account(Some(branch), "main", true).await;
        ledger.add_account(None, "head office", true).await;

        let found = ledger.find_active_account(Some(branch)).await.unwrap();
        assert_eq!(found, Some(active));
        assert!(ledger
            .find_active_account(Some(Uuid::new_v4()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_post_entry_credits_each_receivable_once() {
        let ledger = InMemoryBankLedger::new();
        let account = ledger.add_account(None, "main", true).await;
        let entry = LedgerEntryRequest {
            receivable_id: Uuid::new_v4(),
            account_id: account.id,
            amount: dec!(99.91),
            description: "Card receivable: sale".to_string(),
            category: "card_receivable_settlement".to_string(),
            branch_id: None,
            user_id: None,
            order_reference: Some("ORD1".to_string()),
        };

        assert_eq!(ledger.post_entry(entry.clone()).await.unwrap(), PostingReceipt::Posted);
        assert_eq!(
            ledger.post_entry(entry.clone()).await.unwrap(),
            PostingReceipt::AlreadyPosted
        );

        let mut other_category = entry;
        other_category.category = "adjustment".to_string();
        assert_eq!(
            ledger.post_entry(other_category).await.unwrap(),
            PostingReceipt::Posted
        );
        assert_eq!(ledger.entries().await.len(), 2);
    }
}
