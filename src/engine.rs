use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{BatchOperation, BatchReport, BatchRunner};
use crate::error::AppResult;
use crate::receivables::models::Receivable;
use crate::reconciliation::matcher::{find_duplicate_order_references, match_receivables};
use crate::reconciliation::models::{ReconciliationRecord, UnifiedRow};
use crate::reconciliation::writer::ReconciliationWriter;
use crate::settlement::orchestrator::{SettlementOrchestrator, SettlementOutcome};
use crate::store::{BankLedger, ReceivableStore, ReconciliationStore};

/// Entry point used by the host application: one instance per store set
pub struct ReceivablesEngine {
    receivables: Arc<dyn ReceivableStore>,
    reconciliations: Arc<dyn ReconciliationStore>,
    writer: Arc<ReconciliationWriter>,
    orchestrator: Arc<SettlementOrchestrator>,
    runner: BatchRunner,
}

impl ReceivablesEngine {
    pub fn new(
        receivables: Arc<dyn ReceivableStore>,
        reconciliations: Arc<dyn ReconciliationStore>,
        ledger: Arc<dyn BankLedger>,
        settlement_category: impl Into<String>,
    ) -> Self {
        let writer = Arc::new(ReconciliationWriter::new(reconciliations.clone()));
        let orchestrator = Arc::new(SettlementOrchestrator::new(
            receivables.clone(),
            ledger,
            settlement_category,
        ));
        let runner = BatchRunner::new(receivables.clone(), writer.clone(), orchestrator.clone());

        Self {
            receivables,
            reconciliations,
            writer,
            orchestrator,
            runner,
        }
    }

    pub fn orchestrator(&self) -> Arc<SettlementOrchestrator> {
        self.orchestrator.clone()
    }

    /// Load both stores together and join them into view rows
    pub async fn load_view(
        &self,
        branch_id: Option<Uuid>,
        today: NaiveDate,
    ) -> AppResult<Vec<UnifiedRow>> {
        let (receivables, reconciliations) = tokio::try_join!(
            self.receivables.fetch_receivables(branch_id),
            self.reconciliations.fetch_reconciliations(branch_id),
        )?;

        let duplicates = find_duplicate_order_references(&reconciliations);
        if !duplicates.is_empty() {
            warn!(
                order_references = ?duplicates,
                "⚠️  Reconciliation records share order references; showing the last fetched record"
            );
        }

        Ok(match_receivables(&receivables, &reconciliations, today))
    }

    pub async fn reconcile(
        &self,
        receivable: &Receivable,
        received_net: Decimal,
        deposit_date: NaiveDate,
    ) -> AppResult<ReconciliationRecord> {
        self.writer
            .reconcile(receivable, received_net, deposit_date)
            .await
    }

    pub async fn reconcile_many(&self, receivables: &[Receivable]) -> BatchReport {
        self.writer.reconcile_many(receivables).await
    }

    pub async fn settle(&self, receivable: &Receivable) -> AppResult<SettlementOutcome> {
        self.orchestrator.settle(receivable).await
    }

    pub async fn settle_as(
        &self,
        receivable: &Receivable,
        user_id: Uuid,
    ) -> AppResult<SettlementOutcome> {
        self.orchestrator.settle_as(receivable, Some(user_id)).await
    }

    pub async fn run_batch(&self, ids: &[Uuid], operation: BatchOperation) -> BatchReport {
        let report = self.runner.run_batch(ids, operation).await;
        info!(summary = %report.summary(), "Batch finished");
        report
    }
}
