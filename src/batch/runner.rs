use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{BatchReport, ItemOutcome};
use crate::error::{AppError, AppResult};
use crate::reconciliation::writer::ReconciliationWriter;
use crate::settlement::orchestrator::SettlementOrchestrator;
use crate::store::ReceivableStore;

/// Operation applied to every item of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOperation {
    /// Reconcile at the expected net amount (skips confirmed records)
    Reconcile,
    /// Settle (skips receivables already settled)
    Settle,
}

/// Emitted after each item when a progress channel is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub receivable_id: Uuid,
    pub outcome: ItemOutcome,
    pub processed: usize,
    pub total: usize,
}

/// Runs an operation over a set of receivables, one item at a time.
///
/// Item `i` is fully applied before item `i + 1` starts. Per-item errors are
/// logged and counted; `run_batch` itself never fails.
pub struct BatchRunner {
    receivables: Arc<dyn ReceivableStore>,
    writer: Arc<ReconciliationWriter>,
    orchestrator: Arc<SettlementOrchestrator>,
    cancel: Option<watch::Receiver<bool>>,
    progress: Option<mpsc::UnboundedSender<BatchProgress>>,
}

impl BatchRunner {
    pub fn new(
        receivables: Arc<dyn ReceivableStore>,
        writer: Arc<ReconciliationWriter>,
        orchestrator: Arc<SettlementOrchestrator>,
    ) -> Self {
        Self {
            receivables,
            writer,
            orchestrator,
            cancel: None,
            progress: None,
        }
    }

    /// Stop between items once the watched value turns `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<BatchProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub async fn run_batch(&self, ids: &[Uuid], operation: BatchOperation) -> BatchReport {
        info!(items = ids.len(), operation = ?operation, "🔄 Starting batch");
        let mut report = BatchReport::default();

        for (index, id) in ids.iter().enumerate() {
            if self.is_cancelled() {
                warn!(
                    processed = index,
                    remaining = ids.len() - index,
                    "Batch cancelled between items"
                );
                report.cancelled = true;
                break;
            }

            let outcome = match self.apply(*id, operation).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(receivable_id = %id, operation = ?operation, error = %e, "❌ Batch item failed");
                    ItemOutcome::Failed
                }
            };
            report.record(outcome);

            if let Some(progress) = &self.progress {
                // receiver may be gone; progress is advisory
                let _ = progress.send(BatchProgress {
                    receivable_id: *id,
                    outcome,
                    processed: index + 1,
                    total: ids.len(),
                });
            }
        }

        info!(
            succeeded = report.success_count,
            failed = report.failure_count,
            skipped = report.skipped_count,
            cancelled = report.cancelled,
            "✓ Batch completed"
        );
        report
    }

    async fn apply(&self, id: Uuid, operation: BatchOperation) -> AppResult<ItemOutcome> {
        let receivable = self
            .receivables
            .get_receivable(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Receivable {} not found", id)))?;

        match operation {
            BatchOperation::Settle => {
                if receivable.is_settled() {
                    return Ok(ItemOutcome::Skipped);
                }
                self.orchestrator.settle(&receivable).await?;
                Ok(ItemOutcome::Applied)
            }
            BatchOperation::Reconcile => self.writer.reconcile_at_expected(&receivable).await,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::DEFAULT_SETTLEMENT_CATEGORY;
    use crate::receivables::models::{Receivable, ReceivableStatus};
    use crate::reconciliation::models::ReconciliationStatus;
    use crate::store::testing::{date, FlakyReceivableStore};
    use crate::store::{
        InMemoryBankLedger, InMemoryReceivableStore, InMemoryReconciliationStore,
        ReconciliationStore,
    };
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    struct Fixture {
        receivables: Arc<InMemoryReceivableStore>,
        reconciliations: Arc<InMemoryReconciliationStore>,
        ledger: Arc<InMemoryBankLedger>,
        ids: Vec<Uuid>,
    }

    async fn fixture(count: usize) -> Fixture {
        let receivables = Arc::new(InMemoryReceivableStore::new());
        let reconciliations = Arc::new(InMemoryReconciliationStore::new());
        let ledger = Arc::new(InMemoryBankLedger::new());
        let branch = Uuid::new_v4();
        ledger.add_account(Some(branch), "main", true).await;

        let mut ids = Vec::new();
        for i in 0..count {
            let receivable = receivables
                .insert(
                    Receivable::new(format!("item {}", i), dec!(100), dec!(2.5), date(2024, 6, 1), "cartao_debito")
                        .with_order_reference(format!("ORD{}", i))
                        .with_branch(branch),
                )
                .await;
            ids.push(receivable.id);
        }

        Fixture {
            receivables,
            reconciliations,
            ledger,
            ids,
        }
    }

    fn runner_over(store: Arc<dyn ReceivableStore>, f: &Fixture) -> BatchRunner {
        let writer = Arc::new(ReconciliationWriter::new(f.reconciliations.clone()));
        let orchestrator = Arc::new(SettlementOrchestrator::new(
            store.clone(),
            f.ledger.clone(),
            DEFAULT_SETTLEMENT_CATEGORY,
        ));
        BatchRunner::new(store, writer, orchestrator)
    }

    #[tokio::test]
    async fn test_settle_batch_survives_one_failure() {
        let f = fixture(5).await;
        let store = Arc::new(FlakyReceivableStore {
            inner: f.receivables.clone(),
            fail_ids: HashSet::from([f.ids[2]]),
            fail_status_writes: false,
        });
        let runner = runner_over(store, &f);

        let report = runner.run_batch(&f.ids, BatchOperation::Settle).await;

        assert_eq!(report.success_count, 4);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.skipped_count, 0);
        assert!(!report.cancelled);

        for (i, id) in f.ids.iter().enumerate() {
            let stored = f.receivables.get_receivable(*id).await.unwrap().unwrap();
            let expected = if i == 2 {
                ReceivableStatus::Pending
            } else {
                ReceivableStatus::Settled
            };
            assert_eq!(stored.status, expected);
        }
        assert_eq!(f.ledger.entries().await.len(), 4);
    }

    #[tokio::test]
    async fn test_settle_batch_skips_settled_and_fails_unknown() {
        let f = fixture(2).await;
        let runner = runner_over(f.receivables.clone(), &f);
        runner.run_batch(&f.ids[..1], BatchOperation::Settle).await;

        let mut ids = f.ids.clone();
        ids.push(Uuid::new_v4());
        let report = runner.run_batch(&ids, BatchOperation::Settle).await;

        assert_eq!(report.success_count, 1);
        assert_eq!(report.skipped_count, 1);
        assert_eq!(report.failure_count, 1);
        assert_eq!(f.ledger.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_batch_skips_confirmed() {
        let f = fixture(3).await;
        let runner = runner_over(f.receivables.clone(), &f);

        let first = runner.run_batch(&f.ids, BatchOperation::Reconcile).await;
        let second = runner.run_batch(&f.ids, BatchOperation::Reconcile).await;

        assert_eq!(first.success_count, 3);
        assert_eq!(second.success_count, 0);
        assert_eq!(second.skipped_count, 3);
        assert_eq!(second.failure_count, 0);

        let record = f
            .reconciliations
            .find_linked(f.ids[0], Some("ORD0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ReconciliationStatus::Confirmed);
        assert_eq!(record.received_net, Some(dec!(97.5)));
        assert_eq!(f.reconciliations.len().await, 3);
        assert!(f.ledger.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_progress_and_cancellation() {
        let f = fixture(4).await;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let runner = runner_over(f.receivables.clone(), &f)
            .with_cancellation(cancel_rx)
            .with_progress(progress_tx);

        let report = runner.run_batch(&f.ids[..2], BatchOperation::Settle).await;
        assert_eq!(report.success_count, 2);

        let first = progress_rx.recv().await.unwrap();
        assert_eq!(first.processed, 1);
        assert_eq!(first.total, 2);
        assert_eq!(first.outcome, ItemOutcome::Applied);
        let second = progress_rx.recv().await.unwrap();
        assert_eq!(second.processed, 2);

        cancel_tx.send(true).unwrap();
        let report = runner.run_batch(&f.ids[2..], BatchOperation::Settle).await;

        assert!(report.cancelled);
        assert_eq!(report.processed(), 0);
        let untouched = f.receivables.get_receivable(f.ids[3]).await.unwrap().unwrap();
        assert_eq!(untouched.status, ReceivableStatus::Pending);
    }
}
