use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::classifier::classify;
use super::models::{
    NewReconciliation, ReconciliationRecord, ReconciliationStatus, ReconciliationUpdate,
};
use crate::batch::{BatchReport, ItemOutcome};
use crate::error::{AppError, AppResult, ReconciliationError};
use crate::receivables::models::Receivable;
use crate::store::ReconciliationStore;

/// Creates or updates the reconciliation record of a receivable
pub struct ReconciliationWriter {
    reconciliations: Arc<dyn ReconciliationStore>,
}

impl ReconciliationWriter {
    pub fn new(reconciliations: Arc<dyn ReconciliationStore>) -> Self {
        Self { reconciliations }
    }

    /// Record a bank deposit for `receivable` and classify it.
    ///
    /// Updates the linked record in place when one exists, otherwise creates
    /// one. Never touches the bank ledger.
    pub async fn reconcile(
        &self,
        receivable: &Receivable,
        received_net: Decimal,
        deposit_date: NaiveDate,
    ) -> AppResult<ReconciliationRecord> {
        validate_received(received_net)?;
        validate_receivable(receivable)?;

        let linked = self.find_linked(receivable).await?;
        self.write(receivable, linked, received_net, deposit_date)
            .await
    }

    /// Reconcile a receivable at its expected net amount, dated on its due
    /// date. Skips receivables whose record is already confirmed.
    pub async fn reconcile_at_expected(&self, receivable: &Receivable) -> AppResult<ItemOutcome> {
        let linked = self.find_linked(receivable).await?;
        if linked.as_ref().is_some_and(|r| r.is_confirmed()) {
            return Ok(ItemOutcome::Skipped);
        }

        // a zero net (gross == fee) still reconciles at expected
        validate_receivable(receivable)?;
        let expected_net = receivable.expected_net();
        self.write(receivable, linked, expected_net, receivable.due_date)
            .await?;
        Ok(ItemOutcome::Applied)
    }

    /// Bulk "mark as reconciled" over receivables whose amounts are known to
    /// be good. Per-item failures are logged and counted, never propagated.
    pub async fn reconcile_many(&self, receivables: &[Receivable]) -> BatchReport {
        let mut report = BatchReport::default();

        for receivable in receivables {
            let outcome = match self.reconcile_at_expected(receivable).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        receivable_id = %receivable.id,
                        error = %e,
                        "❌ Bulk reconciliation failed for receivable"
                    );
                    ItemOutcome::Failed
                }
            };
            report.record(outcome);
        }

        info!(
            succeeded = report.success_count,
            failed = report.failure_count,
            skipped = report.skipped_count,
            "✓ Bulk reconciliation finished"
        );
        report
    }

    async fn find_linked(&self, receivable: &Receivable) -> AppResult<Option<ReconciliationRecord>> {
        self.reconciliations
            .find_linked(receivable.id, receivable.order_reference.as_deref())
            .await
            .map_err(|e| save_failed(receivable, e))
    }

    async fn write(
        &self,
        receivable: &Receivable,
        linked: Option<ReconciliationRecord>,
        received_net: Decimal,
        deposit_date: NaiveDate,
    ) -> AppResult<ReconciliationRecord> {
        let status = classify(receivable.expected_net(), received_net);

        let record = match linked {
            Some(existing) => {
                let update = ReconciliationUpdate {
                    received_net,
                    deposit_date,
                    status,
                };
                self.reconciliations
                    .update_reconciliation(existing.id, existing.version, update)
                    .await
            }
            None => {
                let new = NewReconciliation::from_receivable(
                    receivable,
                    received_net,
                    deposit_date,
                    status,
                );
                self.reconciliations.create_reconciliation(new).await
            }
        }
        .map_err(|e| save_failed(receivable, e))?;

        if record.status == ReconciliationStatus::Divergent {
            warn!(
                receivable_id = %receivable.id,
                reconciliation_id = %record.id,
                expected = %record.expected_net,
                received = %received_net,
                "⚠️  Deposit diverges from expected net amount"
            );
        } else {
            info!(
                receivable_id = %receivable.id,
                reconciliation_id = %record.id,
                status = %record.status,
                "✅ Reconciliation saved"
            );
        }

        Ok(record)
    }
}

/// Operator-entered deposits must be positive
fn validate_received(received_net: Decimal) -> AppResult<()> {
    if received_net <= Decimal::ZERO {
        return Err(ReconciliationError::InvalidAmount(format!(
            "received net amount must be positive, got {}",
            received_net
        ))
        .into());
    }
    Ok(())
}

fn validate_receivable(receivable: &Receivable) -> AppResult<()> {
    if receivable.gross_amount < Decimal::ZERO || receivable.fee_amount < Decimal::ZERO {
        return Err(ReconciliationError::InvalidAmount(format!(
            "receivable {} has negative gross or fee amount",
            receivable.id
        ))
        .into());
    }
    Ok(())
}

/// Store failures become `SaveFailed`; domain errors raised by the store
/// (duplicate order references) pass through untouched.
fn save_failed(receivable: &Receivable, error: AppError) -> AppError {
    match error {
        AppError::Reconciliation(_) => error,
        other => ReconciliationError::SaveFailed {
            receivable_id: receivable.id,
            reason: other.to_string(),
        }
        .into(),
    }
}
