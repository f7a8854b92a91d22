use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, SettlementError};
use crate::ledger::models::{LedgerEntryRequest, PostingReceipt};
use crate::receivables::models::{LedgerPostingStatus, Receivable};
use crate::store::{BankLedger, ReceivableStore};

/// Result of a successful settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub receivable_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_amount: Decimal,
    pub ledger_posted: bool,
}

/// Marks receivables as settled and credits the branch's bank account.
///
/// The receivable write and the ledger posting are two separate writes. The
/// first one decides success; the second is best effort and its outcome is
/// recorded in `ledger_status` so `LedgerRetryJob` can finish it later.
pub struct SettlementOrchestrator {
    receivables: Arc<dyn ReceivableStore>,
    ledger: Arc<dyn BankLedger>,
    category: String,
}

impl SettlementOrchestrator {
    pub fn new(
        receivables: Arc<dyn ReceivableStore>,
        ledger: Arc<dyn BankLedger>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            receivables,
            ledger,
            category: category.into(),
        }
    }

    pub async fn settle(&self, receivable: &Receivable) -> AppResult<SettlementOutcome> {
        self.settle_as(receivable, None).await
    }

    /// Settle on behalf of an operator; `user_id` is attached to the posting.
    pub async fn settle_as(
        &self,
        receivable: &Receivable,
        user_id: Option<Uuid>,
    ) -> AppResult<SettlementOutcome> {
        if receivable.is_settled() {
            warn!(receivable_id = %receivable.id, "Receivable already settled, refusing to settle again");
            return Err(SettlementError::AlreadySettled(receivable.id).into());
        }

        let net_amount = receivable.expected_net();

        let settled = self
            .receivables
            .mark_settled(receivable.id, receivable.version, net_amount, user_id)
            .await
            .map_err(|e| match e {
                AppError::Settlement(_) => e,
                other => SettlementError::SaveFailed {
                    receivable_id: receivable.id,
                    reason: other.to_string(),
                }
                .into(),
            })?;

        info!(
            receivable_id = %settled.id,
            net_amount = %net_amount,
            "💰 Receivable settled"
        );

        let ledger_status = self.post_settlement(&settled).await;

        Ok(SettlementOutcome {
            receivable_id: settled.id,
            net_amount,
            ledger_posted: ledger_status == LedgerPostingStatus::Posted,
        })
    }

    /// Credit a settled receivable to its branch's active bank account and
    /// record the outcome. Never fails: a missing account or a rejected posting
    /// is logged and reflected in the returned status.
    ///
    /// Safe to repeat: the ledger keys credits by receivable and category, so a
    /// posting that already landed is reported as posted without a second
    /// credit. The posting carries `settled_by` as its user.
    pub async fn post_settlement(&self, receivable: &Receivable) -> LedgerPostingStatus {
        let status = match self.ledger.find_active_account(receivable.branch_id).await {
            Ok(None) => {
                warn!(
                    receivable_id = %receivable.id,
                    branch_id = ?receivable.branch_id,
                    "⚠️  No active bank account for branch, settlement not posted to ledger"
                );
                LedgerPostingStatus::NotRequired
            }
            Err(e) => {
                error!(
                    receivable_id = %receivable.id,
                    error = %e,
                    "❌ Bank account lookup failed"
                );
                LedgerPostingStatus::Failed
            }
            Ok(Some(account)) => {
                let net = receivable
                    .net_amount
                    .unwrap_or_else(|| receivable.expected_net());
                let entry = LedgerEntryRequest {
                    receivable_id: receivable.id,
                    account_id: account.id,
                    amount: posting_amount(net, receivable.gross_amount),
                    description: posting_description(receivable),
                    category: self.category.clone(),
                    branch_id: receivable.branch_id,
                    user_id: receivable.settled_by,
                    order_reference: receivable.order_reference.clone(),
                };
                let amount = entry.amount;

                match self.ledger.post_entry(entry).await {
                    Ok(PostingReceipt::Posted) => {
                        info!(
                            receivable_id = %receivable.id,
                            account_id = %account.id,
                            amount = %amount,
                            "✅ Settlement posted to bank ledger"
                        );
                        LedgerPostingStatus::Posted
                    }
                    Ok(PostingReceipt::AlreadyPosted) => {
                        info!(
                            receivable_id = %receivable.id,
                            account_id = %account.id,
                            "Settlement credit was already on the ledger"
                        );
                        LedgerPostingStatus::Posted
                    }
                    Err(e) => {
                        error!(
                            receivable_id = %receivable.id,
                            account_id = %account.id,
                            error = %e,
                            "❌ Ledger posting failed, settlement kept"
                        );
                        LedgerPostingStatus::Failed
                    }
                }
            }
        };

        if let Err(e) = self.receivables.set_ledger_status(receivable.id, status).await {
            let ledger_posted = status == LedgerPostingStatus::Posted;
            error!(
                receivable_id = %receivable.id,
                ledger_posted,
                status = ?status,
                error = %e,
                "Failed to record ledger posting status"
            );
        }

        status
    }
}

/// Amount to credit: the net amount, or the gross amount when the net is not
/// positive.
fn posting_amount(net_amount: Decimal, gross_amount: Decimal) -> Decimal {
    if net_amount <= Decimal::ZERO {
        gross_amount
    } else {
        net_amount
    }
}

fn posting_description(receivable: &Receivable) -> String {
    if receivable.installment_count > 1 {
        format!(
            "Card receivable: {} ({}/{})",
            receivable.description, receivable.installment_number, receivable.installment_count
        )
    } else {
        format!("Card receivable: {}", receivable.description)
    }
}
