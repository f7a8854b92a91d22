use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::models::*;
use crate::db::to_big_decimal;
use crate::error::{AppError, AppResult};
use crate::store::BankLedger;

/// Bank ledger over the bank-account service tables (`bank_accounts`,
/// `bank_transactions`). Those tables are migrated by that service, not here;
/// `receivable_ledger_postings` is ours and keys each credit.
pub struct BankLedgerRepository {
    pub pool: PgPool,
}

impl BankLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BankLedger for BankLedgerRepository {
    async fn find_active_account(&self, branch_id: Option<Uuid>) -> AppResult<Option<BankAccount>> {
        let account = sqlx::query_as::<_, BankAccount>(
            r#"
            SELECT id, branch_id, name, is_active
            FROM bank_accounts
            WHERE is_active = TRUE AND branch_id IS NOT DISTINCT FROM $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Claim the posting key, insert the credit and move the account balance
    /// in one transaction. A key that is already taken means an earlier
    /// attempt committed.
    async fn post_entry(&self, entry: LedgerEntryRequest) -> AppResult<PostingReceipt> {
        let amount = to_big_decimal(entry.amount)?;
        let mut tx = self.pool.begin().await.map_err(ledger_error)?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO receivable_ledger_postings (receivable_id, category, account_id, amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (receivable_id, category) DO NOTHING
            "#,
        )
        .bind(entry.receivable_id)
        .bind(&entry.category)
        .bind(entry.account_id)
        .bind(amount.clone())
        .execute(&mut *tx)
        .await
        .map_err(ledger_error)?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(ledger_error)?;
            debug!(receivable_id = %entry.receivable_id, "Ledger credit already committed");
            return Ok(PostingReceipt::AlreadyPosted);
        }

        sqlx::query(
            r#"
            INSERT INTO bank_transactions (
                account_id, kind, amount, description, category,
                branch_id, user_id, order_reference
            )
            VALUES ($1, 'credit', $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.account_id)
        .bind(amount.clone())
        .bind(&entry.description)
        .bind(&entry.category)
        .bind(entry.branch_id)
        .bind(entry.user_id)
        .bind(&entry.order_reference)
        .execute(&mut *tx)
        .await
        .map_err(ledger_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE bank_accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(entry.account_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(ledger_error)?;

        if updated.rows_affected() == 0 {
            return Err(AppError::LedgerPosting(format!(
                "Unknown bank account {}",
                entry.account_id
            )));
        }

        tx.commit().await.map_err(ledger_error)?;
        debug!(account_id = %entry.account_id, amount = %entry.amount, "Ledger credit committed");
        Ok(PostingReceipt::Posted)
    }
}

fn ledger_error(error: sqlx::Error) -> AppError {
    AppError::LedgerPosting(error.to_string())
}
