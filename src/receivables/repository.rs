use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::BigDecimal;
use sqlx::{prelude::FromRow, PgPool};
use uuid::Uuid;

use super::models::*;
use crate::db::{from_big_decimal, from_big_decimal_opt, to_big_decimal};
use crate::error::{AppError, AppResult, SettlementError};
use crate::store::ReceivableStore;

const RECEIVABLE_COLUMNS: &str = r#"
    id, description, gross_amount, fee_amount, fee_percentage, due_date,
    payment_method, card_operator_id, order_reference, installment_number,
    installment_count, branch_id, status, net_amount, settled_at, settled_by, ledger_status,
    version, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct ReceivableRow {
    id: Uuid,
    description: String,
    gross_amount: BigDecimal,
    fee_amount: BigDecimal,
    fee_percentage: BigDecimal,
    due_date: NaiveDate,
    payment_method: String,
    card_operator_id: Option<Uuid>,
    order_reference: Option<String>,
    installment_number: i32,
    installment_count: i32,
    branch_id: Option<Uuid>,
    status: ReceivableStatus,
    net_amount: Option<BigDecimal>,
    settled_at: Option<DateTime<Utc>>,
    settled_by: Option<Uuid>,
    ledger_status: LedgerPostingStatus,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReceivableRow> for Receivable {
    type Error = AppError;

    fn try_from(row: ReceivableRow) -> AppResult<Self> {
        Ok(Receivable {
            id: row.id,
            description: row.description,
            gross_amount: from_big_decimal(&row.gross_amount)?,
            fee_amount: from_big_decimal(&row.fee_amount)?,
            fee_percentage: from_big_decimal(&row.fee_percentage)?,
            due_date: row.due_date,
            payment_method: row.payment_method,
            card_operator_id: row.card_operator_id,
            order_reference: row.order_reference,
            installment_number: row.installment_number,
            installment_count: row.installment_count,
            branch_id: row.branch_id,
            status: row.status,
            net_amount: from_big_decimal_opt(row.net_amount.as_ref())?,
            settled_at: row.settled_at,
            settled_by: row.settled_by,
            ledger_status: row.ledger_status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed receivable store
pub struct ReceivableRepository {
    pub pool: PgPool,
}

impl ReceivableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by_id(&self, id: Uuid) -> AppResult<Option<Receivable>> {
        let row = sqlx::query_as::<_, ReceivableRow>(&format!(
            "SELECT {} FROM receivables WHERE id = $1",
            RECEIVABLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Receivable::try_from).transpose()
    }
}

#[async_trait]
impl ReceivableStore for ReceivableRepository {
    async fn fetch_receivables(&self, branch_id: Option<Uuid>) -> AppResult<Vec<Receivable>> {
        let methods: Vec<String> = RECEIVABLE_PAYMENT_METHODS
            .iter()
            .map(|m| m.to_string())
            .collect();

        let rows = sqlx::query_as::<_, ReceivableRow>(&format!(
            r#"
            SELECT {}
            FROM receivables
            WHERE payment_method = ANY($1)
              AND ($2::uuid IS NULL OR branch_id = $2)
            ORDER BY due_date ASC, created_at ASC
            "#,
            RECEIVABLE_COLUMNS
        ))
        .bind(methods)
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Receivable::try_from).collect()
    }

    async fn get_receivable(&self, id: Uuid) -> AppResult<Option<Receivable>> {
        self.fetch_one_by_id(id).await
    }

    async fn mark_settled(
        &self,
        id: Uuid,
        expected_version: i64,
        net_amount: Decimal,
        settled_by: Option<Uuid>,
    ) -> AppResult<Receivable> {
        let row = sqlx::query_as::<_, ReceivableRow>(&format!(
            r#"
            UPDATE receivables
            SET status = 'settled',
                net_amount = $3,
                settled_at = NOW(),
                settled_by = $4,
                ledger_status = 'pending',
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2 AND status = 'pending'
            RETURNING {}
            "#,
            RECEIVABLE_COLUMNS
        ))
        .bind(id)
        .bind(expected_version)
        .bind(to_big_decimal(net_amount)?)
        .bind(settled_by)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Receivable::try_from(row);
        }

        // Nothing moved: work out why
        match self.fetch_one_by_id(id).await? {
            None => Err(AppError::NotFound(format!("Receivable {} not found", id))),
            Some(current) if current.is_settled() => {
                Err(SettlementError::AlreadySettled(id).into())
            }
            Some(_) => Err(AppError::Conflict {
                entity: "receivable",
                id,
                expected_version,
            }),
        }
    }

    async fn set_ledger_status(&self, id: Uuid, status: LedgerPostingStatus) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE receivables
            SET ledger_status = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Receivable {} not found", id)));
        }
        Ok(())
    }

    async fn fetch_unposted_settlements(&self) -> AppResult<Vec<Receivable>> {
        let rows = sqlx::query_as::<_, ReceivableRow>(&format!(
            r#"
            SELECT {}
            FROM receivables
            WHERE status = 'settled' AND ledger_status IN ('pending', 'failed')
            ORDER BY settled_at ASC
            "#,
            RECEIVABLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Receivable::try_from).collect()
    }
}
