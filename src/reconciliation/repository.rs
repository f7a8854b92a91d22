use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::BigDecimal;
use sqlx::{prelude::FromRow, PgPool};
use uuid::Uuid;

use super::models::*;
use crate::db::{from_big_decimal, from_big_decimal_opt, to_big_decimal};
use crate::error::{AppError, AppResult, ReconciliationError};
use crate::store::ReconciliationStore;

const RECONCILIATION_COLUMNS: &str = r#"
    id, receivable_id, kind, gross_amount, fee_percentage, fee_amount,
    expected_net, received_net, sale_date, deposit_date, card_operator_id,
    order_reference, branch_id, installment_count, status, version,
    created_at, updated_at
"#;

/// Postgres unique-violation SQLSTATE
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, FromRow)]
struct ReconciliationRow {
    id: Uuid,
    receivable_id: Option<Uuid>,
    kind: ReconciliationKind,
    gross_amount: BigDecimal,
    fee_percentage: BigDecimal,
    fee_amount: BigDecimal,
    expected_net: BigDecimal,
    received_net: Option<BigDecimal>,
    sale_date: NaiveDate,
    deposit_date: Option<NaiveDate>,
    card_operator_id: Option<Uuid>,
    order_reference: Option<String>,
    branch_id: Option<Uuid>,
    installment_count: i32,
    status: ReconciliationStatus,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReconciliationRow> for ReconciliationRecord {
    type Error = AppError;

    fn try_from(row: ReconciliationRow) -> AppResult<Self> {
        Ok(ReconciliationRecord {
            id: row.id,
            receivable_id: row.receivable_id,
            kind: row.kind,
            gross_amount: from_big_decimal(&row.gross_amount)?,
            fee_percentage: from_big_decimal(&row.fee_percentage)?,
            fee_amount: from_big_decimal(&row.fee_amount)?,
            expected_net: from_big_decimal(&row.expected_net)?,
            received_net: from_big_decimal_opt(row.received_net.as_ref())?,
            sale_date: row.sale_date,
            deposit_date: row.deposit_date,
            card_operator_id: row.card_operator_id,
            order_reference: row.order_reference,
            branch_id: row.branch_id,
            installment_count: row.installment_count,
            status: row.status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed reconciliation store
pub struct ReconciliationRepository {
    pub pool: PgPool,
}

impl ReconciliationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationStore for ReconciliationRepository {
    async fn fetch_reconciliations(
        &self,
        branch_id: Option<Uuid>,
    ) -> AppResult<Vec<ReconciliationRecord>> {
        let rows = sqlx::query_as::<_, ReconciliationRow>(&format!(
            r#"
            SELECT {}
            FROM card_reconciliations
            WHERE ($1::uuid IS NULL OR branch_id = $1)
            ORDER BY sale_date DESC, created_at ASC
            "#,
            RECONCILIATION_COLUMNS
        ))
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ReconciliationRecord::try_from).collect()
    }

    async fn find_linked(
        &self,
        receivable_id: Uuid,
        order_reference: Option<&str>,
    ) -> AppResult<Option<ReconciliationRecord>> {
        let by_link = sqlx::query_as::<_, ReconciliationRow>(&format!(
            "SELECT {} FROM card_reconciliations WHERE receivable_id = $1",
            RECONCILIATION_COLUMNS
        ))
        .bind(receivable_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = by_link {
            return ReconciliationRecord::try_from(row).map(Some);
        }

        let Some(order) = order_reference else {
            return Ok(None);
        };

        // LIMIT 2 is enough to tell "one" from "ambiguous"
        let mut rows = sqlx::query_as::<_, ReconciliationRow>(&format!(
            "SELECT {} FROM card_reconciliations WHERE order_reference = $1 LIMIT 2",
            RECONCILIATION_COLUMNS
        ))
        .bind(order)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() > 1 {
            return Err(ReconciliationError::DuplicateOrderReference(order.to_string()).into());
        }

        rows.pop().map(ReconciliationRecord::try_from).transpose()
    }

    async fn create_reconciliation(
        &self,
        record: NewReconciliation,
    ) -> AppResult<ReconciliationRecord> {
        let result = sqlx::query_as::<_, ReconciliationRow>(&format!(
            r#"
            INSERT INTO card_reconciliations (
                receivable_id, kind, gross_amount, fee_percentage, fee_amount,
                expected_net, received_net, sale_date, deposit_date, card_operator_id,
                order_reference, branch_id, installment_count, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            RECONCILIATION_COLUMNS
        ))
        .bind(record.receivable_id)
        .bind(record.kind)
        .bind(to_big_decimal(record.gross_amount)?)
        .bind(to_big_decimal(record.fee_percentage)?)
        .bind(to_big_decimal(record.fee_amount)?)
        .bind(to_big_decimal(record.expected_net)?)
        .bind(record.received_net.map(to_big_decimal).transpose()?)
        .bind(record.sale_date)
        .bind(record.deposit_date)
        .bind(record.card_operator_id)
        .bind(record.order_reference.clone())
        .bind(record.branch_id)
        .bind(record.installment_count)
        .bind(record.status)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => ReconciliationRecord::try_from(row),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                match record.order_reference {
                    Some(order) => Err(ReconciliationError::DuplicateOrderReference(order).into()),
                    None => Err(AppError::Validation(format!(
                        "Receivable {:?} already has a reconciliation record",
                        record.receivable_id
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_reconciliation(
        &self,
        id: Uuid,
        expected_version: i64,
        update: ReconciliationUpdate,
    ) -> AppResult<ReconciliationRecord> {
        let row = sqlx::query_as::<_, ReconciliationRow>(&format!(
            r#"
            UPDATE card_reconciliations
            SET received_net = $3,
                deposit_date = $4,
                status = $5,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            RECONCILIATION_COLUMNS
        ))
        .bind(id)
        .bind(expected_version)
        .bind(to_big_decimal(update.received_net)?)
        .bind(update.deposit_date)
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => ReconciliationRecord::try_from(row),
            None => Err(AppError::Conflict {
                entity: "reconciliation",
                id,
                expected_version,
            }),
        }
    }
}
