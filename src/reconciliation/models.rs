use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use uuid::Uuid;

use crate::receivables::models::Receivable;

/// Kind of card/terminal movement a deposit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "reconciliation_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    Debit,
    Credit,
    TerminalPix,
}

impl ReconciliationKind {
    /// Derive the kind from a receivable's payment method tag.
    /// Debit wins over pix; anything unrecognised is treated as credit.
    pub fn from_payment_method(method: &str) -> Self {
        let method = method.to_lowercase();
        if method.contains("debito") {
            ReconciliationKind::Debit
        } else if method.contains("pix") {
            ReconciliationKind::TerminalPix
        } else {
            ReconciliationKind::Credit
        }
    }
}

/// Reconciliation status. `Divergent` can be corrected back to `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "reconciliation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Unreconciled,
    Confirmed,
    Divergent,
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconciliationStatus::Unreconciled => "unreconciled",
            ReconciliationStatus::Confirmed => "confirmed",
            ReconciliationStatus::Divergent => "divergent",
        };
        write!(f, "{}", s)
    }
}

/// One bank-reported deposit for a card/terminal sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub id: Uuid,
    /// Back-reference set when the record was created from a receivable.
    /// Imported deposits only carry the order reference.
    pub receivable_id: Option<Uuid>,
    pub kind: ReconciliationKind,

    #[serde(with = "rust_decimal::serde::float")]
    pub gross_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_percentage: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub expected_net: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub received_net: Option<Decimal>,

    pub sale_date: NaiveDate,
    pub deposit_date: Option<NaiveDate>,
    pub card_operator_id: Option<Uuid>,
    pub order_reference: Option<String>,
    pub branch_id: Option<Uuid>,
    pub installment_count: i32,

    pub status: ReconciliationStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReconciliationRecord {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReconciliationStatus::Confirmed
    }
}

/// Insert payload for a reconciliation record
#[derive(Debug, Clone, PartialEq)]
pub struct NewReconciliation {
    pub receivable_id: Option<Uuid>,
    pub kind: ReconciliationKind,
    pub gross_amount: Decimal,
    pub fee_percentage: Decimal,
    pub fee_amount: Decimal,
    pub expected_net: Decimal,
    pub received_net: Option<Decimal>,
    pub sale_date: NaiveDate,
    pub deposit_date: Option<NaiveDate>,
    pub card_operator_id: Option<Uuid>,
    pub order_reference: Option<String>,
    pub branch_id: Option<Uuid>,
    pub installment_count: i32,
    pub status: ReconciliationStatus,
}

impl NewReconciliation {
    /// Copy the monetary fields and references of a receivable into a new
    /// record with the given deposit outcome.
    pub fn from_receivable(
        receivable: &Receivable,
        received_net: Decimal,
        deposit_date: NaiveDate,
        status: ReconciliationStatus,
    ) -> Self {
        Self {
            receivable_id: Some(receivable.id),
            kind: ReconciliationKind::from_payment_method(&receivable.payment_method),
            gross_amount: receivable.gross_amount,
            fee_percentage: receivable.fee_percentage,
            fee_amount: receivable.fee_amount,
            expected_net: receivable.expected_net(),
            received_net: Some(received_net),
            sale_date: receivable.created_at.date_naive(),
            deposit_date: Some(deposit_date),
            card_operator_id: receivable.card_operator_id,
            order_reference: receivable.order_reference.clone(),
            branch_id: receivable.branch_id,
            installment_count: receivable.installment_count,
            status,
        }
    }

    /// Materialize the record as a store would after inserting it.
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> ReconciliationRecord {
        ReconciliationRecord {
            id,
            receivable_id: self.receivable_id,
            kind: self.kind,
            gross_amount: self.gross_amount,
            fee_percentage: self.fee_percentage,
            fee_amount: self.fee_amount,
            expected_net: self.expected_net,
            received_net: self.received_net,
            sale_date: self.sale_date,
            deposit_date: self.deposit_date,
            card_operator_id: self.card_operator_id,
            order_reference: self.order_reference,
            branch_id: self.branch_id,
            installment_count: self.installment_count,
            status: self.status,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// In-place update applied on every reconciliation action
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciliationUpdate {
    pub received_net: Decimal,
    pub deposit_date: NaiveDate,
    pub status: ReconciliationStatus,
}

/// Read projection joining a receivable with its reconciliation, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRow {
    pub receivable: Receivable,
    pub reconciliation_id: Option<Uuid>,
    pub reconciliation_status: ReconciliationStatus,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub received_net: Option<Decimal>,
    pub deposit_date: Option<NaiveDate>,
    pub overdue: bool,
    pub reconciled: bool,
}
