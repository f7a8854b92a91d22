use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use uuid::Uuid;

/// Payment methods that produce card/terminal receivables.
/// Anything else (cash, bank slip, ...) never enters the reconciliation pipeline.
pub const RECEIVABLE_PAYMENT_METHODS: [&str; 5] = [
    "cartao_debito",
    "cartao_credito",
    "pix_maquininha",
    "debito",
    "credito",
];

pub fn is_receivable_payment_method(method: &str) -> bool {
    RECEIVABLE_PAYMENT_METHODS.contains(&method)
}

/// Receivable status. Terminal once `Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "receivable_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReceivableStatus {
    Pending,
    Settled,
}

impl fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceivableStatus::Pending => write!(f, "pending"),
            ReceivableStatus::Settled => write!(f, "settled"),
        }
    }
}

/// Where the bank-ledger leg of a settlement stands.
///
/// `Pending` is written together with `Settled` and replaced once the posting
/// attempt finishes; a row left in `Pending` means the process stopped between
/// the two writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "ledger_posting_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerPostingStatus {
    NotRequired,
    Pending,
    Posted,
    Failed,
}

impl LedgerPostingStatus {
    /// Whether the retry job should look at this settlement again
    pub fn needs_retry(&self) -> bool {
        matches!(self, LedgerPostingStatus::Pending | LedgerPostingStatus::Failed)
    }
}

/// Receivable entity - one expected incoming card/terminal payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivable {
    pub id: Uuid,
    pub description: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub gross_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_percentage: Decimal,

    pub due_date: NaiveDate,
    pub payment_method: String,
    pub card_operator_id: Option<Uuid>,
    pub order_reference: Option<String>,
    pub installment_number: i32,
    pub installment_count: i32,
    pub branch_id: Option<Uuid>,

    pub status: ReceivableStatus,
    /// Realized net amount, only authoritative once settled
    #[serde(with = "rust_decimal::serde::float_option")]
    pub net_amount: Option<Decimal>,
    pub settled_at: Option<DateTime<Utc>>,
    /// Operator who settled it; carried onto the ledger posting
    pub settled_by: Option<Uuid>,
    pub ledger_status: LedgerPostingStatus,

    /// Optimistic concurrency token, bumped on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Receivable {
    /// Single-installment pending receivable with the fee percentage derived
    /// from the amounts.
    pub fn new(
        description: impl Into<String>,
        gross_amount: Decimal,
        fee_amount: Decimal,
        due_date: NaiveDate,
        payment_method: impl Into<String>,
    ) -> Self {
        let fee_percentage = if gross_amount > Decimal::ZERO {
            (fee_amount / gross_amount * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            gross_amount,
            fee_amount,
            fee_percentage,
            due_date,
            payment_method: payment_method.into(),
            card_operator_id: None,
            order_reference: None,
            installment_number: 1,
            installment_count: 1,
            branch_id: None,
            status: ReceivableStatus::Pending,
            net_amount: None,
            settled_at: None,
            settled_by: None,
            ledger_status: LedgerPostingStatus::NotRequired,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_order_reference(mut self, order_reference: impl Into<String>) -> Self {
        self.order_reference = Some(order_reference.into());
        self
    }

    pub fn with_branch(mut self, branch_id: Uuid) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    pub fn with_card_operator(mut self, card_operator_id: Uuid) -> Self {
        self.card_operator_id = Some(card_operator_id);
        self
    }

    /// Gross minus fee. Recomputed on demand; `net_amount` only holds the
    /// value frozen at settlement.
    pub fn expected_net(&self) -> Decimal {
        self.gross_amount - self.fee_amount
    }

    pub fn is_settled(&self) -> bool {
        self.status == ReceivableStatus::Settled
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == ReceivableStatus::Pending && self.due_date < today
    }
}
