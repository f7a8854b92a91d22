use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Category tag used for settlement credits unless configured otherwise
pub const DEFAULT_SETTLEMENT_CATEGORY: &str = "card_receivable_settlement";

/// Bank account owned by a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BankAccount {
    pub id: Uuid,
    pub branch_id: Option<Uuid>,
    pub name: String,
    pub is_active: bool,
}

/// Credit requested against a bank account.
///
/// `(receivable_id, category)` identifies the credit: posting the same pair
/// twice moves the balance once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntryRequest {
    pub receivable_id: Uuid,
    pub account_id: Uuid,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
    pub category: String,
    pub branch_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub order_reference: Option<String>,
}

/// What the ledger did with a posting request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingReceipt {
    Posted,
    /// An entry for the same receivable and category already exists
    AlreadyPosted,
}
