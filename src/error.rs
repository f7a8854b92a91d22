use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the receivables engine
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Reconciliation error: {0}")]
    Reconciliation(#[from] ReconciliationError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write conflict on {entity} {id}: expected version {expected_version}")]
    Conflict {
        entity: &'static str,
        id: Uuid,
        expected_version: i64,
    },

    #[error("Ledger posting failed: {0}")]
    LedgerPosting(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reconciliation-related errors
#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Could not save reconciliation for receivable {receivable_id}: {reason}")]
    SaveFailed { receivable_id: Uuid, reason: String },

    #[error("Order reference {0} is linked to more than one reconciliation record")]
    DuplicateOrderReference(String),
}

/// Settlement-related errors
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Receivable {0} is already settled")]
    AlreadySettled(Uuid),

    #[error("Could not settle receivable {receivable_id}: {reason}")]
    SaveFailed { receivable_id: Uuid, reason: String },
}

impl AppError {
    /// Message shown to the operator for a failed single-item action.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Reconciliation(ReconciliationError::InvalidAmount(_))
            | AppError::Validation(_) => "Please provide a valid received amount",
            AppError::Reconciliation(ReconciliationError::DuplicateOrderReference(_)) => {
                "More than one reconciliation record shares this order; review the deposit import"
            }
            AppError::Reconciliation(_) => "Could not save reconciliation",
            AppError::Settlement(SettlementError::AlreadySettled(_)) => {
                "This receivable has already been settled"
            }
            AppError::Settlement(_) => "Could not settle receivable",
            _ => "An internal error occurred",
        }
    }

    /// True for store write failures, including optimistic-lock conflicts.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Conflict { .. }
                | AppError::Reconciliation(ReconciliationError::SaveFailed { .. })
                | AppError::Settlement(SettlementError::SaveFailed { .. })
        )
    }
}

impl From<rust_decimal::Error> for AppError {
    fn from(error: rust_decimal::Error) -> Self {
        AppError::Validation(format!("Decimal conversion error: {:?}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the engine
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_distinguish_operations() {
        let reconcile = AppError::from(ReconciliationError::SaveFailed {
            receivable_id: Uuid::new_v4(),
            reason: "connection reset".to_string(),
        });
        let settle = AppError::from(SettlementError::SaveFailed {
            receivable_id: Uuid::new_v4(),
            reason: "connection reset".to_string(),
        });

        assert_eq!(reconcile.user_message(), "Could not save reconciliation");
        assert_eq!(settle.user_message(), "Could not settle receivable");
        assert!(reconcile.is_persistence());
        assert!(settle.is_persistence());
    }

    #[test]
    fn test_conflict_counts_as_persistence() {
        let conflict = AppError::Conflict {
            entity: "receivable",
            id: Uuid::new_v4(),
            expected_version: 3,
        };
        assert!(conflict.is_persistence());
        assert!(!AppError::LedgerPosting("timeout".into()).is_persistence());
    }
}
