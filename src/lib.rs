//! Card receivables: reconciliation of expected vs. deposited net amounts,
//! settlement with bank-ledger posting, and best-effort batch runs.

pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod receivables;
pub mod reconciliation;
pub mod settlement;
pub mod store;

pub use batch::{BatchOperation, BatchReport, BatchRunner, ItemOutcome};
pub use config::Config;
pub use engine::ReceivablesEngine;
pub use error::{AppError, AppResult, ReconciliationError, SettlementError};
pub use receivables::{LedgerPostingStatus, Receivable, ReceivableStatus};
pub use reconciliation::{
    classify, ReconciliationKind, ReconciliationRecord, ReconciliationStatus, UnifiedRow,
    DIVERGENCE_TOLERANCE,
};
pub use settlement::{LedgerRetryJob, SettlementOrchestrator, SettlementOutcome};
