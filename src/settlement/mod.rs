// Settlement of receivables and repair of unposted ledger credits
pub mod orchestrator;
pub mod retry;

pub use orchestrator::{SettlementOrchestrator, SettlementOutcome};
pub use retry::{LedgerRetryJob, RetrySummary};
