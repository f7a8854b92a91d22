// Ledger retry job - finishes settlements whose bank posting never landed
//
// A settlement is two writes: the receivable row, then the ledger credit.
// When the second one fails (or the process dies between them) the
// receivable stays settled with `ledger_status` failed/pending. This job
// periodically re-attempts those postings.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use super::orchestrator::SettlementOrchestrator;
use crate::receivables::models::{LedgerPostingStatus, Receivable};
use crate::store::ReceivableStore;

/// Tally of one retry cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub posted: usize,
    pub still_failing: usize,
    pub no_account: usize,
    /// `pending` rows younger than the grace period, assumed in flight
    pub in_flight: usize,
}

pub struct LedgerRetryJob {
    receivables: Arc<dyn ReceivableStore>,
    orchestrator: Arc<SettlementOrchestrator>,
    every: Duration,
    grace: chrono::Duration,
}

impl LedgerRetryJob {
    pub fn new(
        receivables: Arc<dyn ReceivableStore>,
        orchestrator: Arc<SettlementOrchestrator>,
        every: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            receivables,
            orchestrator,
            every,
            grace: chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }

    /// Start the retry loop in the background
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every);

            loop {
                ticker.tick().await;

                match self.run_cycle(Utc::now()).await {
                    Ok(summary) if summary.attempted > 0 => info!(
                        attempted = summary.attempted,
                        posted = summary.posted,
                        still_failing = summary.still_failing,
                        "🔄 Ledger retry cycle completed"
                    ),
                    Ok(_) => {}
                    Err(e) => error!("❌ Ledger retry cycle failed: {:?}", e),
                }
            }
        })
    }

    /// Re-post every settled receivable whose ledger leg is failed, or pending
    /// for longer than the grace period.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> anyhow::Result<RetrySummary> {
        let candidates = self.receivables.fetch_unposted_settlements().await?;
        let mut summary = RetrySummary::default();

        for receivable in candidates {
            if self.is_in_flight(&receivable, now) {
                summary.in_flight += 1;
                continue;
            }

            summary.attempted += 1;
            match self.orchestrator.post_settlement(&receivable).await {
                LedgerPostingStatus::Posted => summary.posted += 1,
                LedgerPostingStatus::NotRequired => summary.no_account += 1,
                LedgerPostingStatus::Failed | LedgerPostingStatus::Pending => {
                    summary.still_failing += 1
                }
            }
        }

        Ok(summary)
    }

    fn is_in_flight(&self, receivable: &Receivable, now: DateTime<Utc>) -> bool {
        receivable.ledger_status == LedgerPostingStatus::Pending
            && receivable
                .settled_at
                .is_some_and(|settled_at| now - settled_at < self.grace)
    }
}
