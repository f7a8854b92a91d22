// Best-effort batch processing over user-selected receivables
pub mod runner;

pub use runner::{BatchOperation, BatchProgress, BatchRunner};

use serde::{Deserialize, Serialize};

/// What happened to one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Applied,
    /// Precondition not met (already settled / already confirmed)
    Skipped,
    Failed,
}

/// Aggregate result of a batch. Skips are not failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    /// Set when the batch stopped early on a cancellation request
    pub cancelled: bool,
}

impl BatchReport {
    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Applied => self.success_count += 1,
            ItemOutcome::Skipped => self.skipped_count += 1,
            ItemOutcome::Failed => self.failure_count += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count + self.skipped_count
    }

    /// Aggregate text for the operator; per-item detail only goes to the logs
    pub fn summary(&self) -> String {
        let mut text = format!("{} item(s) processed successfully", self.success_count);
        if self.failure_count > 0 {
            text.push_str(&format!(", {} failed", self.failure_count));
        }
        if self.cancelled {
            text.push_str(" (cancelled before completion)");
        }
        text
    }
}

impl FromIterator<ItemOutcome> for BatchReport {
    fn from_iter<I: IntoIterator<Item = ItemOutcome>>(iter: I) -> Self {
        iter.into_iter().fold(BatchReport::default(), |mut report, outcome| {
            report.record(outcome);
            report
        })
    }
}
