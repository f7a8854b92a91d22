use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

use super::models::{ReconciliationRecord, ReconciliationStatus, UnifiedRow};
use crate::receivables::models::Receivable;

/// Join receivables with reconciliation records on the order reference.
///
/// The index is built once per call. When several records share an order
/// reference the last one in `reconciliations` wins; use
/// [`find_duplicate_order_references`] to surface those collisions.
pub fn match_receivables(
    receivables: &[Receivable],
    reconciliations: &[ReconciliationRecord],
    today: NaiveDate,
) -> Vec<UnifiedRow> {
    let index: HashMap<&str, &ReconciliationRecord> = reconciliations
        .iter()
        .filter_map(|r| r.order_reference.as_deref().map(|order| (order, r)))
        .collect();

    receivables
        .iter()
        .map(|receivable| {
            let linked = receivable
                .order_reference
                .as_deref()
                .and_then(|order| index.get(order).copied());

            let status = linked
                .map(|r| r.status)
                .unwrap_or(ReconciliationStatus::Unreconciled);

            UnifiedRow {
                receivable: receivable.clone(),
                reconciliation_id: linked.map(|r| r.id),
                reconciliation_status: status,
                received_net: linked.and_then(|r| r.received_net),
                deposit_date: linked.and_then(|r| r.deposit_date),
                overdue: receivable.is_overdue(today),
                reconciled: status == ReconciliationStatus::Confirmed,
            }
        })
        .collect()
}

/// Order references carried by more than one reconciliation record, sorted.
pub fn find_duplicate_order_references(reconciliations: &[ReconciliationRecord]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for order in reconciliations.iter().filter_map(|r| r.order_reference.as_deref()) {
        *counts.entry(order).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(order, _)| order.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
