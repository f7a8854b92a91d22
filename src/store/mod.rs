// Storage seams for the engine and their in-memory implementations
pub mod memory;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::{InMemoryBankLedger, InMemoryReceivableStore, InMemoryReconciliationStore};
pub use traits::{BankLedger, ReceivableStore, ReconciliationStore};
