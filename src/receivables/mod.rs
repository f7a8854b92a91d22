pub mod models;
pub mod repository;

pub use models::{LedgerPostingStatus, Receivable, ReceivableStatus};
pub use repository::ReceivableRepository;
