// Matching, classification and persistence of card deposit reconciliations
pub mod classifier;
pub mod matcher;
pub mod models;
pub mod repository;
pub mod writer;

pub use classifier::{classify, DIVERGENCE_TOLERANCE};
pub use matcher::{find_duplicate_order_references, match_receivables};
pub use models::{ReconciliationKind, ReconciliationRecord, ReconciliationStatus, UnifiedRow};
pub use repository::ReconciliationRepository;
pub use writer::ReconciliationWriter;
