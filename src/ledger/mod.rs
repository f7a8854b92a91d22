// Bank-ledger collaborator: account lookup and settlement credits
pub mod models;
pub mod repository;
