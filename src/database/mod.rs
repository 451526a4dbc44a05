pub mod manager;
pub mod query_builder;
pub mod store;

pub use manager::{DatabaseManager, StoreError};
pub use store::{EntityStore, PgStore, PgTransactionStore};
