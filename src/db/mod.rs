pub mod memory_store;
pub mod models;
pub mod pg_store;
pub mod store;

pub use memory_store::MemoryCheckStore;
pub use pg_store::PgCheckStore;
pub use store::{CheckStore, StoreError};
