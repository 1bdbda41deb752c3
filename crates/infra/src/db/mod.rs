//! Database adapters: connection pool, Postgres transactions, in-memory store.

pub mod in_memory;
pub mod pool;
pub mod postgres;

pub use in_memory::{InMemoryResultStore, InMemoryTx, InjectedFault, StoreStats};
pub use pool::{connect_options, connect_pool};
pub use postgres::{classify_acquire_error, classify_sqlx_error, PgTransactionSource, PgTx};
