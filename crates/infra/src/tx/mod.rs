//! Transactional execution with bounded retry.
//!
//! ## Components
//!
//! - `TransactionSource` / `Transactional`: acquire-and-begin, commit, rollback
//! - `UnitOfWork`: the work run inside one transaction attempt
//! - `TransactionalExecutor`: the retry loop
//! - `RetryPolicy`: attempt bound and backoff schedule
//! - `TxError`: failure taxonomy (transient vs permanent)

pub mod error;
pub mod executor;
pub mod retry;

pub use error::TxError;
pub use executor::{Transactional, TransactionSource, TransactionalExecutor, UnitOfWork};
pub use retry::{BackoffStrategy, RetryPolicy};
