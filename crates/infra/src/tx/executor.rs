//! Transactional executor with retry and backoff.
//!
//! ## Protocol (per attempt)
//!
//! 1. Acquire a pooled connection and begin a transaction
//! 2. Run the unit of work
//! 3. Commit on success, roll back on failure (rollback errors are logged, never
//!    propagated over the original failure)
//! 4. Retry transient failures with a fresh connection after the next delay of
//!    the precomputed backoff schedule; propagate everything else
//!
//! Committing or rolling back consumes the transaction, which releases its
//! connection back to the pool exactly once per attempt.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::error::TxError;
use super::retry::RetryPolicy;

/// An open transaction on a pooled connection.
#[async_trait]
pub trait Transactional: Send + Sized {
    async fn commit(self) -> Result<(), TxError>;

    async fn rollback(self) -> Result<(), TxError>;
}

/// Something that hands out transactions on freshly acquired connections.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    type Tx: Transactional;

    /// Acquire a connection (bounded by the acquisition timeout) and begin a
    /// transaction on it.
    async fn begin(&self) -> Result<Self::Tx, TxError>;
}

#[async_trait]
impl<S: TransactionSource> TransactionSource for Arc<S> {
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, TxError> {
        (**self).begin().await
    }
}

/// A unit of work run inside a transaction.
#[async_trait]
pub trait UnitOfWork<Tx: Send>: Send + Sync {
    type Output: Send;

    async fn execute(&self, tx: &mut Tx) -> Result<Self::Output, TxError>;
}

/// Runs units of work transactionally, retrying transient failures.
#[derive(Debug, Clone)]
pub struct TransactionalExecutor<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: TransactionSource> TransactionalExecutor<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Run `work` until it succeeds, fails permanently, or the retry budget
    /// is spent.
    #[instrument(skip_all, fields(max_attempts = self.policy.max_attempts()))]
    pub async fn run<W>(&self, work: &W) -> Result<W::Output, TxError>
    where
        W: UnitOfWork<S::Tx>,
    {
        let schedule = self.policy.backoff_schedule();
        let max_attempts = self.policy.max_attempts();
        let mut delays = schedule.iter();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let err = match self.attempt_once(work).await {
                Ok(output) => {
                    if attempt > 1 {
                        debug!(attempt, "transaction succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            let Some(delay) = delays.next() else {
                return Err(TxError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            };

            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transaction failed, retrying"
            );
            tokio::time::sleep(*delay).await;
        }
    }

    async fn attempt_once<W>(&self, work: &W) -> Result<W::Output, TxError>
    where
        W: UnitOfWork<S::Tx>,
    {
        let mut tx = self.source.begin().await?;

        match work.execute(&mut tx).await {
            Ok(output) => {
                tx.commit().await?;
                Ok(output)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, original = %err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
