//! Postgres-backed transaction source and result reader.
//!
//! ## Error Mapping
//!
//! SQLx errors are classified as follows:
//!
//! | SQLx Error | Condition | TxError |
//! |------------|-----------|---------|
//! | PoolTimedOut | every connection busy for the whole acquisition timeout | `PoolExhausted` |
//! | PoolTimedOut | pool had room, but no connection could be opened in time | `Transient` |
//! | Io | refused / reset / aborted / timed out / broken pipe / EOF | `Transient` |
//! | Database | SQLSTATE class `08` (connection exception) | `Transient` |
//! | Database | `40001` serialization failure, `40P01` deadlock | `Transient` |
//! | Database | `55P03` lock not available, `57014` statement timeout, `57P01` admin shutdown | `Transient` |
//! | anything else | | `Database` |

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use jobexport_core::JobId;

use crate::export::JobResultReader;
use crate::tx::{TransactionSource, Transactional, TxError};

/// Hands out Postgres transactions, one freshly acquired connection each.
#[derive(Debug, Clone)]
pub struct PgTransactionSource {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl PgTransactionSource {
    /// `acquire_timeout` must match the pool's own acquisition timeout; it is
    /// reported back in [`TxError::PoolExhausted`].
    pub fn new(pool: PgPool, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            acquire_timeout,
        }
    }
}

#[async_trait]
impl TransactionSource for PgTransactionSource {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, TxError> {
        // Pool::begin acquires a connection (bounded by acquire_timeout) and
        // issues BEGIN on it.
        let tx = self.pool.begin().await.map_err(|e| {
            classify_acquire_error(
                e,
                self.pool.size(),
                self.pool.options().get_max_connections(),
                self.acquire_timeout,
            )
        })?;

        Ok(PgTx {
            tx,
            acquire_timeout: self.acquire_timeout,
        })
    }
}

/// Open Postgres transaction; its connection returns to the pool when the
/// transaction is committed, rolled back, or dropped.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
    acquire_timeout: Duration,
}

#[async_trait]
impl Transactional for PgTx {
    async fn commit(self) -> Result<(), TxError> {
        let timeout = self.acquire_timeout;
        self.tx
            .commit()
            .await
            .map_err(|e| classify_sqlx_error("commit", e, timeout))
    }

    async fn rollback(self) -> Result<(), TxError> {
        let timeout = self.acquire_timeout;
        self.tx
            .rollback()
            .await
            .map_err(|e| classify_sqlx_error("rollback", e, timeout))
    }
}

#[async_trait]
impl JobResultReader for PgTx {
    #[instrument(skip_all, fields(job_id = %job_id), err)]
    async fn fetch_result_data(
        &mut self,
        job_id: &JobId,
    ) -> Result<Option<serde_json::Value>, TxError> {
        sqlx::query_scalar::<_, serde_json::Value>(
            r#"
            SELECT result_data
            FROM job_results
            WHERE job_id = $1
            "#,
        )
        .bind(job_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| classify_sqlx_error("select_result", e, self.acquire_timeout))
    }
}

/// Map a failed acquire-and-begin to the transactional failure taxonomy.
///
/// SQLx keeps reconnecting to an unreachable server until the acquisition
/// timeout and then reports `PoolTimedOut`, the same error a saturated pool
/// gives. `open_connections` (sampled after the failure) tells them apart:
/// only a pool at `max_connections` is exhausted.
pub fn classify_acquire_error(
    err: sqlx::Error,
    open_connections: u32,
    max_connections: u32,
    acquire_timeout: Duration,
) -> TxError {
    match err {
        sqlx::Error::PoolTimedOut if open_connections < max_connections => TxError::transient(
            "begin",
            format!("no connection could be established within {acquire_timeout:?}"),
        ),
        other => classify_sqlx_error("begin", other, acquire_timeout),
    }
}

/// Map a SQLx error to the transactional failure taxonomy.
pub fn classify_sqlx_error(
    operation: &'static str,
    err: sqlx::Error,
    acquire_timeout: Duration,
) -> TxError {
    match err {
        sqlx::Error::PoolTimedOut => TxError::PoolExhausted {
            timeout: acquire_timeout,
        },
        sqlx::Error::Io(io) if is_transient_io(io.kind()) => {
            TxError::transient(operation, io.to_string())
        }
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code() {
                Some(code) if is_transient_sqlstate(&code) => {
                    TxError::transient(operation, format!("{message} (SQLSTATE {code})"))
                }
                Some(code) => TxError::database(operation, format!("{message} (SQLSTATE {code})")),
                None => TxError::database(operation, message),
            }
        }
        other => TxError::database(operation, other.to_string()),
    }
}

/// I/O failures that indicate a dropped or unreachable connection.
pub fn is_transient_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;

    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::TimedOut
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

/// SQLSTATE codes for connection loss, lock contention, and timeouts.
pub fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "40001" | "40P01" | "55P03" | "57014" | "57P01")
}
