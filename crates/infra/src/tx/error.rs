//! Failures of a transactional unit of work.

use std::path::PathBuf;
use std::time::Duration;

/// Error raised by the transactional executor or a unit of work it runs.
///
/// Only [`TxError::Transient`] is retried. Everything else, including
/// application failures raised inside the unit of work, propagates on the
/// first occurrence.
#[derive(Debug, thiserror::Error)]
pub enum TxError {
    /// No pooled connection became available within the acquisition timeout.
    #[error("no database connection available within {timeout:?}")]
    PoolExhausted { timeout: Duration },

    /// Connection loss, timeout, or lock contention.
    #[error("transient database failure during {operation}: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },

    /// Any database failure not known to be transient.
    #[error("database failure during {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// The export artifact could not be written.
    #[error("failed to write export artifact {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored result could not be serialized.
    #[error("malformed result data for job {job_id}: {message}")]
    MalformedData { job_id: String, message: String },

    /// Every allowed attempt failed with a transient error.
    #[error("transaction failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TxError>,
    },
}

impl TxError {
    pub fn transient(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transient {
            operation,
            message: message.into(),
        }
    }

    pub fn database(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Database {
            operation,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TxError::Transient { .. })
    }

    /// Pipeline stage the failure belongs to, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            TxError::PoolExhausted { .. } => "acquire",
            TxError::Transient { operation, .. } | TxError::Database { operation, .. } => {
                *operation
            }
            TxError::ArtifactWrite { .. } => "write_artifact",
            TxError::MalformedData { .. } => "serialize",
            TxError::RetriesExhausted { last, .. } => last.stage(),
        }
    }
}
