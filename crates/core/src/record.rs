//! Result records and export outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;

/// A computed job result as persisted in `job_results`.
///
/// Immutable from this system's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultRecord {
    pub job_id: JobId,
    pub result_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobResultRecord {
    pub fn new(job_id: JobId, result_data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            result_data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A materialized export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifact {
    /// Bare file name inside the export directory, `{job_id}_result.json`.
    pub file_name: String,
}

/// Outcome of a single export request.
///
/// A missing record is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported(ExportArtifact),
    NotFound,
}

impl ExportOutcome {
    pub fn artifact(&self) -> Option<&ExportArtifact> {
        match self {
            ExportOutcome::Exported(a) => Some(a),
            ExportOutcome::NotFound => None,
        }
    }
}

/// Canonical textual form of a record's `result_data`.
///
/// JSON strings are taken as already-serialized text and returned verbatim;
/// every other value is pretty-printed with two-space indentation.
pub fn render_result_data(value: &serde_json::Value) -> DomainResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string_pretty(other)
            .map_err(|e| DomainError::malformed(format!("result_data: {e}"))),
    }
}
