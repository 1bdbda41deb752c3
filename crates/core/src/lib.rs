//! `jobexport-core`: domain building blocks for job result exports.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifier validation, result records, and export outcomes.

pub mod error;
pub mod id;
pub mod record;

pub use error::{DomainError, DomainResult};
pub use id::{is_valid_job_id, JobId, ARTIFACT_SUFFIX, MAX_JOB_ID_LEN};
pub use record::{render_result_data, ExportArtifact, ExportOutcome, JobResultRecord};
