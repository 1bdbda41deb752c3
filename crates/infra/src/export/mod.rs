//! Job result export pipeline.
//!
//! ## Components
//!
//! - `JobResultReader`: parameterized lookup of `result_data` inside a transaction
//! - `ArtifactWriter`: atomic create-or-overwrite of `{job_id}_result.json`
//! - `ExportJob`: the unit of work (read, serialize, write)
//! - `ExportService` / `JobExporter`: executor + unit of work, as used by the API

pub mod artifact;
pub mod pipeline;
pub mod service;

use async_trait::async_trait;

use jobexport_core::JobId;

use crate::tx::TxError;

pub use artifact::ArtifactWriter;
pub use pipeline::ExportJob;
pub use service::{ExportService, JobExporter};

/// Read access to `job_results` within an open transaction.
#[async_trait]
pub trait JobResultReader: Send {
    /// `result_data` for `job_id`, or `None` if there is no such record.
    async fn fetch_result_data(
        &mut self,
        job_id: &JobId,
    ) -> Result<Option<serde_json::Value>, TxError>;
}
