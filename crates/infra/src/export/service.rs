//! Export service: the transactional executor composed with the export job.

use async_trait::async_trait;
use tracing::{error, info, instrument};

use jobexport_core::{ExportOutcome, JobId};

use super::artifact::ArtifactWriter;
use super::pipeline::ExportJob;
use super::JobResultReader;
use crate::tx::{TransactionSource, TransactionalExecutor, TxError};

/// Export entry point used by the HTTP layer.
#[async_trait]
pub trait JobExporter: Send + Sync {
    async fn export(&self, job_id: &JobId) -> Result<ExportOutcome, TxError>;
}

/// Exports job results through a retrying transactional executor.
#[derive(Debug, Clone)]
pub struct ExportService<S> {
    executor: TransactionalExecutor<S>,
    writer: ArtifactWriter,
}

impl<S> ExportService<S>
where
    S: TransactionSource,
    S::Tx: JobResultReader,
{
    pub fn new(executor: TransactionalExecutor<S>, writer: ArtifactWriter) -> Self {
        Self { executor, writer }
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }
}

#[async_trait]
impl<S> JobExporter for ExportService<S>
where
    S: TransactionSource,
    S::Tx: JobResultReader,
{
    #[instrument(skip_all, fields(job_id = %job_id))]
    async fn export(&self, job_id: &JobId) -> Result<ExportOutcome, TxError> {
        let job = ExportJob::new(job_id, &self.writer);

        match self.executor.run(&job).await {
            Ok(outcome) => {
                match &outcome {
                    ExportOutcome::Exported(artifact) => {
                        info!(file = %artifact.file_name, "job result exported")
                    }
                    ExportOutcome::NotFound => info!("job result not found"),
                }
                Ok(outcome)
            }
            Err(err) => {
                error!(job_id = %job_id, stage = err.stage(), error = %err, "export failed");
                Err(err)
            }
        }
    }
}
