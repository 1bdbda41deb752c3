//! The export unit of work: read the record, serialize it, write the artifact.

use async_trait::async_trait;
use tracing::{debug, instrument};

use jobexport_core::{render_result_data, ExportOutcome, JobId};

use super::artifact::ArtifactWriter;
use super::JobResultReader;
use crate::tx::{TxError, UnitOfWork};

/// Exports one job's result record inside a transaction attempt.
///
/// The file write is not covered by the transaction: a failed write after a
/// successful read still fails the attempt (and rolls it back), and a retried
/// attempt simply reads and overwrites again.
#[derive(Debug, Clone, Copy)]
pub struct ExportJob<'a> {
    job_id: &'a JobId,
    writer: &'a ArtifactWriter,
}

impl<'a> ExportJob<'a> {
    pub fn new(job_id: &'a JobId, writer: &'a ArtifactWriter) -> Self {
        Self { job_id, writer }
    }
}

#[async_trait]
impl<'a, Tx> UnitOfWork<Tx> for ExportJob<'a>
where
    Tx: JobResultReader,
{
    type Output = ExportOutcome;

    #[instrument(skip_all, fields(job_id = %self.job_id))]
    async fn execute(&self, tx: &mut Tx) -> Result<ExportOutcome, TxError> {
        let Some(result_data) = tx.fetch_result_data(self.job_id).await? else {
            debug!("no result record");
            return Ok(ExportOutcome::NotFound);
        };

        let contents = render_result_data(&result_data).map_err(|e| TxError::MalformedData {
            job_id: self.job_id.to_string(),
            message: e.to_string(),
        })?;

        let artifact = self.writer.write(self.job_id, &contents).await?;
        debug!(file = %artifact.file_name, bytes = contents.len(), "artifact written");
        Ok(ExportOutcome::Exported(artifact))
    }
}
