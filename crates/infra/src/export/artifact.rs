//! Export artifact writer.

use std::path::PathBuf;

use tracing::warn;
use uuid::Uuid;

use jobexport_core::{ExportArtifact, JobId};

use crate::tx::TxError;

/// Writes `{job_id}_result.json` files into the export directory.
///
/// Content goes to a uniquely named temporary sibling first and is then
/// renamed over the final path, so the final path only ever holds a complete
/// artifact even while several requests export the same job.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    export_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn artifact_path(&self, job_id: &JobId) -> PathBuf {
        self.export_dir.join(job_id.artifact_file_name())
    }

    /// Create or overwrite the artifact for `job_id` with `contents`.
    pub async fn write(&self, job_id: &JobId, contents: &str) -> Result<ExportArtifact, TxError> {
        let file_name = job_id.artifact_file_name();
        let final_path = self.export_dir.join(&file_name);
        let tmp_path = self
            .export_dir
            .join(format!(".{file_name}.{}.tmp", Uuid::now_v7().simple()));

        let written = match tokio::fs::write(&tmp_path, contents.as_bytes()).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &final_path).await,
            Err(e) => Err(e),
        };

        if let Err(source) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove temporary artifact");
                }
            }
            return Err(TxError::ArtifactWrite {
                path: final_path,
                source,
            });
        }

        Ok(ExportArtifact { file_name })
    }
}
