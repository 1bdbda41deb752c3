use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{debug, error};

use jobexport_core::{ExportOutcome, JobId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/:job_id/export", get(export_job))
}

/// `GET /api/v1/jobs/:job_id/export`
///
/// Validates the identifier before anything touches the database or the
/// export directory, then runs the export on its own task: dropping the
/// request future (client disconnect) must not abort a transaction or a
/// write that is already in flight.
pub async fn export_job(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<String>, PathRejection>,
) -> axum::response::Response {
    let raw = match path {
        Ok(Path(raw)) => raw,
        Err(rejection) => {
            debug!(error = %rejection, "undecodable job_id");
            return errors::invalid_job_id();
        }
    };

    let job_id = match JobId::parse(&raw) {
        Ok(id) => id,
        Err(e) => {
            debug!(error = %e, "rejected job_id");
            return errors::invalid_job_id();
        }
    };

    let exporter = services.exporter.clone();
    let task_job_id = job_id.clone();
    let joined = tokio::spawn(async move { exporter.export(&task_job_id).await }).await;

    match joined {
        Ok(Ok(ExportOutcome::Exported(artifact))) => (
            StatusCode::OK,
            Json(dto::ExportResponse {
                file: artifact.file_name,
            }),
        )
            .into_response(),
        Ok(Ok(ExportOutcome::NotFound)) => errors::job_not_found(),
        // Already logged with stage by the export service.
        Ok(Err(_)) => errors::internal_error(),
        Err(e) => {
            error!(job_id = %job_id, error = %e, "export task did not complete");
            errors::internal_error()
        }
    }
}
