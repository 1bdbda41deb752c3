//! Export service wiring.

use std::path::Path;
use std::sync::Arc;

use sqlx::PgPool;

use jobexport_infra::config::ServiceConfig;
use jobexport_infra::db::{InMemoryResultStore, PgTransactionSource};
use jobexport_infra::export::{ArtifactWriter, ExportService, JobExporter};
use jobexport_infra::tx::{RetryPolicy, TransactionalExecutor};

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub exporter: Arc<dyn JobExporter>,
}

impl AppServices {
    pub fn new(exporter: Arc<dyn JobExporter>) -> Self {
        Self { exporter }
    }

    /// Production wiring: exports read from Postgres through `pool`.
    pub fn postgres(pool: PgPool, config: &ServiceConfig) -> Self {
        let source = PgTransactionSource::new(pool, config.database.acquire_timeout);
        let executor = TransactionalExecutor::new(source, config.retry.clone());
        let writer = ArtifactWriter::new(&config.export.export_dir);

        Self::new(Arc::new(ExportService::new(executor, writer)))
    }

    /// Exports backed by an in-memory store (tests, local runs without a database).
    pub fn in_memory(store: InMemoryResultStore, export_dir: &Path, retry: RetryPolicy) -> Self {
        let executor = TransactionalExecutor::new(store, retry);
        let writer = ArtifactWriter::new(export_dir);

        Self::new(Arc::new(ExportService::new(executor, writer)))
    }
}
