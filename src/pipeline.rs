// pipeline.rs
// Connect, read every table, write the document, close.

use crate::db::accessors::{self, DataAccessor};
use crate::db::connection::{ConnectionParams, DbKind};
use crate::db::models::ExportDocument;
use crate::error::{ExportError, Result};
use crate::export::exporter::{DocumentExporter, OutputFormat};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub kind: DbKind,
    pub params: ConnectionParams,
    pub schema: Option<String>,
    pub output_file: PathBuf,
    pub format: OutputFormat,
    /// Omit tables whose read fails instead of aborting the run.
    pub skip_failed_tables: bool,
    pub atomic_write: bool,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub tables: usize,
    pub rows: usize,
    pub skipped: Vec<String>,
}

/// Lists the catalog and reads each table in order.
pub async fn extract_document(accessor: &mut dyn DataAccessor, skip_failed_tables: bool) -> Result<(ExportDocument, Vec<String>)> {
    let names = accessor.list_tables().await?;
    info!(count = names.len(), "found tables");

    let mut document = ExportDocument::default();
    let mut skipped = Vec::new();
    for name in names {
        match accessor.extract_table(&name).await {
            Ok(table) => document.tables.push(table),
            Err(e @ ExportError::ExtractionQuery { .. }) if skip_failed_tables => {
                warn!(table = %name, error = %e, "skipping table");
                skipped.push(name);
            }
            Err(e) => return Err(e),
        }
    }
    Ok((document, skipped))
}

/// Runs one full export. Nothing is written unless every step before the write succeeded.
pub async fn run_export(request: &ExportRequest) -> Result<ExportSummary> {
    request.params.validate(request.kind)?;

    let mut accessor = accessors::connect(request.kind, &request.params, request.schema.as_deref()).await?;
    info!(target_db = %request.params.describe(request.kind), "connected to the database");

    let outcome = export_with(accessor.as_mut(), request).await;

    match accessor.close().await {
        Ok(()) => info!("database connection closed"),
        Err(e) => warn!(error = %e, "closing the database connection failed"),
    }
    outcome
}

async fn export_with(accessor: &mut dyn DataAccessor, request: &ExportRequest) -> Result<ExportSummary> {
    let (document, skipped) = extract_document(accessor, request.skip_failed_tables).await?;
    let exporter = DocumentExporter { atomic: request.atomic_write };
    exporter.export_document_to_file(&document, &request.output_file, request.format)?;
    debug!(path = %request.output_file.display(), "document written");

    let summary = ExportSummary { tables: document.tables.len(), rows: document.total_rows(), skipped };
    info!(
        tables = summary.tables,
        rows = summary.rows,
        skipped = summary.skipped.len(),
        path = %request.output_file.display(),
        "export finished"
    );
    Ok(summary)
}
