use crate::db::connection::ConnectionParams;
use crate::export::exporter::OutputFormat;
use crate::pipeline::{run_export, ExportRequest};
use anyhow::{Result, anyhow};
use std::path::PathBuf;

/// Runs the export with the values collected by the TUI.
/// Returns Ok(msg) on success, or Err(error) with context on failure.
pub async fn tui_export_flow(state: &super::tui::TuiState) -> Result<String> {
    let kind = state.selected_kind();
    let port = if state.port.trim().is_empty() {
        None
    } else {
        Some(state.port.trim().parse::<u16>().map_err(|_| anyhow!("Invalid port: '{}'", state.port))?)
    };
    let output_file = if state.output_file.trim().is_empty() {
        PathBuf::from("data.json")
    } else {
        PathBuf::from(state.output_file.trim())
    };
    let format = match output_file.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => OutputFormat::Yaml,
        _ => OutputFormat::Json,
    };

    let request = ExportRequest {
        kind,
        params: ConnectionParams {
            dbname: state.dbname.clone(),
            user: state.username.clone(),
            password: state.password.clone(),
            host: state.host.clone(),
            port,
            connection_string: None,
        },
        schema: if state.schema.is_empty() { None } else { Some(state.schema.clone()) },
        output_file: output_file.clone(),
        format,
        skip_failed_tables: false,
        atomic_write: false,
    };

    let summary = run_export(&request).await.map_err(|e| anyhow!("Export failed: {}", e))?;
    Ok(format!(
        "Export completed!\n{} tables, {} rows written to {}",
        summary.tables,
        summary.rows,
        output_file.display()
    ))
}
