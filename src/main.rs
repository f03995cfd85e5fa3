// src/main.rs
mod app;
mod db;
mod error;
mod export;
mod pipeline;

use clap::Parser;
use anyhow::Result;
use db::connection::{ConnectionParams, DbKind};
use error::ExportError;
use export::exporter::OutputFormat;
use pipeline::{run_export, ExportRequest};
use app::tui::run_tui;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Export every table of a database schema to one JSON document", long_about = None)]
struct Args {
    #[arg(long, default_value = "postgres")]
    db_type: String,
    #[arg(long, env = "DB_HOST", default_value = "")]
    host: String,
    #[arg(long, env = "DB_PORT")]
    port: Option<u16>,
    /// Database name, or the file path for SQLite
    #[arg(long, env = "DB_NAME", default_value = "")]
    dbname: String,
    #[arg(long, env = "DB_USER", default_value = "")]
    user: String,
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
    /// Full connection URL, used instead of the individual parts
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    connection_string: Option<String>,
    /// Schema to export (postgres: public, mysql: current database)
    #[arg(long)]
    schema: Option<String>,
    #[arg(long)]
    output_file: Option<PathBuf>,
    #[arg(long, default_value = "json")]
    format: String,
    /// Leave out tables that cannot be read instead of aborting
    #[arg(long, default_value_t = false)]
    skip_failed_tables: bool,
    /// Write to a temporary file and rename it over the output
    #[arg(long, default_value_t = false)]
    atomic_write: bool,
    #[arg(long, default_value_t = false)]
    tui: bool,
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    if args.tui {
        // log lines would tear the terminal UI
        init_logging("off");
        run_tui().await?;
        return Ok(ExitCode::SUCCESS);
    }
    init_logging("info");

    let kind: DbKind = args.db_type.parse()?;
    let format: OutputFormat = args.format.parse()?;
    let output_file = args
        .output_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("data.{}", format.extension())));

    let request = ExportRequest {
        kind,
        params: ConnectionParams {
            dbname: args.dbname,
            user: args.user,
            password: args.password,
            host: args.host,
            port: args.port,
            connection_string: args.connection_string,
        },
        schema: args.schema,
        output_file,
        format,
        skip_failed_tables: args.skip_failed_tables,
        atomic_write: args.atomic_write,
    };

    println!("--- Database Table Data Export ---");
    println!("Database Type: {}", request.kind);
    println!("Connection: {}", request.params.describe(request.kind));
    if let Some(schema) = &request.schema {
        println!("Schema: {}", schema);
    }
    println!("Output: {} ({})", request.output_file.display(), request.format.extension());
    println!("----------------------------------");

    match run_export(&request).await {
        Ok(summary) => {
            if !summary.skipped.is_empty() {
                println!("Skipped tables: {}", summary.skipped.join(", "));
            }
            println!("Process completed successfully!");
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ ExportError::Connectivity(_)) => {
            error!(error = %e, "could not connect, nothing was exported");
            println!("Failed to connect to the database.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
