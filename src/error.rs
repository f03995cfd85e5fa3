// error.rs
// Failure kinds of an export run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to connect to the database: {0}")]
    Connectivity(#[source] sqlx::Error),

    #[error("failed to list tables from the catalog: {0}")]
    CatalogQuery(#[source] sqlx::Error),

    #[error("failed to read table '{table}': {source}")]
    ExtractionQuery {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to serialize export document: {0}")]
    Serialization(String),

    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to close the database connection: {0}")]
    Close(#[source] sqlx::Error),

    #[error("unsupported database type: '{0}'. Supported types: postgres, mysql, sqlite")]
    UnsupportedDatabase(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for ExportError {
    fn from(e: serde_yaml::Error) -> Self {
        ExportError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
