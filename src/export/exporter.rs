// export/exporter.rs
// Handles writing the export document to a file

use crate::db::models::ExportDocument;
use crate::error::{ExportError, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(ExportError::InvalidConfig(format!("unsupported format '{}'", other))),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExporter {
    /// Write to a sibling temp file and rename it into place.
    pub atomic: bool,
}

impl DocumentExporter {
    /// Renders the document. JSON uses a four space indent and keeps non-ASCII text literal.
    pub fn render(&self, document: &ExportDocument, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Json => {
                let mut buf = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
                document.serialize(&mut ser)?;
                Ok(buf)
            }
            OutputFormat::Yaml => Ok(serde_yaml::to_string(document)?.into_bytes()),
        }
    }

    /// Overwrites `output_file` with the rendered document.
    ///
    /// Without `atomic`, a failure part way through leaves a truncated file behind.
    pub fn export_document_to_file(&self, document: &ExportDocument, output_file: &Path, format: OutputFormat) -> Result<()> {
        let serialized = self.render(document, format)?;
        if self.atomic {
            let tmp = temp_path(output_file);
            let written = write_file(&tmp, &serialized)
                .and_then(|_| fs::rename(&tmp, output_file).map_err(|source| ExportError::Write { path: output_file.to_path_buf(), source }));
            if written.is_err() {
                let _ = fs::remove_file(&tmp);
            }
            written
        } else {
            write_file(output_file, &serialized)
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let to_err = |source| ExportError::Write { path: path.to_path_buf(), source };
    let mut file = File::create(path).map_err(to_err)?;
    file.write_all(bytes).map_err(to_err)?;
    file.sync_all().map_err(to_err)
}

fn temp_path(output_file: &Path) -> PathBuf {
    let mut name = output_file.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("export"));
    name.push(".tmp");
    output_file.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CellValue, TableData};
    use rust_decimal::Decimal;

    fn sample() -> ExportDocument {
        ExportDocument {
            tables: vec![
                TableData::new(
                    "users",
                    vec!["id".into(), "name".into(), "balance".into(), "joined".into()],
                    vec![
                        vec![
                            CellValue::Integer(1),
                            CellValue::Text("Анна".into()),
                            CellValue::Decimal(Decimal::new(1050, 2)),
                            CellValue::Other("2024-03-01".into()),
                        ],
                        vec![
                            CellValue::Integer(2),
                            CellValue::Text("Bo".into()),
                            CellValue::Decimal(Decimal::new(0, 1)),
                            CellValue::Null,
                        ],
                    ],
                ),
                TableData::new("empty_table", vec![], vec![]),
            ],
        }
    }

    #[test]
    fn json_is_indented_and_keeps_unicode() {
        let text = String::from_utf8(DocumentExporter::default().render(&sample(), OutputFormat::Json).unwrap()).unwrap();
        assert!(text.contains("\"Анна\""), "{text}");
        assert!(text.contains("\n    \"users\": [\n        {\n            \"id\": 1,"), "{text}");
        assert!(text.contains("\"balance\": 10.5,"), "{text}");
        assert!(text.contains("\"balance\": 0.0,"), "{text}");
        assert!(text.contains("\"joined\": \"2024-03-01\""), "{text}");
        assert!(text.contains("\"empty_table\": []"), "{text}");

        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["users"][1]["joined"], serde_json::Value::Null);
        // table order follows the document
        assert!(text.find("users").unwrap() < text.find("empty_table").unwrap());
    }

    #[test]
    fn yaml_rendering() {
        let text = String::from_utf8(DocumentExporter::default().render(&sample(), OutputFormat::Yaml).unwrap()).unwrap();
        let back: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back["users"][0]["balance"].as_f64(), Some(10.5));
        assert_eq!(back["empty_table"].as_sequence().map(|s| s.len()), Some(0));
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "stale content that is longer than nothing at all").unwrap();

        let doc = ExportDocument { tables: vec![TableData::new("t", vec![], vec![])] };
        DocumentExporter::default().export_document_to_file(&doc, &path, OutputFormat::Json).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n    \"t\": []\n}");
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let exporter = DocumentExporter { atomic: true };
        exporter.export_document_to_file(&sample(), &path, OutputFormat::Json).unwrap();

        let back: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back["users"][0]["id"], 1);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_failure_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("data.json");
        let err = DocumentExporter::default()
            .export_document_to_file(&sample(), &path, OutputFormat::Json)
            .unwrap_err();
        assert!(matches!(err, ExportError::Write { path: ref p, .. } if p == &path));
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
