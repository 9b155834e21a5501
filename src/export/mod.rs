mod csv;
mod json;

use crate::types::QueryResult;
use anyhow::Result;
use serde::Deserialize;

pub use csv::export_csv;
pub use json::export_json;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "query_result.csv",
            ExportFormat::Json => "query_result.json",
        }
    }
}

/// Render a result in the requested format
pub fn export(result: &QueryResult, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => export_csv(result),
        ExportFormat::Json => export_json(result),
    }
}
