use crate::types::{QueryResult, Value};
use anyhow::{Context, Result};

/// Render a result as CSV with a header row. NULL becomes an empty field.
pub fn export_csv(result: &QueryResult) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(&result.columns)
        .context("Failed to write CSV header")?;

    for row in &result.rows {
        let record = row.iter().map(|value| match value {
            Value::Null => String::new(),
            other => other.to_string(),
        });
        writer
            .write_record(record)
            .context("Failed to write CSV row")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))
}
