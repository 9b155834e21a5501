use crate::types::QueryResult;
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

/// Render a result as a JSON array of row objects keyed by column name.
/// Blobs are base64-encoded by the value serializer.
pub fn export_json(result: &QueryResult) -> Result<Vec<u8>> {
    let mut rows = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        let mut obj = serde_json::Map::new();
        for (col_name, value) in result.columns.iter().zip(row) {
            let json_value = serde_json::to_value(value).context("Failed to serialize value")?;
            obj.insert(col_name.clone(), json_value);
        }
        rows.push(JsonValue::Object(obj));
    }

    serde_json::to_vec_pretty(&rows).context("Failed to serialize JSON")
}
