use crate::db::query::with_recovery;
use crate::db::{ConnectionManager, DatabaseError};
use crate::types::{ColumnInfo, TableInfo, TableSchema};
use duckdb::Connection;
use tracing::{debug, warn};

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_names(conn: &Connection) -> Result<Vec<String>, duckdb::Error> {
    let mut stmt = conn.prepare("SHOW TABLES")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn table_row_count(conn: &Connection, table_name: &str) -> Result<u64, duckdb::Error> {
    let query = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
    let count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

fn describe(conn: &Connection, table_name: &str) -> Result<Vec<ColumnInfo>, duckdb::Error> {
    // DESCRIBE yields column_name, column_type, null, key, default, extra
    let mut stmt = conn.prepare(&format!("DESCRIBE {}", quote_identifier(table_name)))?;
    let columns = stmt
        .query_map([], |row| {
            let nullable: Option<String> = row.get(2)?;
            let key: Option<String> = row.get(3)?;
            Ok(ColumnInfo {
                name: row.get(0)?,
                declared_type: row.get(1)?,
                nullable: nullable.is_some_and(|n| n.eq_ignore_ascii_case("YES")),
                primary_key: key.is_some_and(|k| k.eq_ignore_ascii_case("PRI")),
                default_value: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Get all tables in the database with their row counts
pub fn list_tables(manager: &mut ConnectionManager) -> Result<Vec<TableInfo>, DatabaseError> {
    with_recovery(manager, |conn| {
        let mut tables = Vec::new();
        for name in table_names(conn)? {
            let row_count = match table_row_count(conn, &name) {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Failed to count rows in {}: {}", name, e);
                    None
                }
            };
            tables.push(TableInfo { name, row_count });
        }
        Ok(tables)
    })
}

/// Describe one table. Never cached: every call asks the live connection.
pub fn table_schema(
    manager: &mut ConnectionManager,
    table_name: &str,
) -> Result<TableSchema, DatabaseError> {
    debug!("Fetching schema for table: {}", table_name);
    let columns = with_recovery(manager, |conn| describe(conn, table_name))?;
    debug!("Schema for {}: {} columns", table_name, columns.len());

    Ok(TableSchema {
        table_name: table_name.to_string(),
        columns,
    })
}

/// Text block describing every table, for the SQL translator.
///
/// Tables that cannot be described are logged and left out.
pub fn schema_summary(manager: &mut ConnectionManager) -> Result<String, DatabaseError> {
    let schemas = with_recovery(manager, |conn| {
        let mut schemas = Vec::new();
        for name in table_names(conn)? {
            match describe(conn, &name) {
                Ok(columns) => schemas.push(TableSchema {
                    table_name: name,
                    columns,
                }),
                Err(e) => warn!("Error getting schema info for table {}: {}", name, e),
            }
        }
        Ok(schemas)
    })?;

    Ok(schemas
        .iter()
        .map(TableSchema::summary)
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use tempfile::TempDir;

    #[test]
    fn lists_tables_with_counts() {
        let dir = TempDir::new().unwrap();
        let mut manager =
            ConnectionManager::new(fixtures::sample_database(dir.path(), "sample.duckdb"));

        let mut tables = list_tables(&mut manager).unwrap();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        let summary: Vec<_> = tables
            .iter()
            .map(|t| (t.name.as_str(), t.row_count))
            .collect();
        assert_eq!(summary, vec![("empty_table", Some(0)), ("orders", Some(3))]);
    }

    #[test]
    fn describes_columns_in_declaration_order() {
        let dir = TempDir::new().unwrap();
        let mut manager =
            ConnectionManager::new(fixtures::sample_database(dir.path(), "sample.duckdb"));

        let schema = table_schema(&mut manager, "orders").unwrap();

        let names: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "customer", "amount", "ordered_on", "note"]);

        let id = &schema.columns[0];
        assert_eq!(id.declared_type, "INTEGER");
        assert!(!id.nullable);

        let customer = &schema.columns[1];
        assert!(!customer.nullable);
        assert!(schema.columns[4].nullable);
        assert_eq!(schema.columns[2].declared_type, "DECIMAL(10,2)");
    }

    #[test]
    fn unknown_table_is_a_query_error() {
        let dir = TempDir::new().unwrap();
        let mut manager =
            ConnectionManager::new(fixtures::sample_database(dir.path(), "sample.duckdb"));

        let err = table_schema(&mut manager, "nope").unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[test]
    fn summary_covers_every_table_without_sample_rows() {
        let dir = TempDir::new().unwrap();
        let mut manager =
            ConnectionManager::new(fixtures::sample_database(dir.path(), "sample.duckdb"));

        let summary = schema_summary(&mut manager).unwrap();

        assert!(summary.contains("TABLE: orders\nCOLUMNS:\n  - id (INTEGER, NOT NULL)"));
        assert!(summary.contains("  - note (VARCHAR, NULL)"));
        assert!(summary.contains("TABLE: empty_table"));
        assert!(!summary.contains("grace"));
    }

    #[test]
    fn schema_changes_are_seen_after_swap() {
        let dir = TempDir::new().unwrap();
        let mut manager =
            ConnectionManager::new(fixtures::sample_database(dir.path(), "sample.duckdb"));
        assert!(table_schema(&mut manager, "orders").is_ok());

        manager
            .swap(&fixtures::other_database(dir.path(), "other.duckdb"))
            .unwrap();

        assert!(table_schema(&mut manager, "orders").is_err());
        assert_eq!(table_schema(&mut manager, "sensors").unwrap().columns.len(), 2);
    }
}
