use crate::db::error::{classify_failure, truncate_query};
use crate::db::{ConnectionManager, DatabaseError};
use crate::types::{QueryResult, Value};
use duckdb::Connection;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run `op` against the managed connection, recovering once from a
/// connection fault.
///
/// Statement errors are returned untouched. A connection fault triggers one
/// `reset()`, and if that succeeds, exactly one more attempt; whatever that
/// attempt returns is final.
pub(crate) fn with_recovery<T>(
    manager: &mut ConnectionManager,
    mut op: impl FnMut(&Connection) -> Result<T, duckdb::Error>,
) -> Result<T, DatabaseError> {
    let mut attempt = |manager: &mut ConnectionManager| -> Result<T, DatabaseError> {
        let handle = manager.get()?;
        debug!("Running against {}", handle.file_path().display());
        op(handle.connection()?).map_err(|e| classify_failure(&e))
    };

    match attempt(manager) {
        Err(DatabaseError::ConnectionFault(message)) => {
            warn!("Connection issue detected ({}), attempting to reset", message);
            if let Err(e) = manager.reset() {
                return Err(DatabaseError::ConnectionFault(format!(
                    "{} (connection reset failed: {})",
                    message, e
                )));
            }
            info!("Retrying after connection reset");
            attempt(manager).map_err(|e| {
                warn!("Retry failed: {}", e);
                e.prefixed("Query failed after connection reset")
            })
        }
        other => other,
    }
}

/// Execute one SQL statement and materialize its result.
///
/// At most `max_rows` rows are kept (`None` keeps everything); the full
/// result is still walked so `total_rows` is exact.
pub fn execute_query(
    manager: &mut ConnectionManager,
    query: &str,
    max_rows: Option<usize>,
) -> Result<QueryResult, DatabaseError> {
    let start = Instant::now();
    info!("Executing query: {}", truncate_query(query));

    let (columns, rows, total_rows) =
        with_recovery(manager, |conn| run_statement(conn, query, max_rows)).map_err(|e| {
            warn!("Error executing query: {}", e);
            e
        })?;

    let truncated = rows.len() < total_rows;
    info!(
        "Query executed successfully, returned {} rows{}",
        total_rows,
        if truncated { " (truncated)" } else { "" }
    );

    Ok(QueryResult {
        columns,
        rows,
        total_rows,
        truncated,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

/// Get the first `limit` rows of a table
pub fn preview_table(
    manager: &mut ConnectionManager,
    table_name: &str,
    limit: usize,
) -> Result<QueryResult, DatabaseError> {
    let query = format!(
        "SELECT * FROM \"{}\" LIMIT {}",
        table_name.replace('"', "\"\""),
        limit
    );
    execute_query(manager, &query, Some(limit))
}

type Materialized = (Vec<String>, Vec<Vec<Value>>, usize);

fn run_statement(
    conn: &Connection,
    query: &str,
    max_rows: Option<usize>,
) -> Result<Materialized, duckdb::Error> {
    let mut stmt = conn.prepare(query)?;
    let mut rows = stmt.query([])?;

    // Column metadata is only available once the statement has run
    let columns: Vec<String> = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let limit = max_rows.unwrap_or(usize::MAX);
    let mut kept = Vec::new();
    let mut total = 0usize;

    while let Some(row) = rows.next()? {
        total += 1;
        if kept.len() >= limit {
            continue;
        }
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value: duckdb::types::Value = row.get(i)?;
            values.push(Value::from(value));
        }
        kept.push(values);
    }

    Ok((columns, kept, total))
}
