use super::DatabaseError;

/// DuckDB error-message prefixes that always describe the statement itself,
/// never the handle it ran on.
const STATEMENT_ERROR_PREFIXES: &[&str] = &[
    "parser error",
    "binder error",
    "catalog error",
    "conversion error",
    "constraint error",
    "syntax error",
];

/// Fragments of statement-level rejections whose error class is too broad to
/// exclude by prefix.
const STATEMENT_ERROR_MARKERS: &[&str] = &["attached in read-only mode", "read-only transaction"];

/// Whether an engine message looks like a broken connection rather than a
/// problem with the SQL.
///
/// DuckDB only exposes failure text through the binding, so this is a text
/// heuristic. Statement-level error classes are excluded first so that e.g.
/// `Catalog Error: ... database ... does not exist` is not treated as a
/// connection fault.
pub fn is_connection_fault(message: &str) -> bool {
    let lower = message.trim_start().to_lowercase();
    if STATEMENT_ERROR_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
        || STATEMENT_ERROR_MARKERS
            .iter()
            .any(|marker| lower.contains(marker))
    {
        return false;
    }
    lower.contains("connection") || lower.contains("database")
}

/// Sort an engine failure into the retryable and non-retryable classes.
pub fn classify_failure(error: &duckdb::Error) -> DatabaseError {
    let message = error.to_string();
    if is_connection_fault(&message) {
        DatabaseError::ConnectionFault(message)
    } else {
        DatabaseError::Query(message)
    }
}

/// Shorten a statement for log lines
pub fn truncate_query(query: &str) -> String {
    const LIMIT: usize = 100;
    match query.char_indices().nth(LIMIT - 3) {
        Some((cut, _)) if query.chars().count() > LIMIT => format!("{}...", &query[..cut]),
        _ => query.to_string(),
    }
}
