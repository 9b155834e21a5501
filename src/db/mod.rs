pub mod error;
mod manager;
pub mod query;
mod schema;

use duckdb::{AccessMode, Config, Connection};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use manager::{ConnectionManager, ConnectionState, ManagerStatus};
pub use query::{execute_query, preview_table};
pub use schema::{list_tables, schema_summary, table_schema};

#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    /// Configured path is missing, unreadable, or no database is configured
    #[error("{0}")]
    Configuration(String),
    #[error("Failed to open database {path}: {message}")]
    Open { path: String, message: String },
    /// Execution failure believed to come from an invalidated handle
    #[error("{0}")]
    ConnectionFault(String),
    #[error("{0}")]
    Query(String),
    #[error("Database is not ready: {0}")]
    NotReady(String),
}

impl DatabaseError {
    /// Same kind of error with `context` in front of its message
    pub(crate) fn prefixed(self, context: &str) -> Self {
        let wrap = |message: String| format!("{}: {}", context, message);
        match self {
            DatabaseError::Configuration(m) => DatabaseError::Configuration(wrap(m)),
            DatabaseError::Open { path, message } => DatabaseError::Open {
                path,
                message: wrap(message),
            },
            DatabaseError::ConnectionFault(m) => DatabaseError::ConnectionFault(wrap(m)),
            DatabaseError::Query(m) => DatabaseError::Query(wrap(m)),
            DatabaseError::NotReady(m) => DatabaseError::NotReady(wrap(m)),
        }
    }
}

/// Resolve a configured database path to an absolute file path.
pub fn resolve_path(path: &Path) -> Result<PathBuf, DatabaseError> {
    if !path.is_file() {
        return Err(DatabaseError::Configuration(format!(
            "Database file not found: {}",
            path.display()
        )));
    }
    path.canonicalize().map_err(|e| {
        DatabaseError::Configuration(format!(
            "Database file is not readable: {}: {}",
            path.display(),
            e
        ))
    })
}

/// Open a read-only connection and prove it works with a liveness probe.
pub fn open_read_only(path: &Path) -> Result<Connection, DatabaseError> {
    let path_str = path.display().to_string();
    let open_error = |e: duckdb::Error| DatabaseError::Open {
        path: path_str.clone(),
        message: e.to_string(),
    };

    let config = Config::default()
        .access_mode(AccessMode::ReadOnly)
        .map_err(open_error)?;
    let conn = Connection::open_with_flags(path, config).map_err(open_error)?;

    conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
        .map_err(open_error)?;

    Ok(conn)
}
