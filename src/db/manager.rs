use super::{open_read_only, resolve_path, DatabaseError};
use duckdb::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Lifecycle state of the managed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Uninitialized,
    Open,
    Broken,
}

/// Snapshot reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub state: ConnectionState,
    pub database: Option<String>,
    pub opens: u64,
    pub resets: u64,
}

/// Read-only connection bound to one database file
pub struct Handle {
    conn: Option<Connection>,
    file_path: PathBuf,
}

impl Handle {
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Borrow the live connection. A handle closed underneath the manager
    /// fails here instead of yielding stale data.
    pub fn connection(&self) -> Result<&Connection, DatabaseError> {
        self.conn.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFault(format!(
                "Connection to {} is closed",
                self.file_path.display()
            ))
        })
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_conn, e)) = conn.close() {
                warn!(
                    "Error closing connection to {}: {}",
                    self.file_path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owner of the single database handle.
///
/// `get()` opens lazily from the configured path, `reset()` reopens the
/// configured path, and `swap()` moves to a new file. A failed swap leaves
/// the manager with neither a handle nor a configured path, so it can never
/// fall back to serving the previous file.
pub struct ConnectionManager {
    configured_path: Option<PathBuf>,
    handle: Option<Handle>,
    state: ConnectionState,
    opens: u64,
    resets: u64,
}

impl ConnectionManager {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            configured_path: Some(path.into()),
            handle: None,
            state: ConnectionState::Uninitialized,
            opens: 0,
            resets: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn configured_path(&self) -> Option<&Path> {
        self.configured_path.as_deref()
    }

    /// Number of handles opened so far
    pub fn open_count(&self) -> u64 {
        self.opens
    }

    pub fn reset_count(&self) -> u64 {
        self.resets
    }

    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            state: self.state(),
            database: self.configured_path().map(|p| p.display().to_string()),
            opens: self.open_count(),
            resets: self.reset_count(),
        }
    }

    /// Return the open handle, opening it from the configured path first if
    /// needed. A failed open leaves the state unchanged.
    pub fn get(&mut self) -> Result<&Handle, DatabaseError> {
        if self.state != ConnectionState::Open || self.handle.is_none() {
            let path = self.require_configured_path()?;
            let handle = self.open_handle(&path)?;
            self.handle = Some(handle);
            self.transition(ConnectionState::Open);
        }

        self.handle
            .as_ref()
            .ok_or_else(|| DatabaseError::NotReady("no open connection".to_string()))
    }

    /// Close and reopen the configured database. Ends in `Open` on success
    /// and in `Broken` (no handle) on any failure.
    pub fn reset(&mut self) -> Result<(), DatabaseError> {
        info!("Resetting database connection");
        self.resets += 1;
        self.close_handle();

        let reopened = self
            .require_configured_path()
            .and_then(|path| self.open_handle(&path));

        match reopened {
            Ok(handle) => {
                self.handle = Some(handle);
                self.transition(ConnectionState::Open);
                info!("Connection reset successful");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to reset connection: {}", e);
                self.transition(ConnectionState::Broken);
                Err(e)
            }
        }
    }

    /// Point the manager at a different database file.
    ///
    /// Either ends fully on `new_path` with a probed handle, or with no
    /// handle and no configured path.
    pub fn swap(&mut self, new_path: &Path) -> Result<(), DatabaseError> {
        info!("Changing database to: {}", new_path.display());
        self.close_handle();

        match self.open_handle(new_path) {
            Ok(handle) => {
                self.configured_path = Some(handle.file_path.clone());
                self.handle = Some(handle);
                self.transition(ConnectionState::Open);
                info!("Database change successful");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to change database: {}", e);
                self.configured_path = None;
                self.transition(ConnectionState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Release the handle at shutdown. The configured path is kept.
    pub fn close(&mut self) {
        if self.handle.is_some() {
            info!("Closing database connection on shutdown");
        }
        self.close_handle();
        self.transition(ConnectionState::Uninitialized);
    }

    /// Close the underlying connection while leaving the manager believing it
    /// is still open, as if the handle was invalidated out of band.
    #[cfg(test)]
    pub(crate) fn invalidate_handle(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.close();
        }
    }

    fn require_configured_path(&self) -> Result<PathBuf, DatabaseError> {
        self.configured_path.clone().ok_or_else(|| {
            DatabaseError::Configuration(
                "No database configured. Upload a database file to continue.".to_string(),
            )
        })
    }

    fn open_handle(&mut self, path: &Path) -> Result<Handle, DatabaseError> {
        let file_path = resolve_path(path)?;
        info!("Opening database connection to {} (read-only)", file_path.display());
        let conn = open_read_only(&file_path)?;
        self.opens += 1;
        Ok(Handle {
            conn: Some(conn),
            file_path,
        })
    }

    fn close_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            info!("Connection state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
