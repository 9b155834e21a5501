use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// File extensions accepted for database uploads
pub const ALLOWED_EXTENSIONS: &[&str] = &["duckdb", "db"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file selected")]
    MissingFile,
    #[error("Invalid file type '{0}'. Please upload a .duckdb or .db file")]
    InvalidExtension(String),
    #[error("Failed to store uploaded file: {0}")]
    Io(#[from] io::Error),
}

/// Reduce an uploaded file name to a bare file name with an accepted
/// extension.
pub fn validate_file_name(file_name: &str) -> Result<String, UploadError> {
    let name = Path::new(file_name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or(UploadError::MissingFile)?;

    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        let shown = if extension.is_empty() {
            name.to_string()
        } else {
            format!(".{}", extension)
        };
        return Err(UploadError::InvalidExtension(shown));
    }

    Ok(name.to_string())
}

/// Directory holding uploaded database files until shutdown
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and write an upload under a unique name.
    ///
    /// Nothing is written when the name is rejected.
    pub fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, UploadError> {
        let name = validate_file_name(file_name)?;
        fs::create_dir_all(&self.root)?;

        let stem = Path::new(&name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("upload");
        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("duckdb");

        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.root)?;
        file.write_all(bytes)?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| UploadError::Io(e.error))?;
        info!("Stored upload {} at {}", name, path.display());
        Ok(path)
    }

    /// Delete one stored upload, logging failures
    pub fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove upload {}: {}", path.display(), e);
        }
    }

    /// Remove the whole directory at shutdown, logging failures
    pub fn cleanup(&self) {
        if !self.root.exists() {
            return;
        }
        info!("Cleaning up temporary database directory {}", self.root.display());
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!("Error cleaning up temporary files: {}", e);
        }
    }
}
