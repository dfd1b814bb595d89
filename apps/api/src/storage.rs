//! Durable CV file storage on the local filesystem.
//!
//! Files live under `{upload_dir}/cvs/{job_id}/` with a fresh UUID name that
//! preserves the original extension; the original filename is kept on the
//! application row instead.

use std::path::Path;

use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ALLOWED_EXTENSIONS;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file type not allowed for '{0}' (allowed: {})", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedExtension(String),

    #[error("file too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SavedCv {
    pub path: String,
}

/// Returns the lowercased dot-extension of `filename` when it is on the
/// allowlist.
pub fn validate_extension(filename: &str) -> Result<String, StorageError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()));

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(ext),
        _ => Err(StorageError::UnsupportedExtension(filename.to_string())),
    }
}

/// Writes one uploaded CV to durable storage, validating extension and size
/// first. A partially written file is removed on failure.
pub async fn save_cv_file(
    upload_dir: &str,
    job_id: Uuid,
    filename: &str,
    bytes: &[u8],
    max_size: usize,
) -> Result<SavedCv, StorageError> {
    let extension = validate_extension(filename)?;

    if bytes.len() > max_size {
        return Err(StorageError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }

    let job_folder = Path::new(upload_dir).join("cvs").join(job_id.to_string());
    fs::create_dir_all(&job_folder).await?;

    let path = job_folder.join(format!("{}{}", Uuid::new_v4(), extension));
    if let Err(error) = fs::write(&path, bytes).await {
        let _ = fs::remove_file(&path).await;
        return Err(error.into());
    }

    info!(file = %path.display(), bytes = bytes.len(), "CV file saved");
    Ok(SavedCv {
        path: path.to_string_lossy().into_owned(),
    })
}

/// Best-effort removal of a stored CV file.
pub async fn remove_cv_file(path: &str) {
    match fs::remove_file(path).await {
        Ok(()) => info!(file = %path, "CV file deleted"),
        Err(error) => warn!(file = %path, error = %error, "Failed to delete CV file"),
    }
}
