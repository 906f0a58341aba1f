//! Filesystem storage for uploaded images.
//!
//! Handles the file side of an upload:
//! - Media type and extension allow-list checks
//! - Size ceiling
//! - Collision-resistant file naming (`<unix millis>-<random><.ext>`)
//! - Writing into, and removing from, the upload directory

use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;

/// Accepted image formats, matched against both the declared media type
/// subtype and the file extension
pub const ALLOWED_FORMATS: &[&str] = &["jpeg", "jpg", "png", "gif"];

/// Attempts at finding an unused filename before giving up
const MAX_NAME_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Only image files are allowed!")]
    UnsupportedType,

    #[error("File too large (max {0} bytes)")]
    TooLarge(usize),

    #[error("Invalid stored filename")]
    InvalidFilename,

    #[error("Storage failure: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to the upload directory
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Generated name inside the upload directory
    pub filename: String,
    /// Public URL path, e.g. `/uploads/<filename>`
    pub path: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct ImageStorage {
    dir: PathBuf,
    url_prefix: String,
    max_file_size: usize,
}

impl ImageStorage {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>, max_file_size: usize) -> Self {
        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Self {
            dir: dir.into(),
            url_prefix,
            max_file_size,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.dir, &config.url_prefix, config.max_file_size)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Check the declared media type and the original filename.
    ///
    /// Both must name an allowed format. Returns the lower-cased extension
    /// to keep on the stored file.
    pub fn validate_type(
        &self,
        original_name: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .ok_or(StorageError::UnsupportedType)?;

        if !ALLOWED_FORMATS.contains(&extension.as_str()) {
            return Err(StorageError::UnsupportedType);
        }

        let subtype = content_type
            .and_then(media_subtype)
            .ok_or(StorageError::UnsupportedType)?;

        if !ALLOWED_FORMATS.contains(&subtype.as_str()) {
            return Err(StorageError::UnsupportedType);
        }

        Ok(extension)
    }

    /// Reject sizes above the configured ceiling
    pub fn check_size(&self, size: usize) -> Result<(), StorageError> {
        if size > self.max_file_size {
            return Err(StorageError::TooLarge(self.max_file_size));
        }
        Ok(())
    }

    /// Generate a new filename with a time-based prefix and random suffix
    pub fn generate_filename(extension: &str) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
        format!("{}-{}.{}", millis, suffix, extension)
    }

    /// Public URL path for a stored filename
    pub fn public_path(&self, filename: &str) -> String {
        format!("{}/{}", self.url_prefix, filename)
    }

    /// On-disk location of a stored filename.
    ///
    /// Only plain file names are accepted, never paths.
    pub fn file_path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let is_plain = !filename.is_empty()
            && !filename.contains(['/', '\\'])
            && filename != "."
            && filename != "..";
        if !is_plain {
            return Err(StorageError::InvalidFilename);
        }
        Ok(self.dir.join(filename))
    }

    /// Write `data` to a fresh file in the upload directory.
    ///
    /// The directory is created on first use. Existing files are never
    /// overwritten: a name collision picks a new name.
    pub async fn save(&self, extension: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        self.check_size(data.len())?;

        fs::create_dir_all(&self.dir).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let filename = Self::generate_filename(extension);
            let target = self.file_path(&filename)?;

            let file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
                .await;

            let mut file = match file {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    debug!(filename = %filename, "Upload filename collision, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            file.write_all(data).await?;
            file.flush().await?;

            info!(filename = %filename, size = data.len(), "Stored uploaded file");

            return Ok(StoredFile {
                path: self.public_path(&filename),
                filename,
                size: data.len(),
            });
        }
    }

    /// Remove a stored file. A file that is already gone is not an error.
    ///
    /// Returns whether a file was actually removed.
    pub async fn remove(&self, filename: &str) -> Result<bool, StorageError> {
        let target = self.file_path(filename)?;

        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(filename = %filename, "Removed stored file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(filename = %filename, "Stored file already missing");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Extract the lower-cased subtype of an `image/*` media type
fn media_subtype(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;
    Some(subtype.to_string())
}
