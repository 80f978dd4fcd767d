//! File-based persistence of the shared grid.
//!
//! The grid is stored as the same JSON body `GET /poll_full_image` serves.
//! Backups are timestamped copies of that file.

use pixelgarden_core::PixelStore;
use pixelgarden_core::sync::wire::{FullImage, SnapshotError, parse_snapshot};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Name of the current grid file inside the data directory.
pub const IMAGE_FILE_NAME: &str = "image.json";
/// Directory inside the data directory holding backups.
pub const BACKUP_DIR_NAME: &str = "backups";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Stored grid is invalid: {0}")]
    Invalid(#[from] SnapshotError),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Keeps the grid in a data directory on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open a store in `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create data directory {}: {}", base_path.display(), e))
            })?;
        }
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn image_path(&self) -> PathBuf {
        self.base_path.join(IMAGE_FILE_NAME)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.base_path.join(BACKUP_DIR_NAME)
    }

    /// Load the stored grid, or `None` when nothing was saved yet.
    pub fn load(&self) -> StorageResult<Option<PixelStore>> {
        let path = self.image_path();
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(Some(parse_snapshot(&json)?))
    }

    /// Overwrite the stored grid.
    ///
    /// Writes a temporary file and renames it over the old one. A crash
    /// mid-write leaves the previous grid intact.
    pub fn save(&self, image: &FullImage) -> StorageResult<()> {
        let json = serde_json::to_string(image).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let path = self.image_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StorageError::Io(format!("Failed to replace {}: {}", path.display(), e)))
    }

    /// Copy the stored grid into the backup directory.
    ///
    /// Returns the backup path, or `None` when there is nothing to back up.
    pub fn backup(&self) -> StorageResult<Option<PathBuf>> {
        let source = self.image_path();
        if !source.exists() {
            return Ok(None);
        }
        let dir = self.backup_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::Io(format!("Failed to create {}: {}", dir.display(), e)))?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let target = dir.join(format!("image-{}.json", stamp));
        fs::copy(&source, &target)
            .map_err(|e| StorageError::Io(format!("Failed to back up to {}: {}", target.display(), e)))?;
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelgarden_core::{Color, GridPos};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested")).unwrap();
        let mut grid = PixelStore::new(3, 2, Color::BLACK);
        grid.set(GridPos::new(1, 1), Color::WHITE);

        store.save(&FullImage::from_store(&grid)).unwrap();
        assert_eq!(store.load().unwrap(), Some(grid));
        assert!(!store.image_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        fs::write(store.image_path(), r#"{ "size_x": 2, "size_y": 1, "image": [] }"#).unwrap();
        assert!(matches!(store.load(), Err(StorageError::Invalid(_))));
    }

    #[test]
    fn test_backup_copies_current_grid() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.backup().unwrap().is_none());

        store.save(&FullImage::from_store(&PixelStore::new(2, 2, Color::WHITE))).unwrap();
        let backup = store.backup().unwrap().unwrap();
        assert!(backup.starts_with(store.backup_dir()));
        assert_eq!(fs::read(&backup).unwrap(), fs::read(store.image_path()).unwrap());
    }
}
