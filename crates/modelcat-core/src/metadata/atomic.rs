//! Atomic file operations for safe YAML persistence.
//!
//! Implements atomic writes using:
//! 1. Write to temp file with unique PID+TID suffix
//! 2. fsync to ensure data reaches disk
//! 3. Atomic rename to target path
//! 4. Optional backup creation

use crate::{CatalogError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::process;
use std::thread;
use tracing::{debug, warn};

/// Read and parse a YAML file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match read_text(path)? {
        Some(contents) => contents,
        None => return Ok(None),
    };

    let data: T = serde_yaml::from_str(&contents).map_err(|e| CatalogError::Yaml {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a YAML file atomically.
///
/// This function:
/// 1. Serializes data to a temp file with PID+TID suffix
/// 2. Validates the YAML by re-parsing
/// 3. Calls fsync to ensure data reaches disk
/// 4. Optionally creates a .bak backup
/// 5. Atomically renames temp file to target
pub fn atomic_write_yaml<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    let serialized = serde_yaml::to_string(data).map_err(|e| CatalogError::Yaml {
        message: format!("Failed to serialize data: {}", e),
        source: Some(e),
    })?;

    // Validate by re-parsing
    serde_yaml::from_str::<serde_yaml::Value>(&serialized).map_err(|e| CatalogError::Yaml {
        message: format!("YAML validation failed: {}", e),
        source: Some(e),
    })?;

    atomic_write_text(path, &serialized, keep_backup)
}

/// Read a plain text file, returning `None` when it doesn't exist.
pub fn read_text(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|e| CatalogError::Io {
        message: format!("Failed to open {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| CatalogError::Io {
            message: format!("Failed to read {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

    Ok(Some(contents))
}

/// Write plain text to a file atomically (temp file + fsync + rename).
pub fn atomic_write_text(path: &Path, contents: &str, keep_backup: bool) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| CatalogError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    // Generate unique temp file name
    let pid = process::id();
    let tid = thread_id();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("tmp")
        .to_string();
    let temp_path = path.with_extension(format!("{}.{}.{}.tmp", extension, pid, tid));

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| CatalogError::Io {
                message: format!("Failed to create temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| CatalogError::Io {
                message: format!("Failed to write temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.flush().map_err(|e| CatalogError::Io {
            message: format!("Failed to flush temp file {}", temp_path.display()),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;

        // fsync to ensure data reaches disk
        file.sync_all().map_err(|e| CatalogError::Io {
            message: format!("Failed to sync temp file {}", temp_path.display()),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;
    }

    // Create backup if requested and target exists
    if keep_backup && path.exists() {
        let backup_path = path.with_extension(format!("{}.bak", extension));
        if let Err(e) = fs::copy(path, &backup_path) {
            warn!("Failed to create backup {}: {}", backup_path.display(), e);
            // Continue anyway - backup failure is not fatal
        } else {
            debug!("Created backup: {}", backup_path.display());
        }
    }

    // Atomic rename
    fs::rename(&temp_path, path).map_err(|e| CatalogError::Io {
        message: format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        ),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Get a unique thread identifier.
fn thread_id() -> u64 {
    // Use thread ID hash as a numeric identifier
    let id = thread::current().id();
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    format!("{:?}", id).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.yaml");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        atomic_write_yaml(&path, &data, false).unwrap();
        assert!(path.exists());

        let read_data: Option<TestData> = atomic_read_yaml(&path).unwrap();
        assert_eq!(read_data, Some(data));
    }

    #[test]
    fn test_atomic_write_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.yaml");

        let data1 = TestData {
            name: "first".to_string(),
            value: 1,
        };
        let data2 = TestData {
            name: "second".to_string(),
            value: 2,
        };

        atomic_write_yaml(&path, &data1, true).unwrap();
        atomic_write_yaml(&path, &data2, true).unwrap();

        let backup_path = path.with_extension("yaml.bak");
        assert!(backup_path.exists());

        let backup_data: Option<TestData> = atomic_read_yaml(&backup_path).unwrap();
        assert_eq!(backup_data, Some(data1));

        let current_data: Option<TestData> = atomic_read_yaml(&path).unwrap();
        assert_eq!(current_data, Some(data2));
    }

    #[test]
    fn test_atomic_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.yaml");

        let result: Option<TestData> = atomic_read_yaml(&path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_atomic_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir
            .path()
            .join("nested")
            .join("dir")
            .join("test.yaml");

        let data = TestData {
            name: "nested".to_string(),
            value: 99,
        };

        atomic_write_yaml(&path, &data, false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_atomic_write_text_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("modelcard.md");

        atomic_write_text(&path, "# Model\n\nbody\n", false).unwrap();
        assert_eq!(
            read_text(&path).unwrap(),
            Some("# Model\n\nbody\n".to_string())
        );
    }
}
