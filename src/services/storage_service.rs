//! src/services/storage_service.rs
//!
//! StorageService: the root registry mapping bucket names onto directories
//! below `base_path`. Objects and their metadata sidecars live directly in
//! those directories; there is no database.

use crate::{
    config::StorageConfig,
    errors::{NameKind, StorageError, StorageResult},
    models::{
        bucket::{Bucket, validate_name},
        object::is_reserved_name,
    },
    services::visibility_cache::VisibilityCache,
};
use serde::Serialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};

/// Snapshot of the storage root for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RootDiagnostics {
    pub path: PathBuf,
    pub exists: bool,
    pub is_directory: bool,
    /// Usable bytes; only queried when the root is an existing directory.
    pub free_bytes: Option<u64>,
}

impl fmt::Display for RootDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if !self.exists {
            f.write_str(" (non-existent!)")
        } else if !self.is_directory {
            f.write_str(" (no directory!)")
        } else {
            match self.free_bytes {
                Some(free) => write!(f, " (Free: {})", format_size(free)),
                None => Ok(()),
            }
        }
    }
}

/// StorageService resolves buckets and exposes the settings the protocol
/// layer needs (credentials, autocreate policy).
///
/// Cloning is cheap; clones share configuration and the visibility cache.
#[derive(Clone)]
pub struct StorageService {
    config: Arc<StorageConfig>,
    visibility: VisibilityCache,
}

impl StorageService {
    pub fn new(config: StorageConfig, visibility: VisibilityCache) -> Self {
        Self {
            config: Arc::new(config),
            visibility,
        }
    }

    /// Configured root directory, without checking it.
    pub fn base_path(&self) -> &Path {
        &self.config.storage_dir
    }

    /// Root directory, provided it exists and is a directory.
    pub fn base_dir(&self) -> StorageResult<&Path> {
        let path = self.base_path();
        if !path.exists() {
            return Err(StorageError::Configuration {
                path: path.to_path_buf(),
                reason: "does not exist",
            });
        }
        if !path.is_dir() {
            return Err(StorageError::Configuration {
                path: path.to_path_buf(),
                reason: "is not a directory",
            });
        }
        Ok(path)
    }

    /// Handle on the bucket `name`, which may or may not exist.
    ///
    /// The name is validated before the filesystem is touched.
    pub fn resolve_bucket(&self, name: &str) -> StorageResult<Bucket> {
        validate_name(NameKind::Bucket, name)?;
        let root = self.base_dir()?;
        Ok(Bucket::new(root.join(name), self.visibility.clone()))
    }

    /// Resolve a bucket that a request refers to.
    ///
    /// Missing buckets are created when autocreate is enabled and reported
    /// as [`StorageError::BucketNotFound`] otherwise.
    pub fn open_bucket(&self, name: &str) -> StorageResult<Bucket> {
        let bucket = self.resolve_bucket(name)?;
        if bucket.exists() {
            return Ok(bucket);
        }
        if !self.config.autocreate_buckets {
            return Err(StorageError::BucketNotFound(name.to_string()));
        }
        bucket.create()?;
        info!("auto-created bucket {}", name);
        Ok(bucket)
    }

    /// All buckets, sorted by name. An unreadable root yields no buckets.
    pub fn list_buckets(&self) -> Vec<Bucket> {
        let entries = match fs::read_dir(self.base_path()) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(
                    "cannot list buckets in {}: {}",
                    self.base_path().display(),
                    err
                );
                return Vec::new();
            }
        };

        let mut buckets: Vec<Bucket> = entries
            .filter_map(Result::ok)
            .filter(|entry| !is_reserved_name(&entry.file_name().to_string_lossy()))
            .filter(|entry| entry.path().is_dir())
            .map(|entry| Bucket::new(entry.path(), self.visibility.clone()))
            .collect();
        buckets.sort_by_key(Bucket::name);
        buckets
    }

    /// Describe the storage root. Free space is only queried for an
    /// existing directory, and a failure doing so is an error.
    pub fn root_diagnostics(&self) -> StorageResult<RootDiagnostics> {
        let path = self.base_path();
        let exists = path.exists();
        let is_directory = path.is_dir();
        let free_bytes = if is_directory {
            Some(free_space(path)?)
        } else {
            None
        };
        Ok(RootDiagnostics {
            path: path.to_path_buf(),
            exists,
            is_directory,
            free_bytes,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.config.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.config.secret_key
    }

    /// Whether buckets are created on their first use.
    pub fn autocreate_buckets(&self) -> bool {
        self.config.autocreate_buckets
    }
}

/// Usable bytes on the filesystem holding `path`, as seen by an
/// unprivileged writer.
#[cfg(unix)]
pub fn free_space(path: &Path) -> StorageResult<u64> {
    let stats = rustix::fs::statvfs(path)
        .map_err(|errno| StorageError::io("query free space of", path, errno.into()))?;
    Ok(stats.f_bavail.saturating_mul(stats.f_frsize))
}

/// Usable bytes on the filesystem holding `path`.
///
/// Picks the mounted disk with the longest mount point containing the
/// canonical path.
#[cfg(not(unix))]
pub fn free_space(path: &Path) -> StorageResult<u64> {
    let canonical = path
        .canonicalize()
        .map_err(|source| StorageError::io("resolve", path, source))?;
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| canonical.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
        .ok_or_else(|| {
            StorageError::io(
                "query free space of",
                path,
                std::io::Error::other("no mounted filesystem contains this path"),
            )
        })
}

/// Human readable byte count, e.g. `512 Bytes` or `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{} Bytes", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostics(exists: bool, is_directory: bool, free: Option<u64>) -> RootDiagnostics {
        RootDiagnostics {
            path: PathBuf::from("/data"),
            exists,
            is_directory,
            free_bytes: free,
        }
    }

    #[test]
    fn diagnostics_render_operator_summary() {
        assert_eq!(
            diagnostics(false, false, None).to_string(),
            "/data (non-existent!)"
        );
        assert_eq!(
            diagnostics(true, false, None).to_string(),
            "/data (no directory!)"
        );
        assert_eq!(
            diagnostics(true, true, Some(3 * 1024 * 1024 * 1024 / 2)).to_string(),
            "/data (Free: 1.5 GB)"
        );
    }

    #[test]
    fn free_space_of_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = free_space(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }), "{err:?}");
    }

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(1023), "1023 Bytes");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
