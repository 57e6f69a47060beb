//! Represents a bucket: a directory beneath the storage root.

use crate::{
    errors::{NameKind, StorageError, StorageResult},
    models::object::{StoredObject, is_reserved_name},
    services::visibility_cache::VisibilityCache,
};
use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Zero-byte file whose presence marks a bucket as publicly readable.
pub const PUBLIC_MARKER: &str = "__ninja_public";

/// Reject identifiers that could escape their parent directory.
///
/// Runs before any filesystem access.
pub fn validate_name(kind: NameKind, name: &str) -> StorageResult<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(StorageError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Counts of entries removed by [`Bucket::delete`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemovalReport {
    pub files: usize,
    pub directories: usize,
}

/// A storage bucket.
///
/// Holds no state besides its directory and a handle on the shared
/// visibility cache; existence and visibility are always derived from disk.
#[derive(Clone)]
pub struct Bucket {
    path: PathBuf,
    visibility: VisibilityCache,
}

impl Bucket {
    pub fn new(path: impl Into<PathBuf>, visibility: VisibilityCache) -> Self {
        Self {
            path: path.into(),
            visibility,
        }
    }

    /// Bucket name, i.e. the directory's base name.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the bucket directory. Does nothing if it already exists.
    ///
    /// A non-directory entry under the bucket's name is an error.
    pub fn create(&self) -> StorageResult<()> {
        if self.path.is_dir() {
            return Ok(());
        }
        if self.path.exists() {
            return Err(StorageError::io(
                "create bucket directory",
                &self.path,
                io::Error::new(io::ErrorKind::AlreadyExists, "a non-directory entry is in the way"),
            ));
        }
        fs::create_dir_all(&self.path)
            .map_err(|source| StorageError::io("create bucket directory", &self.path, source))?;
        debug!("created bucket {}", self.path.display());
        Ok(())
    }

    /// Delete the bucket with all objects, sidecars and nested entries.
    ///
    /// A bucket that is already gone is not an error. A directory is only
    /// removed after every entry below it was removed.
    ///
    /// The cached visibility is reset to private whether or not the walk
    /// succeeds, since the marker may already be gone.
    pub fn delete(&self) -> StorageResult<RemovalReport> {
        let mut report = RemovalReport::default();
        let removed = match fs::symlink_metadata(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("bucket {} already missing", self.path.display());
                Ok(())
            }
            Ok(meta) if !meta.is_dir() => remove_file(&self.path, &mut report),
            // stat failures fall through to the walk, which reports the real cause
            _ => remove_tree(&self.path, &mut report),
        };
        self.visibility.put(&self.name(), false);
        removed?;
        debug!(
            "deleted bucket {} ({} files, {} directories)",
            self.path.display(),
            report.files,
            report.directories
        );
        Ok(report)
    }

    /// Objects stored directly in this bucket, sorted by name.
    ///
    /// Sidecars and the visibility marker are skipped. Listing is best
    /// effort: an unreadable directory yields an empty list.
    pub fn list_objects(&self) -> Vec<StoredObject> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("cannot list bucket {}: {}", self.path.display(), err);
                return Vec::new();
            }
        };

        let mut objects: Vec<StoredObject> = entries
            .filter_map(Result::ok)
            .filter(|entry| !is_reserved_name(&entry.file_name().to_string_lossy()))
            .filter(|entry| entry.path().is_file())
            .map(|entry| StoredObject::new(entry.path()))
            .collect();
        objects.sort_by_key(StoredObject::name);
        objects
    }

    fn public_marker(&self) -> PathBuf {
        self.path.join(PUBLIC_MARKER)
    }

    /// Whether the bucket is private. Anything but a confirmed marker file
    /// counts as private.
    pub fn is_private(&self) -> bool {
        let marker = self.public_marker();
        let public = self
            .visibility
            .get_or_compute(&self.name(), || marker.try_exists().ok());
        !public
    }

    pub fn make_public(&self) -> StorageResult<()> {
        let marker = self.public_marker();
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => debug!("bucket {} is now public", self.name()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(source) => return Err(StorageError::io("create", &marker, source)),
        }
        self.visibility.put(&self.name(), true);
        Ok(())
    }

    pub fn make_private(&self) -> StorageResult<()> {
        let marker = self.public_marker();
        match fs::remove_file(&marker) {
            Ok(()) => debug!("bucket {} is now private", self.name()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(StorageError::io("delete", &marker, source)),
        }
        self.visibility.put(&self.name(), false);
        Ok(())
    }

    /// Handle on the object `id`, which may or may not exist.
    pub fn resolve_object(&self, id: &str) -> StorageResult<StoredObject> {
        validate_name(NameKind::Object, id)?;
        Ok(StoredObject::new(self.path.join(id)))
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket").field("path", &self.path).finish()
    }
}

fn remove_file(path: &Path, report: &mut RemovalReport) -> StorageResult<()> {
    fs::remove_file(path).map_err(|source| StorageError::io("delete", path, source))?;
    report.files += 1;
    Ok(())
}

/// Depth-first removal of `dir`.
///
/// Symlinks are removed, never followed. An entry whose type cannot be read
/// is still deleted as a file. The first failure aborts the walk and leaves
/// the enclosing directories in place.
fn remove_tree(dir: &Path, report: &mut RemovalReport) -> StorageResult<()> {
    let entries =
        fs::read_dir(dir).map_err(|source| StorageError::io("read directory", dir, source))?;

    for entry in entries {
        let entry = entry.map_err(|source| StorageError::io("read directory", dir, source))?;
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => remove_tree(&path, report)?,
            Ok(_) => remove_file(&path, report)?,
            Err(err) => {
                debug!("cannot stat {} ({}), deleting anyway", path.display(), err);
                remove_file(&path, report)?;
            }
        }
    }

    fs::remove_dir(dir).map_err(|source| StorageError::io("delete directory", dir, source))?;
    report.directories += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_separators() {
        for bad in ["..", "a..b", "a/b", "/abs", "a\\b", "", "."] {
            let err = validate_name(NameKind::Object, bad).unwrap_err();
            assert!(
                matches!(err, StorageError::InvalidName { kind: NameKind::Object, .. }),
                "{bad:?} should be rejected"
            );
        }
        for good in ["photos", "cat.png", ".hidden", "a.b.c", "__odd"] {
            assert!(validate_name(NameKind::Bucket, good).is_ok(), "{good:?}");
        }
    }

    #[test]
    fn delete_walks_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = Bucket::new(dir.path().join("photos"), VisibilityCache::default());
        bucket.create().unwrap();
        fs::write(bucket.path().join("a.txt"), b"a").unwrap();
        fs::create_dir_all(bucket.path().join("nested/deeper")).unwrap();
        fs::write(bucket.path().join("nested/b.txt"), b"b").unwrap();
        fs::write(bucket.path().join("nested/deeper/c.txt"), b"c").unwrap();
        bucket.make_public().unwrap();

        let report = bucket.delete().unwrap();
        assert_eq!(
            report,
            RemovalReport {
                files: 4,
                directories: 3
            }
        );
        assert!(!bucket.path().exists());
        assert!(dir.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn delete_removes_symlinks_without_following_them() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let bucket = Bucket::new(dir.path().join("photos"), VisibilityCache::default());
        bucket.create().unwrap();
        std::os::unix::fs::symlink(&outside, bucket.path().join("link")).unwrap();

        bucket.delete().unwrap();
        assert!(!bucket.exists());
        assert!(outside.join("keep.txt").exists());
    }

    #[test]
    fn recreated_bucket_starts_private() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = Bucket::new(dir.path().join("photos"), VisibilityCache::default());
        bucket.create().unwrap();
        bucket.make_public().unwrap();
        assert!(!bucket.is_private());

        bucket.delete().unwrap();
        bucket.create().unwrap();
        assert!(!bucket.path().join(PUBLIC_MARKER).exists());
        assert!(bucket.is_private());
    }

    #[test]
    fn create_refuses_a_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos");
        fs::write(&path, b"not a bucket").unwrap();
        let bucket = Bucket::new(&path, VisibilityCache::default());

        let err = bucket.create().unwrap_err();
        match err {
            StorageError::Io { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists)
            }
            other => panic!("expected Io, got {other:?}"),
        }
        assert!(!bucket.exists());
        assert!(path.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn failed_child_keeps_its_parents() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bucket = Bucket::new(dir.path().join("photos"), VisibilityCache::default());
        bucket.create().unwrap();
        let locked = bucket.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("stuck.txt"), b"stuck").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // privileged users ignore directory permissions
        if fs::write(locked.join("writable"), b"").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = bucket.delete();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(StorageError::Io { .. })), "{result:?}");
        assert!(bucket.exists());
        assert!(locked.join("stuck.txt").exists());
    }

    #[test]
    fn resolve_object_validates_id() {
        let bucket = Bucket::new("/data/photos", VisibilityCache::default());
        assert_eq!(
            bucket.resolve_object("cat.png").unwrap().path(),
            Path::new("/data/photos/cat.png")
        );
        assert!(bucket.resolve_object("../secret").is_err());
    }
}
