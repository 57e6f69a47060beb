//! Represents an object (file) stored in a bucket.

use crate::{
    errors::{StorageError, StorageResult},
    models::metadata::{self, Properties},
};
use chrono::{DateTime, Utc};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;
use uuid::Uuid;

/// Prefix shared by every file the store keeps next to object content.
/// Entries starting with it are never listed as objects or buckets.
pub const RESERVED_PREFIX: &str = "__";

const SIDECAR_PREFIX: &str = "__ninja_";
const SIDECAR_SUFFIX: &str = ".properties";

/// Returns true for names reserved for sidecars, markers and temp files.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// A single object within a bucket.
///
/// The handle is just a path: content lives in the file named after the
/// object id, metadata in a `__ninja_<id>.properties` sibling. Neither has to
/// exist for the handle to be valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    path: PathBuf,
}

impl StoredObject {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Object id, i.e. the content file's base name.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path of the content file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the metadata sidecar.
    pub fn properties_path(&self) -> PathBuf {
        self.path
            .with_file_name(format!("{}{}{}", SIDECAR_PREFIX, self.name(), SIDECAR_SUFFIX))
    }

    /// Whether the content file exists. The sidecar is not consulted.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn size(&self) -> StorageResult<u64> {
        fs::metadata(&self.path)
            .map(|meta| meta.len())
            .map_err(|source| StorageError::io("stat", &self.path, source))
    }

    pub fn last_modified(&self) -> StorageResult<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|source| StorageError::io("read modification time of", &self.path, source))
    }

    /// Delete content and sidecar.
    ///
    /// A file that is already gone counts as deleted, so objects that never
    /// had metadata stored can be removed too.
    pub fn delete(&self) -> StorageResult<()> {
        remove_if_present(&self.path)?;
        remove_if_present(&self.properties_path())?;
        debug!("deleted object {}", self.path.display());
        Ok(())
    }

    /// Read the metadata sidecar.
    pub fn get_properties(&self) -> StorageResult<Properties> {
        let path = self.properties_path();
        let bytes = fs::read(&path).map_err(|source| StorageError::io("read", &path, source))?;
        metadata::parse(&metadata::decode_latin1(&bytes)).map_err(|err| {
            StorageError::MalformedProperties {
                path,
                line: err.line,
                reason: err.reason,
            }
        })
    }

    /// Replace the metadata sidecar with `properties`.
    ///
    /// The new content is written to a reserved temp file and renamed into
    /// place; existing entries are not merged.
    pub fn store_properties(&self, properties: &Properties) -> StorageResult<()> {
        let target = self.properties_path();
        let tmp_path = self
            .path
            .with_file_name(format!("{}{}.tmp", SIDECAR_PREFIX, Uuid::new_v4()));
        let text = metadata::render(properties, Utc::now());

        if let Err(source) = fs::write(&tmp_path, text.as_bytes()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::io("write", &tmp_path, source));
        }
        if let Err(source) = fs::rename(&tmp_path, &target) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::io("replace", &target, source));
        }

        debug!(
            "stored {} properties for {}",
            properties.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("{} already missing", path.display());
            Ok(())
        }
        Err(source) => Err(StorageError::io("delete", path, source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_is_a_reserved_sibling() {
        let object = StoredObject::new("/data/photos/cat.png");
        assert_eq!(object.name(), "cat.png");
        assert_eq!(
            object.properties_path(),
            PathBuf::from("/data/photos/__ninja_cat.png.properties")
        );
        assert!(is_reserved_name("__ninja_cat.png.properties"));
        assert!(is_reserved_name("__ninja_public"));
        assert!(!is_reserved_name("cat.png"));
    }

    #[test]
    fn store_properties_replaces_instead_of_merging() {
        let dir = tempfile::tempdir().unwrap();
        let object = StoredObject::new(dir.path().join("doc.txt"));

        let mut first = Properties::new();
        first.insert("Content-Type".into(), "text/plain".into());
        first.insert("x-amz-meta-a".into(), "1".into());
        object.store_properties(&first).unwrap();

        let mut second = Properties::new();
        second.insert("Content-Type".into(), "text/markdown".into());
        object.store_properties(&second).unwrap();

        assert_eq!(object.get_properties().unwrap(), second);
        // metadata can exist without content
        assert!(!object.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["__ninja_doc.txt.properties".to_string()]);
    }

    #[test]
    fn missing_sidecar_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let object = StoredObject::new(dir.path().join("doc.txt"));
        let err = object.get_properties().unwrap_err();
        assert!(matches!(err, StorageError::Io { op: "read", .. }));
    }

    #[test]
    fn malformed_sidecar_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let object = StoredObject::new(dir.path().join("doc.txt"));
        fs::write(object.properties_path(), "a=\\uZZZZ\n").unwrap();
        let err = object.get_properties().unwrap_err();
        assert!(matches!(
            err,
            StorageError::MalformedProperties { line: 1, .. }
        ));
    }

    #[test]
    fn delete_tolerates_missing_sidecar_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let object = StoredObject::new(dir.path().join("doc.txt"));
        fs::write(object.path(), b"hello").unwrap();

        object.delete().unwrap();
        assert!(!object.exists());
        object.delete().unwrap();
    }

    #[test]
    fn size_and_timestamp_require_content() {
        let dir = tempfile::tempdir().unwrap();
        let object = StoredObject::new(dir.path().join("doc.txt"));
        assert!(object.size().is_err());
        assert!(object.last_modified().is_err());

        fs::write(object.path(), b"hello").unwrap();
        assert_eq!(object.size().unwrap(), 5);
        let age = Utc::now() - object.last_modified().unwrap();
        assert!(age.num_seconds() < 60);
    }
}
