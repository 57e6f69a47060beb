//! Serializable views of buckets and objects returned by the admin API.

use crate::{
    errors::StorageResult,
    models::{bucket::Bucket, metadata::Properties, object::StoredObject},
    services::{content_hasher, storage_service::format_size},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    pub public: bool,
}

impl From<&Bucket> for BucketSummary {
    fn from(bucket: &Bucket) -> Self {
        Self {
            name: bucket.name(),
            public: !bucket.is_private(),
        }
    }
}

/// A bucket together with the objects it holds.
#[derive(Serialize, Clone, Debug)]
pub struct BucketDetail {
    pub name: String,
    pub public: bool,
    pub objects: Vec<ObjectSummary>,
}

impl BucketDetail {
    /// Objects removed between listing and stat are left out.
    pub fn load(bucket: &Bucket) -> Self {
        let objects = bucket
            .list_objects()
            .iter()
            .filter_map(|object| ObjectSummary::load(object).ok())
            .collect();
        Self {
            name: bucket.name(),
            public: !bucket.is_private(),
            objects,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct ObjectSummary {
    pub name: String,
    pub size: u64,
    pub size_formatted: String,
    pub last_modified: DateTime<Utc>,
}

impl ObjectSummary {
    pub fn load(object: &StoredObject) -> StorageResult<Self> {
        let size = object.size()?;
        Ok(Self {
            name: object.name(),
            size,
            size_formatted: format_size(size),
            last_modified: object.last_modified()?,
        })
    }
}

/// Everything known about one object, including its integrity tags.
#[derive(Serialize, Clone, Debug)]
pub struct ObjectDetail {
    #[serde(flatten)]
    pub summary: ObjectSummary,
    pub etag: String,
    pub content_md5: String,
    /// `None` when no metadata was ever stored for the object.
    pub properties: Option<Properties>,
}

impl ObjectDetail {
    pub fn load(object: &StoredObject) -> StorageResult<Self> {
        let summary = ObjectSummary::load(object)?;
        let digest = content_hasher::hash_file(object.path())?;
        let properties = match object.get_properties() {
            Ok(props) => Some(props),
            Err(err) => {
                tracing::debug!("no properties for {}: {}", object.path().display(), err);
                None
            }
        };
        Ok(Self {
            summary,
            etag: digest.etag(),
            content_md5: digest.base64(),
            properties,
        })
    }
}
