//! HTTP handlers for inspecting buckets and objects.
//! Storage calls are blocking filesystem work, so each one runs on the
//! blocking pool; object content is streamed without buffering.

use crate::{
    errors::{AppError, StorageError, StorageResult},
    models::{
        bucket::Bucket,
        object::StoredObject,
        summary::{BucketDetail, BucketSummary, ObjectDetail},
    },
    services::{content_hasher, storage_service::StorageService},
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::{DateTime, Utc};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Run storage work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| AppError::internal(format!("storage task failed: {}", err)))?
        .map_err(AppError::from)
}

/// Resolve `name`, failing if the bucket does not exist. Inspection never
/// creates buckets, whatever the autocreate policy says.
fn existing_bucket(service: &StorageService, name: &str) -> StorageResult<Bucket> {
    let bucket = service.resolve_bucket(name)?;
    if !bucket.exists() {
        return Err(StorageError::BucketNotFound(name.to_string()));
    }
    Ok(bucket)
}

/// Resolve `object` in an existing `bucket`, failing if the content is missing.
fn existing_object(
    service: &StorageService,
    bucket: &str,
    object: &str,
) -> StorageResult<StoredObject> {
    let stored = existing_bucket(service, bucket)?.resolve_object(object)?;
    if !stored.exists() {
        return Err(StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            object: object.to_string(),
        });
    }
    Ok(stored)
}

/// GET `/buckets`: all buckets with their visibility.
pub async fn list_buckets(
    State(service): State<StorageService>,
) -> Result<Json<Vec<BucketSummary>>, AppError> {
    let buckets: Vec<BucketSummary> = blocking(move || {
        Ok(service
            .list_buckets()
            .iter()
            .map(BucketSummary::from)
            .collect())
    })
    .await?;
    Ok(Json(buckets))
}

/// GET `/buckets/{bucket}`: bucket visibility and its objects.
pub async fn get_bucket(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
) -> Result<Json<BucketDetail>, AppError> {
    let detail = blocking(move || {
        let bucket = existing_bucket(&service, &bucket)?;
        Ok(BucketDetail::load(&bucket))
    })
    .await?;
    Ok(Json(detail))
}

/// GET `/buckets/{bucket}/objects/{object}`: size, integrity tags and stored properties.
pub async fn get_object_detail(
    State(service): State<StorageService>,
    Path((bucket, object)): Path<(String, String)>,
) -> Result<Json<ObjectDetail>, AppError> {
    let detail = blocking(move || {
        let stored = existing_object(&service, &bucket, &object)?;
        ObjectDetail::load(&stored)
    })
    .await?;
    Ok(Json(detail))
}

/// GET `/buckets/{bucket}/objects/{object}/content`: stream the object body.
pub async fn get_object_content(
    State(service): State<StorageService>,
    Path((bucket, object)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (stored, head) = blocking(move || {
        let stored = existing_object(&service, &bucket, &object)?;
        let head = ContentHead {
            etag: content_hasher::hash_file(stored.path())?.etag(),
            size: stored.size()?,
            last_modified: stored.last_modified()?,
            content_type: stored
                .get_properties()
                .ok()
                .and_then(|mut props| props.remove("Content-Type")),
        };
        Ok((stored, head))
    })
    .await?;

    let file = File::open(stored.path())
        .await
        .map_err(|source| AppError::from(StorageError::io("open", stored.path(), source)))?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_content_headers(response.headers_mut(), &head);
    Ok(response)
}

struct ContentHead {
    etag: String,
    size: u64,
    last_modified: DateTime<Utc>,
    content_type: Option<String>,
}

fn set_content_headers(headers: &mut HeaderMap, head: &ContentHead) {
    let content_type = head
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(head.size));

    if let Ok(value) = HeaderValue::from_str(&head.etag) {
        headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&head.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
