//! Defines routes for the operational API.
//!
//! ## Structure
//! - **Probes**
//!   - `GET /healthz`: liveness
//!   - `GET /readyz`: storage root + disk round trip
//!   - `GET /status`: storage root diagnostics
//!
//! - **Inspection**
//!   - `GET /buckets`: list buckets
//!   - `GET /buckets/{bucket}`: bucket with its objects
//!   - `GET /buckets/{bucket}/objects/{object}`: object metadata and integrity tags
//!   - `GET /buckets/{bucket}/objects/{object}/content`: object body
//!
//! Object ids never contain `/`, so `{object}` is a single path segment.

use crate::{
    handlers::{
        bucket_handlers::{get_bucket, get_object_content, get_object_detail, list_buckets},
        health_handlers::{healthz, readyz, status},
    },
    services::storage_service::StorageService,
};
use axum::{Router, routing::get};

/// Build and return the router carrying `StorageService` as shared state.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/status", get(status))
        .route("/buckets", get(list_buckets))
        .route("/buckets/{bucket}", get(get_bucket))
        .route("/buckets/{bucket}/objects/{object}", get(get_object_detail))
        .route(
            "/buckets/{bucket}/objects/{object}/content",
            get(get_object_content),
        )
}
