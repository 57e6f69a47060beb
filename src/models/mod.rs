//! Core data model of the object store.
//!
//! Buckets and objects are thin handles over directories and files below
//! the storage root; `metadata` is the sidecar text codec and `summary`
//! holds the JSON views served by the admin API.

pub mod bucket;
pub mod metadata;
pub mod object;
pub mod summary;
