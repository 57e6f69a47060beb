//! Filesystem-backed object storage.
//!
//! Buckets are directories below a storage root and objects are files inside
//! them, each with an optional `__ninja_<id>.properties` metadata sidecar. A
//! `__ninja_public` marker file makes a bucket publicly readable.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
