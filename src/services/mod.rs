pub mod content_hasher;
pub mod storage_service;
pub mod visibility_cache;
