//! Catalog and media caching.
//!
//! This module provides:
//! - An in-memory LRU cache of assembled catalog responses
//! - A disk cache of extracted images tagged with their workbook identity

pub mod catalog_cache;
pub mod media_store;

pub use catalog_cache::{CacheStats, CachedCatalogEntry, MemoryCatalogCache};
pub use media_store::{DiskMediaStore, MediaStoreStats, default_media_dir};
