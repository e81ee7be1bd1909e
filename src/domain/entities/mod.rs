//! Domain entity definitions.

mod catalog;
mod category;
mod identity;
mod media;

pub use catalog::{CacheState, CatalogResponse, CategoryView};
pub use category::{Category, ImageRef, SlugAllocator, slugify};
pub use identity::{
    DIGEST_PREFIX_BYTES, SourceMode, WorkbookIdentity, prefix_digest, short_sha256,
};
pub use media::{CacheFileKind, MediaRef, is_safe_category, parse_cache_filename};
