//! Domain error types.

mod catalog_error;
mod extract_error;
mod media_error;
mod source_error;

pub use catalog_error::CatalogError;
pub use extract_error::ExtractError;
pub use media_error::MediaError;
pub use source_error::SourceError;
