//! Domain layer with core catalog entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheState, CatalogResponse, Category, ImageRef, SourceMode, WorkbookIdentity};
pub use errors::{CatalogError, ExtractError, MediaError, SourceError};
pub use ports::{ExtractorPort, IdentityResolverPort, MediaStorePort, SourceLoaderPort, WorkbookSource};
