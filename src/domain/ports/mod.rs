mod extractor_port;
mod media_store_port;
mod workbook_source_port;

pub use extractor_port::ExtractorPort;
pub use media_store_port::{MediaStorePort, ReconcileReport, StoredMedia};
pub use workbook_source_port::{
    AbortHandle, AbortSignal, IdentityResolverPort, SourceLoaderPort, WorkbookSource,
};
