//! Infrastructure layer with external service adapters.

/// Catalog and media caches.
pub mod cache;
/// Application configuration.
pub mod config;
/// Workbook extraction.
pub mod extract;
/// Workbook sources.
pub mod source;

pub use cache::{DiskMediaStore, MemoryCatalogCache};
pub use config::{AppConfig, CliArgs, Command, LogLevel, StorageManager};
pub use extract::XlsxExtractor;
pub use source::{GraphWorkbookSource, LocalWorkbookSource, build_source};
