//! Port definition for the media cache.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::{ImageRef, WorkbookIdentity};
use crate::domain::errors::MediaError;

/// A cached image that is current for the latest known identity.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    /// PNG bytes.
    pub content: Bytes,
    /// Identity recorded in the sidecar.
    pub identity: WorkbookIdentity,
    /// Weak entity tag for conditional requests.
    pub etag: String,
}

/// Outcome of purging records tied to a superseded identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Category directories where at least one file was removed.
    pub categories_cleaned: Vec<String>,
    /// Number of PNG files removed.
    pub images_removed: usize,
    /// Number of sidecar files removed.
    pub meta_removed: usize,
    /// Number of files that could not be removed.
    pub failures: usize,
}

impl ReconcileReport {
    /// Total files removed.
    #[must_use]
    pub const fn files_removed(&self) -> usize {
        self.images_removed + self.meta_removed
    }
}

/// Persistent media cache keyed by category and index.
/// Implementations must be thread-safe.
#[async_trait]
pub trait MediaStorePort: Send + Sync {
    /// Persists one image tagged with `identity`, overwriting any previous record.
    async fn put(&self, identity: &WorkbookIdentity, image: &ImageRef) -> Result<(), MediaError>;

    /// Returns the image if its sidecar identity equals the latest known identity.
    async fn get(&self, category: &str, filename: &str) -> Result<StoredMedia, MediaError>;

    /// Makes `new` the latest known identity and removes every record not tagged with it.
    /// Never fails; removal problems are logged and counted.
    async fn reconcile(
        &self,
        old: Option<&WorkbookIdentity>,
        new: &WorkbookIdentity,
    ) -> ReconcileReport;
}
