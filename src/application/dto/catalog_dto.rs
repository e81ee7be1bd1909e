//! Catalog and media DTOs.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::domain::entities::{CacheState, CatalogResponse, WorkbookIdentity};
use crate::domain::ports::AbortSignal;

/// Catalog request data.
#[derive(Debug, Clone, Default)]
pub struct CatalogRequest {
    /// Skip the catalog cache and rebuild.
    pub bypass: bool,
    /// Cancels an in-flight workbook load.
    pub abort: AbortSignal,
}

impl CatalogRequest {
    /// Creates a request that may be served from cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces a rebuild.
    #[must_use]
    pub const fn bypassing(mut self, bypass: bool) -> Self {
        self.bypass = bypass;
        self
    }

    /// Attaches a cancellation signal.
    #[must_use]
    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }
}

/// Catalog response data.
#[derive(Debug, Clone)]
pub struct CatalogReply {
    /// Assembled catalog.
    pub response: Arc<CatalogResponse>,
    /// How the reply was produced.
    pub cache_state: CacheState,
    /// Entity tag derived from the identity.
    pub etag: String,
    /// Identity the catalog was built from.
    pub identity: WorkbookIdentity,
}

/// Media request data.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    /// Category slug.
    pub category: String,
    /// Image filename.
    pub filename: String,
    /// Entity tag the client already holds.
    pub if_none_match: Option<String>,
}

impl MediaRequest {
    /// Creates an unconditional request.
    #[must_use]
    pub fn new(category: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            filename: filename.into(),
            if_none_match: None,
        }
    }

    /// Makes the request conditional on `etag`.
    #[must_use]
    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }
}

/// Media response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReply {
    /// PNG bytes.
    Content {
        /// Image bytes.
        content: Bytes,
        /// Weak entity tag.
        etag: String,
    },
    /// The client's copy is current.
    NotModified {
        /// Weak entity tag.
        etag: String,
    },
}

impl MediaReply {
    /// Entity tag of either variant.
    #[must_use]
    pub fn etag(&self) -> &str {
        match self {
            Self::Content { etag, .. } | Self::NotModified { etag } => etag,
        }
    }
}

/// Outcome of a source health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceHealth {
    /// Local mode has nothing remote to probe.
    Disabled,
    /// Settings are missing.
    MissingConfiguration {
        /// Missing env keys.
        missing: Vec<String>,
    },
    /// The workbook was downloaded.
    Reachable {
        /// Downloaded size.
        bytes: usize,
    },
    /// The workbook could not be downloaded.
    Error {
        /// Redacted failure.
        message: String,
    },
}
