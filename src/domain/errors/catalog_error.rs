//! Catalog orchestration error types.

use thiserror::Error;

use super::{ExtractError, MediaError, SourceError};

/// Errors surfaced by catalog and media requests.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum CatalogError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("catalog build failed: {message}")]
    Internal { message: String },
}

impl CatalogError {
    /// Creates internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns whether the caller may retry the request later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Source(e) => e.is_retryable(),
            Self::Extract(_) | Self::Internal { .. } => true,
            Self::Media(_) => false,
        }
    }

    /// Returns whether the boundary should answer with not-found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Media(e) if e.is_not_found())
    }
}
