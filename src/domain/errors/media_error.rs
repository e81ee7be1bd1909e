//! Media cache error types.

use thiserror::Error;

/// Media lookup and storage failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MediaError {
    #[error("invalid media reference: {reason}")]
    InvalidReference { reason: String },

    #[error("media not found")]
    NotFound,

    #[error("media cache io error: {message}")]
    Io { message: String },
}

impl MediaError {
    /// Creates invalid reference error.
    #[must_use]
    pub fn invalid_reference(reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reason: reason.into(),
        }
    }

    /// Creates io error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Returns whether the boundary should answer with not-found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::InvalidReference { .. } | Self::NotFound)
    }
}
