//! Extraction error types.

use thiserror::Error;

/// Whole-workbook extraction failures.
///
/// Problems confined to one worksheet never surface here; they degrade that
/// category to zero images plus a note.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ExtractError {
    #[error("workbook package is not readable: {message}")]
    InvalidPackage { message: String },
}

impl ExtractError {
    /// Creates invalid package error.
    #[must_use]
    pub fn invalid_package(message: impl Into<String>) -> Self {
        Self::InvalidPackage {
            message: message.into(),
        }
    }
}
