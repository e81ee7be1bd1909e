//! Workbook source error types.

use thiserror::Error;

/// Failures resolving or loading the workbook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SourceError {
    #[error("workbook source misconfigured: {reason}")]
    Misconfigured { reason: String, missing: Vec<String> },

    #[error("workbook source unavailable: {message}")]
    Unavailable { message: String },
}

impl SourceError {
    /// Creates misconfiguration error listing the missing settings.
    #[must_use]
    pub fn misconfigured(reason: impl Into<String>, missing: Vec<String>) -> Self {
        Self::Misconfigured {
            reason: reason.into(),
            missing,
        }
    }

    /// Creates unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates unavailable error for an expired deadline.
    #[must_use]
    pub fn timed_out(after_secs: u64) -> Self {
        Self::unavailable(format!("request timed out after {after_secs}s"))
    }

    /// Returns whether a later request may succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Settings that must be supplied before the source can work.
    #[must_use]
    pub fn missing_settings(&self) -> &[String] {
        match self {
            Self::Misconfigured { missing, .. } => missing,
            Self::Unavailable { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(SourceError::unavailable("down").is_retryable());
        assert!(SourceError::timed_out(30).is_retryable());
        assert!(!SourceError::misconfigured("no source", vec![]).is_retryable());
    }

    #[test]
    fn test_missing_settings() {
        let err = SourceError::misconfigured("graph", vec!["MS_TENANT_ID".to_string()]);
        assert_eq!(err.missing_settings(), ["MS_TENANT_ID".to_string()]);
        assert!(SourceError::unavailable("x").missing_settings().is_empty());
    }
}
