//! Extractor port definition.

use crate::domain::entities::Category;
use crate::domain::errors::ExtractError;

/// Turns workbook bytes into ordered categories.
///
/// Extraction is CPU bound and synchronous; callers run it on a blocking thread.
pub trait ExtractorPort: Send + Sync {
    /// Extracts every non-ignored worksheet in workbook order.
    ///
    /// # Errors
    /// Returns `ExtractError::InvalidPackage` only when the workbook as a whole
    /// cannot be opened. Worksheet level problems degrade that one category.
    fn extract(&self, workbook: &[u8]) -> Result<Vec<Category>, ExtractError>;
}
