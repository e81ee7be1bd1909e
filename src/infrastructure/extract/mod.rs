//! Spreadsheet extraction.
//!
//! Picture extraction and the structural scan are independent passes over the
//! same workbook bytes; [`XlsxExtractor`] combines them into categories.

#[cfg(test)]
pub(crate) mod fixtures;
pub mod images;
pub mod package;
pub mod scan;
pub mod xlsx_extractor;

pub use images::{ExtractedImage, SheetImages, extract_sheet_images};
pub use scan::{PackageScan, SheetDiagnostics, scan_package};
pub use xlsx_extractor::{DEFAULT_IGNORED_SHEET_PATTERN, XlsxExtractor};
