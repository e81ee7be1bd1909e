//! Worksheet-to-category extraction for xlsx workbooks.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use super::images::{SheetImages, extract_sheet_images};
use super::scan::{SheetDiagnostics, scan_package};
use crate::domain::entities::{Category, ImageRef, SlugAllocator};
use crate::domain::errors::ExtractError;
use crate::domain::ports::ExtractorPort;

/// Default-named worksheets that never become categories.
pub const DEFAULT_IGNORED_SHEET_PATTERN: &str = r"(?i)^Sheet\d*$";

static DEFAULT_SKIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_IGNORED_SHEET_PATTERN).expect("Invalid regex"));

const NOTE_UNREADABLE: &str = "Worksheet could not be read; its images are unavailable.";

/// Extracts categories from xlsx workbooks.
#[derive(Debug, Clone)]
pub struct XlsxExtractor {
    skip: Regex,
}

impl XlsxExtractor {
    /// Creates an extractor skipping worksheets whose trimmed title matches `skip`.
    #[must_use]
    pub fn new(skip: Regex) -> Self {
        Self { skip }
    }

    /// Builds an extractor from a pattern string.
    ///
    /// # Errors
    /// Returns error if `pattern` is not a valid regex.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::new(Regex::new(pattern)?))
    }

    fn to_category(slugs: &mut SlugAllocator, sheet: SheetImages, diagnostics: SheetDiagnostics) -> Category {
        let slug = slugs.allocate(&sheet.name);

        if let Some(error) = sheet.error {
            warn!(sheet = %sheet.name, slug = %slug, error = %error, "Worksheet degraded");
            return Category::degraded(sheet.name, slug, NOTE_UNREADABLE);
        }

        let diagnostics = SheetDiagnostics {
            extraction_failures: sheet.failures,
            ..diagnostics
        };
        let extracted = sheet.images.len();
        let unsupported = diagnostics.unsupported_count(extracted);
        let notes = diagnostics.notes(extracted);

        info!(
            sheet = %sheet.name,
            extracted_images = extracted,
            drawing_objects = diagnostics.drawing_objects,
            drawing_pictures = diagnostics.drawing_pictures,
            unknown_error_cells = diagnostics.unknown_error_cells,
            extraction_failures = diagnostics.extraction_failures,
            unsupported_detected = unsupported > 0,
            note = notes.unwrap_or("-"),
            "Catalog sheet"
        );

        let images = sheet
            .images
            .into_iter()
            .map(|image| ImageRef::new(slug.clone(), image.index, image.png))
            .collect();

        Category::new(
            sheet.name,
            slug,
            images,
            unsupported > 0,
            notes.map(str::to_string),
        )
    }
}

impl Default for XlsxExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP.clone())
    }
}

impl ExtractorPort for XlsxExtractor {
    fn extract(&self, workbook: &[u8]) -> Result<Vec<Category>, ExtractError> {
        let sheets = extract_sheet_images(workbook, &self.skip)?;
        let scan = scan_package(workbook);

        let mut slugs = SlugAllocator::new();
        let categories: Vec<Category> = sheets
            .into_iter()
            .map(|sheet| {
                let diagnostics = scan
                    .for_sheet(&sheet.name)
                    .cloned()
                    .unwrap_or_else(|| SheetDiagnostics::empty(&sheet.name));
                Self::to_category(&mut slugs, sheet, diagnostics)
            })
            .collect();

        if scan.unmapped_media > 0 {
            info!(
                unmapped_media = scan.unmapped_media,
                "Workbook contains media not mapped to any worksheet drawing"
            );
        }

        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::extract::fixtures::{SheetFixture, WorkbookFixture, png};

    #[test]
    fn test_kids_workbook() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("Sheet1").image(png(1, 1)))
            .sheet(SheetFixture::new("KIDS").image(png(2, 2)).image(png(2, 2)))
            .build();

        let categories = XlsxExtractor::default().extract(&workbook).unwrap();
        assert_eq!(categories.len(), 1);

        let kids = &categories[0];
        assert_eq!(kids.name(), "KIDS");
        assert_eq!(kids.slug(), "KIDS");
        assert_eq!(kids.images_count(), 2);
        assert!(!kids.unsupported_objects_detected());
        assert!(kids.notes().is_none());
        assert_eq!(kids.images()[1].url(), "/api/media/KIDS/img_2.png");
    }

    #[test]
    fn test_skip_rule_is_trimmed_and_case_insensitive() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new(" sheet12 "))
            .sheet(SheetFixture::new("SHEET"))
            .sheet(SheetFixture::new("Sheets of paper"))
            .build();

        let categories = XlsxExtractor::default().extract(&workbook).unwrap();
        let names: Vec<&str> = categories.iter().map(Category::name).collect();
        assert_eq!(names, vec!["Sheets of paper"]);
        assert_eq!(categories[0].slug(), "Sheets_of_paper");
    }

    #[test]
    fn test_custom_skip_pattern() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("Sheet1"))
            .sheet(SheetFixture::new("Draft"))
            .build();

        let extractor = XlsxExtractor::with_pattern("^Draft$").unwrap();
        let categories = extractor.extract(&workbook).unwrap();
        let names: Vec<&str> = categories.iter().map(Category::name).collect();
        assert_eq!(names, vec!["Sheet1"]);
    }

    #[test]
    fn test_duplicate_slugs_are_suffixed() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("Kids Art"))
            .sheet(SheetFixture::new("Kids/Art"))
            .build();

        let categories = XlsxExtractor::default().extract(&workbook).unwrap();
        assert_eq!(categories[0].slug(), "Kids_Art");
        assert_eq!(categories[1].slug(), "Kids_Art_2");
    }

    #[test]
    fn test_unsupported_objects_are_flagged() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("CHARTS").image(png(1, 1)).chart())
            .sheet(SheetFixture::new("EMPTY"))
            .sheet(SheetFixture::new("SHAPES").shape())
            .sheet(SheetFixture::new("TYPED").image(png(1, 1)).unknown_error_cell())
            .build();

        let categories = XlsxExtractor::default().extract(&workbook).unwrap();

        assert!(categories[0].unsupported_objects_detected());
        assert_eq!(
            categories[0].notes(),
            Some("Some worksheet objects are not standard embedded images.")
        );

        assert!(!categories[1].unsupported_objects_detected());
        assert_eq!(
            categories[1].notes(),
            Some("No standard embedded images were found in this worksheet.")
        );

        assert!(categories[2].unsupported_objects_detected());
        assert_eq!(
            categories[2].notes(),
            Some("Worksheet has drawing content that is not available as standard embedded images.")
        );

        assert!(categories[3].unsupported_objects_detected());
        assert_eq!(categories[3].images_count(), 1);
        assert!(categories[3].notes().unwrap().contains("#UNKNOWN!"));
    }

    #[test]
    fn test_failed_conversion_flags_category() {
        let workbook = WorkbookFixture::new()
            .sheet(
                SheetFixture::new("ART")
                    .image(b"corrupt".to_vec())
                    .image(png(1, 1)),
            )
            .build();

        let categories = XlsxExtractor::default().extract(&workbook).unwrap();
        let art = &categories[0];
        assert_eq!(art.images_count(), 1);
        assert_eq!(art.images()[0].index(), 2);
        assert!(art.unsupported_objects_detected());
    }

    #[test]
    fn test_unreadable_sheet_degrades() {
        let workbook = WorkbookFixture::new()
            .sheet(SheetFixture::new("BROKEN").image(png(1, 1)).malformed_drawing())
            .sheet(SheetFixture::new("KIDS").image(png(1, 1)))
            .build();

        let categories = XlsxExtractor::default().extract(&workbook).unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].images_count(), 0);
        assert!(categories[0].unsupported_objects_detected());
        assert!(categories[0].notes().is_some());
        assert_eq!(categories[1].images_count(), 1);
    }

    #[test]
    fn test_invalid_package() {
        let result = XlsxExtractor::default().extract(b"not a workbook");
        assert!(matches!(result, Err(ExtractError::InvalidPackage { .. })));
    }
}
