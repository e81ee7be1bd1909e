//! Catalog response shapes.

use serde::{Deserialize, Serialize};

use super::Category;

/// One category as sent to browsing clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    /// Worksheet title.
    pub name: String,
    /// Media URLs in worksheet order.
    pub images: Vec<String>,
    /// Number of images.
    pub images_count: usize,
    /// Whether non-image objects were found in the worksheet.
    pub unsupported_objects_detected: bool,
    /// Diagnostics for the gallery.
    pub notes: Option<String>,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name().to_string(),
            images: category.images().iter().map(super::ImageRef::url).collect(),
            images_count: category.images_count(),
            unsupported_objects_detected: category.unsupported_objects_detected(),
            notes: category.notes().map(str::to_string),
        }
    }
}

/// Full catalog payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    /// Categories in worksheet order.
    pub categories: Vec<CategoryView>,
}

impl CatalogResponse {
    /// Builds the payload from extracted categories.
    #[must_use]
    pub fn from_categories(categories: &[Category]) -> Self {
        Self {
            categories: categories.iter().map(CategoryView::from).collect(),
        }
    }

    /// Total images across categories.
    #[must_use]
    pub fn total_images(&self) -> usize {
        self.categories.iter().map(|c| c.images_count).sum()
    }
}

/// How a catalog reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Served from the catalog cache.
    Hit,
    /// Built because no cached entry was current.
    Miss,
    /// Built because the caller asked to skip the cache.
    Bypass,
}

impl CacheState {
    /// Header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Bypass => "bypass",
        }
    }
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
