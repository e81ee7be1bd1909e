//! Worksheet categories and their extracted images.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;

static INVALID_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Invalid regex"));

/// One extracted image, already encoded as PNG.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRef {
    category: String,
    index: u32,
    content: Bytes,
}

impl ImageRef {
    /// Creates a new image reference. `index` is 1-based.
    #[must_use]
    pub fn new(category: impl Into<String>, index: u32, content: impl Into<Bytes>) -> Self {
        Self {
            category: category.into(),
            index,
            content: content.into(),
        }
    }

    /// Slug of the owning category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// 1-based position within the worksheet.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// PNG bytes.
    #[must_use]
    pub const fn content(&self) -> &Bytes {
        &self.content
    }

    /// Length of the PNG content in bytes.
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content.len()
    }

    /// Cache filename, `img_<index>.png`.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("img_{}.png", self.index)
    }

    /// Public media URL for this image.
    #[must_use]
    pub fn url(&self) -> String {
        format!("/api/media/{}/{}", self.category, self.filename())
    }
}

impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRef")
            .field("category", &self.category)
            .field("index", &self.index)
            .field("content_length", &self.content.len())
            .finish()
    }
}

/// One worksheet of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    slug: String,
    images: Vec<ImageRef>,
    unsupported_objects_detected: bool,
    notes: Option<String>,
}

impl Category {
    /// Creates a category.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        images: Vec<ImageRef>,
        unsupported_objects_detected: bool,
        notes: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            images,
            unsupported_objects_detected,
            notes,
        }
    }

    /// A category whose worksheet could not be read; it carries no images.
    #[must_use]
    pub fn degraded(name: impl Into<String>, slug: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(name, slug, Vec::new(), true, Some(note.into()))
    }

    /// Worksheet title.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem and URL safe name.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Extracted images in worksheet order.
    #[must_use]
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// Number of extracted images.
    #[must_use]
    pub fn images_count(&self) -> usize {
        self.images.len()
    }

    /// Whether objects were found that could not be extracted as images.
    #[must_use]
    pub const fn unsupported_objects_detected(&self) -> bool {
        self.unsupported_objects_detected
    }

    /// Human readable diagnostics.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// Allocates unique slugs for worksheet titles in catalog order.
#[derive(Debug, Default)]
pub struct SlugAllocator {
    used: HashSet<String>,
}

impl SlugAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a slug for `title`, suffixing `_2`, `_3`, ... on collision.
    pub fn allocate(&mut self, title: &str) -> String {
        let base = slugify(title);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut suffix = 2u32;
        loop {
            let candidate = format!("{base}_{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Replaces characters outside `[A-Za-z0-9._-]` with `_`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let normalized = INVALID_SLUG_CHARS.replace_all(title.trim(), "_");
    if normalized.is_empty() || normalized.chars().all(|c| c == '.') {
        "UNTITLED".to_string()
    } else {
        normalized.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("KIDS", "KIDS" ; "plain")]
    #[test_case("  Oil paintings ", "Oil_paintings" ; "spaces_collapse")]
    #[test_case("Été/2024", "_t_2024" ; "non_ascii_and_slash")]
    #[test_case("", "UNTITLED" ; "empty")]
    #[test_case("..", "UNTITLED" ; "dot_dot")]
    fn test_slugify(input: &str, expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[test]
    fn test_allocator_suffixes_collisions() {
        let mut slugs = SlugAllocator::new();
        assert_eq!(slugs.allocate("A B"), "A_B");
        assert_eq!(slugs.allocate("A/B"), "A_B_2");
        assert_eq!(slugs.allocate("A?B"), "A_B_3");
    }

    #[test]
    fn test_image_count_matches_list() {
        let images = vec![
            ImageRef::new("KIDS", 1, vec![1u8]),
            ImageRef::new("KIDS", 2, vec![2u8]),
        ];
        let category = Category::new("KIDS", "KIDS", images, false, None);
        assert_eq!(category.images_count(), 2);
        assert_eq!(category.images()[1].url(), "/api/media/KIDS/img_2.png");
    }
}
