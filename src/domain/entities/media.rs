//! Validated media references.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::errors::MediaError;

static SAFE_CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("Invalid regex"));

static IMAGE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^img_([1-9][0-9]{0,8})\.png$").expect("Invalid regex"));

static CACHE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^img_([0-9]+)\.(png|meta)$").expect("Invalid regex"));

/// A category/filename pair that is safe to join onto a cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaRef {
    category: String,
    index: u32,
}

impl MediaRef {
    /// Validates raw path parameters.
    ///
    /// # Errors
    /// Returns `MediaError::InvalidReference` for anything other than a safe slug
    /// and an `img_<positive integer>.png` filename.
    pub fn parse(category: &str, filename: &str) -> Result<Self, MediaError> {
        if !is_safe_category(category) {
            return Err(MediaError::invalid_reference("invalid media category"));
        }

        let index = IMAGE_FILENAME
            .captures(filename)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| MediaError::invalid_reference("invalid media filename"))?;

        Ok(Self {
            category: category.to_string(),
            index,
        })
    }

    /// Creates a reference from already trusted parts.
    #[must_use]
    pub fn new_unchecked(category: impl Into<String>, index: u32) -> Self {
        Self {
            category: category.into(),
            index,
        }
    }

    /// Category slug.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// 1-based image index.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Image filename.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("img_{}.png", self.index)
    }

    /// Sidecar filename.
    #[must_use]
    pub fn meta_filename(&self) -> String {
        format!("img_{}.meta", self.index)
    }
}

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/img_{}.png", self.category, self.index)
    }
}

/// Whether `name` is usable as a category directory.
#[must_use]
pub fn is_safe_category(name: &str) -> bool {
    SAFE_CATEGORY.is_match(name) && name != "." && name != ".."
}

/// Kind of file managed by the media cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFileKind {
    /// PNG image.
    Image,
    /// Identity sidecar.
    Meta,
}

/// Parses `img_<n>.png` / `img_<n>.meta`; any other name is not a cache file.
#[must_use]
pub fn parse_cache_filename(name: &str) -> Option<(u64, CacheFileKind)> {
    let caps = CACHE_FILENAME.captures(name)?;
    let index = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let kind = match caps.get(2)?.as_str() {
        "png" => CacheFileKind::Image,
        _ => CacheFileKind::Meta,
    };
    Some((index, kind))
}
