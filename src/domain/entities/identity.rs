//! Workbook identity value object.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of leading bytes hashed into a content digest.
pub const DIGEST_PREFIX_BYTES: usize = 64 * 1024;

/// Where the workbook comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Workbook on the local filesystem.
    Local,
    /// Workbook stored in a Microsoft Graph drive.
    Graph,
}

impl SourceMode {
    /// Returns the lowercase name used in logs and cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Graph => "graph",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint of one version of the workbook.
///
/// Equality requires the same locator, modification time and size. When both
/// sides carry a content digest it must match too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkbookIdentity {
    locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified_ns: Option<i128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digest: Option<String>,
}

impl WorkbookIdentity {
    /// Creates an identity from metadata signals.
    #[must_use]
    pub fn new(locator: impl Into<String>, modified_ns: Option<i128>, size: Option<u64>) -> Self {
        Self {
            locator: locator.into(),
            modified_ns,
            size,
            digest: None,
        }
    }

    /// Attaches a content digest.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Returns the source path or remote locator.
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Returns the modification time in nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn modified_ns(&self) -> Option<i128> {
        self.modified_ns
    }

    /// Returns the byte size.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        self.size
    }

    /// Returns the prefix digest, if one was computed.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Renders every present field as `locator|mtime|size[|sig:digest]`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mtime = self
            .modified_ns
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        let size = self.size.map_or_else(|| "-".to_string(), |v| v.to_string());
        match &self.digest {
            Some(digest) => format!("{}|{mtime}|{size}|sig:{digest}", self.locator),
            None => format!("{}|{mtime}|{size}", self.locator),
        }
    }

    /// Short stable hash of the fingerprint, suitable for entity tags.
    #[must_use]
    pub fn short_hash(&self) -> String {
        short_sha256(self.fingerprint().as_bytes())
    }
}

impl PartialEq for WorkbookIdentity {
    fn eq(&self, other: &Self) -> bool {
        if self.locator != other.locator
            || self.modified_ns != other.modified_ns
            || self.size != other.size
        {
            return false;
        }
        match (&self.digest, &other.digest) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl Eq for WorkbookIdentity {}

impl Hash for WorkbookIdentity {
    // Only the locator participates; it is the one field equality always compares.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.locator.hash(state);
    }
}

impl fmt::Display for WorkbookIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Hashes a bounded content prefix into the digest used by identities.
#[must_use]
pub fn prefix_digest(bytes: &[u8]) -> String {
    let end = bytes.len().min(DIGEST_PREFIX_BYTES);
    short_sha256(&bytes[..end])
}

/// First 16 hex characters of a SHA-256 digest.
#[must_use]
pub fn short_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_when_all_fields_match() {
        let a = WorkbookIdentity::new("/data/art.xlsx", Some(10), Some(200));
        let b = WorkbookIdentity::new("/data/art.xlsx", Some(10), Some(200));
        assert_eq!(a, b);
    }

    #[test]
    fn test_differs_on_size_or_mtime() {
        let base = WorkbookIdentity::new("/data/art.xlsx", Some(10), Some(200));
        assert_ne!(base, WorkbookIdentity::new("/data/art.xlsx", Some(11), Some(200)));
        assert_ne!(base, WorkbookIdentity::new("/data/art.xlsx", Some(10), Some(201)));
        assert_ne!(base, WorkbookIdentity::new("/other.xlsx", Some(10), Some(200)));
    }

    #[test]
    fn test_digest_adds_to_metadata() {
        let a = WorkbookIdentity::new("graph:d/i", Some(10), Some(200)).with_digest("aaaa");
        let same_meta_new_content =
            WorkbookIdentity::new("graph:d/i", Some(10), Some(200)).with_digest("bbbb");
        let touched_same_prefix =
            WorkbookIdentity::new("graph:d/i", Some(99), Some(200)).with_digest("aaaa");
        let grown_same_prefix =
            WorkbookIdentity::new("graph:d/i", Some(10), Some(260)).with_digest("aaaa");

        assert_ne!(a, same_meta_new_content);
        assert_ne!(a, touched_same_prefix);
        assert_ne!(a, grown_same_prefix);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_digest_on_one_side_falls_back_to_metadata() {
        let a = WorkbookIdentity::new("graph:d/i", Some(10), Some(200)).with_digest("aaaa");
        let b = WorkbookIdentity::new("graph:d/i", Some(10), Some(200));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sidecar_json_round_trip_preserves_equality() {
        let a = WorkbookIdentity::new("/data/art.xlsx", Some(1_700_000_000_123_456_789), Some(4096));
        let json = serde_json::to_string(&a).unwrap();
        let back: WorkbookIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
        assert!(!json.contains("digest"));
    }

    #[test]
    fn test_fingerprint_format() {
        let id = WorkbookIdentity::new("/a.xlsx", Some(5), None).with_digest("ff00");
        assert_eq!(id.fingerprint(), "/a.xlsx|5|-|sig:ff00");
    }

    #[test]
    fn test_prefix_digest_ignores_bytes_past_prefix() {
        let mut long = vec![7u8; DIGEST_PREFIX_BYTES];
        let first = prefix_digest(&long);
        long.extend_from_slice(b"tail");
        assert_eq!(first, prefix_digest(&long));
        assert_eq!(first.len(), 16);
    }
}
