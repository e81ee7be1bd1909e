//! Disk-based media cache with identity sidecars.
//!
//! Layout: `<root>/<category>/img_<n>.png` plus `<root>/<category>/img_<n>.meta`,
//! where the sidecar holds the JSON identity of the workbook that produced the
//! image.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{
    CacheFileKind, ImageRef, MediaRef, WorkbookIdentity, is_safe_category, parse_cache_filename,
    short_sha256,
};
use crate::domain::errors::MediaError;
use crate::domain::ports::{MediaStorePort, ReconcileReport, StoredMedia};

/// Snapshot of the store's size counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaStoreStats {
    /// Number of cached images.
    pub records: usize,
    /// Total PNG bytes on disk.
    pub bytes: u64,
}

/// Disk-backed media store.
pub struct DiskMediaStore {
    root: PathBuf,
    latest: RwLock<Option<WorkbookIdentity>>,
    current_size: AtomicU64,
    item_count: AtomicUsize,
}

impl std::fmt::Debug for DiskMediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskMediaStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl DiskMediaStore {
    /// Opens a store rooted at `root`, creating the directory when missing.
    ///
    /// # Errors
    /// Returns error if the root cannot be created or listed.
    pub async fn new(root: PathBuf) -> Result<Self, MediaError> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| MediaError::io(format!("failed to create media dir: {e}")))?;

        let mut total_size = 0u64;
        let mut count = 0usize;
        for dir in list_category_dirs(&root).await? {
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name();
                if matches!(
                    parse_cache_filename(&name.to_string_lossy()),
                    Some((_, CacheFileKind::Image))
                ) && let Ok(meta) = entry.metadata().await
                {
                    total_size += meta.len();
                    count += 1;
                }
            }
        }

        debug!(root = %root.display(), records = count, bytes = total_size, "Opened media cache");

        Ok(Self {
            root,
            latest: RwLock::new(None),
            current_size: AtomicU64::new(total_size),
            item_count: AtomicUsize::new(count),
        })
    }

    /// Opens a store in the default location (`<cache dir>/media`).
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn default_location() -> Result<Self, MediaError> {
        Self::new(default_media_dir()).await
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the current size counters.
    #[must_use]
    pub fn stats(&self) -> MediaStoreStats {
        MediaStoreStats {
            records: self.item_count.load(Ordering::Relaxed),
            bytes: self.current_size.load(Ordering::Relaxed),
        }
    }

    /// Identity the store currently serves.
    pub async fn latest_identity(&self) -> Option<WorkbookIdentity> {
        self.latest.read().await.clone()
    }

    fn image_path(&self, media: &MediaRef) -> PathBuf {
        self.root.join(media.category()).join(media.filename())
    }

    fn meta_path(&self, media: &MediaRef) -> PathBuf {
        self.root.join(media.category()).join(media.meta_filename())
    }

    // Files placed on disk behind the store's back are not counted, so saturate.
    fn record_removed(&self, size: u64) {
        let _ = self
            .current_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(size))
            });
        let _ = self
            .item_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    /// Removes stale records in one category directory.
    async fn clean_category(
        &self,
        dir: &Path,
        keep: &WorkbookIdentity,
        report: &mut ReconcileReport,
    ) {
        let Ok(mut entries) = fs::read_dir(dir).await else {
            warn!(dir = %dir.display(), "Failed to list media category");
            report.failures += 1;
            return;
        };

        let mut records: HashMap<u64, (Option<PathBuf>, Option<PathBuf>)> = HashMap::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some((index, kind)) = parse_cache_filename(&name.to_string_lossy()) else {
                continue;
            };
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            let slot = records.entry(index).or_default();
            match kind {
                CacheFileKind::Image => slot.0 = Some(entry.path()),
                CacheFileKind::Meta => slot.1 = Some(entry.path()),
            }
        }

        let mut removed_in_dir = false;
        for (image, meta) in records.into_values() {
            let is_current = match &meta {
                Some(path) => read_sidecar(path).await.is_some_and(|id| id == *keep),
                None => false,
            };
            if is_current {
                continue;
            }

            if let Some(path) = image {
                let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        self.record_removed(size);
                        report.images_removed += 1;
                        removed_in_dir = true;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove stale image");
                        report.failures += 1;
                    }
                }
            }
            if let Some(path) = meta {
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        report.meta_removed += 1;
                        removed_in_dir = true;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove stale sidecar");
                        report.failures += 1;
                    }
                }
            }
        }

        if !removed_in_dir {
            return;
        }
        if let Some(name) = dir.file_name() {
            report
                .categories_cleaned
                .push(name.to_string_lossy().into_owned());
        }

        if is_dir_empty(dir).await {
            if let Err(e) = fs::remove_dir(dir).await {
                debug!(dir = %dir.display(), error = %e, "Left empty media category in place");
            } else {
                trace!(dir = %dir.display(), "Removed empty media category");
            }
        }
    }
}

#[async_trait]
impl MediaStorePort for DiskMediaStore {
    async fn put(&self, identity: &WorkbookIdentity, image: &ImageRef) -> Result<(), MediaError> {
        if !is_safe_category(image.category()) || image.index() == 0 {
            return Err(MediaError::invalid_reference(format!(
                "refusing to store {}/{}",
                image.category(),
                image.filename()
            )));
        }
        let media = MediaRef::new_unchecked(image.category(), image.index());
        // Image and sidecar are replaced as a pair; readers must not observe one without the other.
        let _guard = self.latest.write().await;

        let dir = self.root.join(media.category());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| MediaError::io(format!("failed to create category dir: {e}")))?;

        let image_path = self.image_path(&media);
        let old_size = fs::metadata(&image_path).await.map(|m| m.len()).ok();

        write_atomic(&image_path, image.content()).await?;

        let sidecar = serde_json::to_vec(identity)
            .map_err(|e| MediaError::io(format!("failed to encode sidecar: {e}")))?;
        write_atomic(&self.meta_path(&media), &sidecar).await?;

        let new_size = image.content_length() as u64;
        if let Some(old) = old_size {
            if new_size > old {
                self.current_size
                    .fetch_add(new_size - old, Ordering::Relaxed);
            } else {
                self.current_size
                    .fetch_sub(old - new_size, Ordering::Relaxed);
            }
        } else {
            self.current_size.fetch_add(new_size, Ordering::Relaxed);
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }

        trace!(media = %media, size = new_size, "Stored image in media cache");
        Ok(())
    }

    async fn get(&self, category: &str, filename: &str) -> Result<StoredMedia, MediaError> {
        let media = MediaRef::parse(category, filename).inspect_err(|e| {
            debug!(category, filename, error = %e, "Rejected media reference");
        })?;

        let guard = self.latest.read().await;
        let Some(latest) = guard.as_ref() else {
            trace!(media = %media, "Media cache has no current identity");
            return Err(MediaError::NotFound);
        };

        let Some(identity) = read_sidecar(&self.meta_path(&media)).await else {
            trace!(media = %media, "Media cache miss");
            return Err(MediaError::NotFound);
        };
        if identity != *latest {
            trace!(media = %media, "Media record belongs to a superseded workbook");
            return Err(MediaError::NotFound);
        }

        let image_path = self.image_path(&media);
        let content = match fs::read(&image_path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::NotFound);
            }
            Err(e) => return Err(MediaError::io(format!("failed to read image: {e}"))),
        };
        let meta = fs::metadata(&image_path)
            .await
            .map_err(|e| MediaError::io(format!("failed to stat image: {e}")))?;

        let etag = media_etag(&meta, &identity, &media.filename());
        trace!(media = %media, "Media cache hit");

        Ok(StoredMedia {
            content,
            identity,
            etag,
        })
    }

    async fn reconcile(
        &self,
        old: Option<&WorkbookIdentity>,
        new: &WorkbookIdentity,
    ) -> ReconcileReport {
        let mut latest = self.latest.write().await;
        *latest = Some(new.clone());

        if old == Some(new) {
            debug!(identity = %new, "Workbook identity unchanged, media cache kept");
            return ReconcileReport::default();
        }

        let mut report = ReconcileReport::default();
        match list_category_dirs(&self.root).await {
            Ok(dirs) => {
                for dir in dirs {
                    self.clean_category(&dir, new, &mut report).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to list media cache root");
                report.failures += 1;
            }
        }

        info!(
            old_identity = %old.map_or_else(|| "none".to_string(), WorkbookIdentity::fingerprint),
            new_identity = %new,
            categories_cleaned = report.categories_cleaned.len(),
            files_removed = report.files_removed(),
            images_removed = report.images_removed,
            meta_removed = report.meta_removed,
            failures = report.failures,
            "Media cache reconciled"
        );
        drop(latest);

        report
    }
}

/// Weak entity tag combining file metadata and the producing identity.
fn media_etag(meta: &std::fs::Metadata, identity: &WorkbookIdentity, filename: &str) -> String {
    let mtime_ns = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos());
    let seed = format!("{}|{filename}", identity.fingerprint());
    format!(
        "W/\"{mtime_ns:x}-{:x}-{}\"",
        meta.len(),
        short_sha256(seed.as_bytes())
    )
}

async fn read_sidecar(path: &Path) -> Option<WorkbookIdentity> {
    let raw = fs::read(path).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(identity) => Some(identity),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable media sidecar");
            None
        }
    }
}

/// Writes through a temporary sibling persisted over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MediaError> {
    let path = path.to_path_buf();
    let bytes = bytes.to_vec();

    tokio::task::spawn_blocking(move || -> Result<(), MediaError> {
        let parent = path
            .parent()
            .ok_or_else(|| MediaError::io("invalid cache path"))?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| MediaError::io(format!("failed to create cache file: {e}")))?;
        temp_file
            .write_all(&bytes)
            .map_err(|e| MediaError::io(format!("failed to write cache file: {e}")))?;
        temp_file
            .persist(&path)
            .map_err(|e| MediaError::io(format!("failed to move cache file into place: {}", e.error)))?;
        Ok(())
    })
    .await
    .map_err(|e| MediaError::io(format!("cache writer panicked: {e}")))?
}

async fn list_category_dirs(root: &Path) -> Result<Vec<PathBuf>, MediaError> {
    let mut entries = fs::read_dir(root)
        .await
        .map_err(|e| MediaError::io(format!("failed to read media dir: {e}")))?;

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MediaError::io(format!("failed to read entry: {e}")))?
    {
        let name = entry.file_name();
        if is_safe_category(&name.to_string_lossy())
            && entry.file_type().await.is_ok_and(|t| t.is_dir())
        {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

async fn is_dir_empty(dir: &Path) -> bool {
    match fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

/// Returns the default media directory.
#[must_use]
pub fn default_media_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "linuxmobile", "artwork-catalog").map_or_else(
        || std::env::temp_dir().join("artwork_cache"),
        |dirs| dirs.cache_dir().join("media"),
    )
}
