//! Workbook on the local filesystem.

use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::with_deadline;
use crate::domain::entities::{DIGEST_PREFIX_BYTES, SourceMode, WorkbookIdentity, prefix_digest};
use crate::domain::errors::SourceError;
use crate::domain::ports::{AbortSignal, IdentityResolverPort, SourceLoaderPort, WorkbookSource};

/// Reads the workbook from a path.
#[derive(Debug, Clone)]
pub struct LocalWorkbookSource {
    path: PathBuf,
    timeout: Duration,
    digest: bool,
}

impl LocalWorkbookSource {
    /// Creates a source reading `path`, bounded by `timeout` per operation.
    /// With `digest` set, identities also hash the leading content bytes.
    #[must_use]
    pub const fn new(path: PathBuf, timeout: Duration, digest: bool) -> Self {
        Self {
            path,
            timeout,
            digest,
        }
    }

    /// Path of the workbook file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &str, err: &std::io::Error) -> SourceError {
        SourceError::unavailable(format!(
            "failed to {action} {}: {err}",
            self.path.display()
        ))
    }

    async fn metadata(&self) -> Result<std::fs::Metadata, SourceError> {
        let metadata = fs::metadata(&self.path)
            .await
            .map_err(|e| self.io_error("stat", &e))?;
        if !metadata.is_file() {
            return Err(SourceError::unavailable(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        Ok(metadata)
    }

    async fn read_prefix(&self) -> Result<Vec<u8>, SourceError> {
        let file = fs::File::open(&self.path)
            .await
            .map_err(|e| self.io_error("open", &e))?;
        let mut buf = Vec::with_capacity(DIGEST_PREFIX_BYTES);
        file.take(DIGEST_PREFIX_BYTES as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| self.io_error("read", &e))?;
        Ok(buf)
    }
}

#[async_trait]
impl IdentityResolverPort for LocalWorkbookSource {
    async fn resolve_identity(&self) -> Result<WorkbookIdentity, SourceError> {
        let metadata = self.metadata().await?;
        let modified_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i128::try_from(d.as_nanos()).ok());

        let identity = WorkbookIdentity::new(
            self.path.display().to_string(),
            modified_ns,
            Some(metadata.len()),
        );
        if !self.digest {
            return Ok(identity);
        }

        let prefix = self.read_prefix().await?;
        Ok(identity.with_digest(prefix_digest(&prefix)))
    }
}

#[async_trait]
impl SourceLoaderPort for LocalWorkbookSource {
    async fn load(&self, abort: &AbortSignal) -> Result<Bytes, SourceError> {
        with_deadline(self.timeout, abort, async {
            self.metadata().await?;
            let bytes = fs::read(&self.path)
                .await
                .map_err(|e| self.io_error("read", &e))?;
            debug!(path = %self.path.display(), bytes = bytes.len(), "Loaded local workbook");
            Ok(Bytes::from(bytes))
        })
        .await
    }
}

impl WorkbookSource for LocalWorkbookSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(dir: &TempDir, digest: bool) -> LocalWorkbookSource {
        LocalWorkbookSource::new(dir.path().join("art.xlsx"), Duration::from_secs(5), digest)
    }

    #[tokio::test]
    async fn test_identity_stable_and_changes_with_size() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, false);
        std::fs::write(source.path(), b"version one").unwrap();

        let first = source.resolve_identity().await.unwrap();
        let again = source.resolve_identity().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first.size(), Some(11));
        assert!(first.modified_ns().is_some());
        assert!(first.digest().is_none());

        std::fs::write(source.path(), b"version two, longer").unwrap();
        let second = source.resolve_identity().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_identity_with_digest() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, true);
        std::fs::write(source.path(), b"workbook bytes").unwrap();

        let identity = source.resolve_identity().await.unwrap();
        assert_eq!(identity.digest(), Some(prefix_digest(b"workbook bytes").as_str()));
    }

    #[tokio::test]
    async fn test_digest_identity_changes_when_bytes_appended_past_prefix() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, true);
        let mut content = vec![b'x'; DIGEST_PREFIX_BYTES + 10];
        std::fs::write(source.path(), &content).unwrap();
        let first = source.resolve_identity().await.unwrap();

        content.extend_from_slice(b"appended picture entry");
        std::fs::write(source.path(), &content).unwrap();
        let second = source.resolve_identity().await.unwrap();

        assert_eq!(first.digest(), second.digest());
        assert_ne!(first.size(), second.size());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, false);

        let err = source.resolve_identity().await.unwrap_err();
        assert!(err.is_retryable());
        let err = source.load(&AbortSignal::never()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let source = LocalWorkbookSource::new(dir.path().to_path_buf(), Duration::from_secs(5), false);
        let err = source.resolve_identity().await.unwrap_err();
        assert!(err.to_string().contains("is not a file"));
    }

    #[tokio::test]
    async fn test_load_returns_bytes() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, false);
        std::fs::write(source.path(), b"PK\x03\x04data").unwrap();

        let bytes = source.load(&AbortSignal::never()).await.unwrap();
        assert_eq!(&bytes[..], b"PK\x03\x04data");
    }

    #[tokio::test]
    async fn test_aborted_load() {
        let dir = TempDir::new().unwrap();
        let source = source(&dir, false);
        std::fs::write(source.path(), b"data").unwrap();

        let (handle, signal) = AbortSignal::pair();
        handle.abort();
        assert!(source.load(&signal).await.is_err());
    }
}
