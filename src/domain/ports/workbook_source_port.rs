//! Workbook source port definitions.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;

use crate::domain::entities::{SourceMode, WorkbookIdentity};
use crate::domain::errors::SourceError;

/// Cancellation signal a caller hands to a source loader.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending half of an [`AbortSignal`].
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Aborts every load observing the paired signal.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

impl AbortSignal {
    /// A signal that never fires.
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Creates a connected handle and signal.
    #[must_use]
    pub fn pair() -> (AbortHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (AbortHandle { tx }, Self { rx: Some(rx) })
    }

    /// Returns whether abort was requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once abort is requested; pends forever otherwise.
    pub async fn aborted(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

/// Computes a cheap fingerprint of the current workbook.
#[async_trait]
pub trait IdentityResolverPort: Send + Sync {
    /// Resolves the identity without downloading or parsing the whole workbook.
    async fn resolve_identity(&self) -> Result<WorkbookIdentity, SourceError>;
}

/// Fetches raw workbook bytes.
#[async_trait]
pub trait SourceLoaderPort: Send + Sync {
    /// Loads the full workbook. Implementations enforce their own timeout.
    async fn load(&self, abort: &AbortSignal) -> Result<Bytes, SourceError>;
}

/// A workbook source able to both fingerprint and load the workbook.
pub trait WorkbookSource: IdentityResolverPort + SourceLoaderPort {
    /// Which kind of source this is.
    fn mode(&self) -> SourceMode;

    /// Removes credentials this source knows about from `message`.
    fn redact(&self, message: &str) -> String {
        message.to_string()
    }
}
