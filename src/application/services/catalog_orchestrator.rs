//! Catalog rebuild coordination.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::application::dto::{CatalogReply, CatalogRequest, MediaReply, MediaRequest};
use crate::domain::entities::{
    CacheState, CatalogResponse, MediaRef, SourceMode, WorkbookIdentity,
};
use crate::domain::errors::{CatalogError, MediaError, SourceError};
use crate::domain::ports::{AbortSignal, ExtractorPort, MediaStorePort, WorkbookSource};
use crate::infrastructure::cache::{CachedCatalogEntry, MemoryCatalogCache};

/// Default catalog time-to-live.
pub const DEFAULT_CATALOG_TTL: Duration = Duration::from_secs(60);
/// Default identity reuse window for media requests.
pub const DEFAULT_IDENTITY_REUSE: Duration = Duration::from_millis(2000);

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Catalog cache time-to-live; zero disables catalog caching.
    pub catalog_ttl: Duration,
    /// How long media requests reuse the last resolved identity.
    pub identity_reuse: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            catalog_ttl: DEFAULT_CATALOG_TTL,
            identity_reuse: DEFAULT_IDENTITY_REUSE,
        }
    }
}

/// Identity of the most recent successful build.
#[derive(Debug, Default)]
pub struct BuildState {
    previous: Mutex<Option<WorkbookIdentity>>,
}

impl BuildState {
    /// Creates state with no build recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of the last successful build.
    #[must_use]
    pub fn previous(&self) -> Option<WorkbookIdentity> {
        self.previous.lock().clone()
    }

    fn record(&self, identity: WorkbookIdentity) {
        *self.previous.lock() = Some(identity);
    }

    fn is_current(&self, identity: &WorkbookIdentity) -> bool {
        self.previous.lock().as_ref() == Some(identity)
    }

    /// Forgets the last build.
    pub fn reset(&self) {
        self.previous.lock().take();
    }
}

struct ResolvedIdentity {
    identity: WorkbookIdentity,
    at: Instant,
}

/// Decides when to rebuild the catalog and keeps media in step with it.
pub struct CatalogOrchestrator {
    source: Arc<dyn WorkbookSource>,
    extractor: Arc<dyn ExtractorPort>,
    media: Arc<dyn MediaStorePort>,
    catalogs: Arc<MemoryCatalogCache>,
    state: Arc<BuildState>,
    settings: OrchestratorSettings,
    gates: Mutex<HashMap<SourceMode, Arc<tokio::sync::Mutex<()>>>>,
    resolved: Mutex<Option<ResolvedIdentity>>,
}

impl CatalogOrchestrator {
    /// Creates an orchestrator with fresh build state.
    #[must_use]
    pub fn new(
        source: Arc<dyn WorkbookSource>,
        extractor: Arc<dyn ExtractorPort>,
        media: Arc<dyn MediaStorePort>,
        catalogs: Arc<MemoryCatalogCache>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            source,
            extractor,
            media,
            catalogs,
            state: Arc::new(BuildState::new()),
            settings,
            gates: Mutex::new(HashMap::new()),
            resolved: Mutex::new(None),
        }
    }

    /// Shares build state with another owner.
    #[must_use]
    pub fn with_state(mut self, state: Arc<BuildState>) -> Self {
        self.state = state;
        self
    }

    /// Build state backing this orchestrator.
    #[must_use]
    pub fn state(&self) -> &Arc<BuildState> {
        &self.state
    }

    /// Mode of the configured source.
    #[must_use]
    pub fn mode(&self) -> SourceMode {
        self.source.mode()
    }

    /// Returns the catalog, rebuilding only when the workbook changed.
    ///
    /// # Errors
    /// Returns error if the source cannot be resolved or loaded and no cached
    /// catalog can stand in, or if the workbook cannot be extracted.
    pub async fn get_catalog(&self, request: CatalogRequest) -> Result<CatalogReply, CatalogError> {
        let started = Instant::now();
        let mode = self.source.mode();

        let identity = match self.resolve_fresh().await {
            Ok(identity) => identity,
            Err(err @ SourceError::Unavailable { .. }) if !request.bypass => {
                let message = self.source.redact(&err.to_string());
                if let Some(entry) = self.catalogs.latest(mode).await {
                    warn!(
                        mode = %mode,
                        identity = %entry.identity,
                        error = %message,
                        "Source unavailable, serving cached catalog"
                    );
                    return Ok(reply_from_entry(entry, CacheState::Hit));
                }
                warn!(mode = %mode, error = %message, "Source unavailable and no cached catalog");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        if !request.bypass
            && let Some(entry) = self.catalogs.get(mode, &identity).await
        {
            debug!(mode = %mode, identity = %identity, "Serving cached catalog");
            return Ok(reply_from_entry(entry, CacheState::Hit));
        }

        let gate = self.gate(mode);
        let _build = gate.lock().await;

        if !request.bypass
            && let Some(entry) = self.catalogs.get(mode, &identity).await
        {
            debug!(mode = %mode, identity = %identity, "Catalog built by concurrent request");
            return Ok(reply_from_entry(entry, CacheState::Hit));
        }

        let (response, etag) = self.build(mode, &identity, &request.abort, started).await?;
        let cache_state = if request.bypass {
            CacheState::Bypass
        } else {
            CacheState::Miss
        };

        Ok(CatalogReply {
            response,
            cache_state,
            etag,
            identity,
        })
    }

    /// Returns one cached image of the current workbook.
    ///
    /// # Errors
    /// Returns `MediaError::InvalidReference` or `MediaError::NotFound` wrapped
    /// in `CatalogError` for unknown images, and source or extraction errors
    /// when a build was needed and failed.
    pub async fn get_media(&self, request: MediaRequest) -> Result<MediaReply, CatalogError> {
        let media = MediaRef::parse(&request.category, &request.filename).inspect_err(|e| {
            debug!(category = %request.category, filename = %request.filename, error = %e, "Rejected media request");
        })?;

        let mode = self.source.mode();
        let identity = self.resolve_reusing().await?;

        if !self.state.is_current(&identity) {
            let gate = self.gate(mode);
            let _build = gate.lock().await;
            if !self.state.is_current(&identity) {
                info!(mode = %mode, media = %media, "Media requested before catalog build");
                self.build(mode, &identity, &AbortSignal::never(), Instant::now())
                    .await?;
            }
        }

        let stored = self
            .media
            .get(media.category(), &media.filename())
            .await?;
        if stored.identity != identity {
            debug!(media = %media, "Cached media belongs to another workbook version");
            return Err(MediaError::NotFound.into());
        }

        if request
            .if_none_match
            .as_deref()
            .is_some_and(|tag| etag_matches(tag, &stored.etag))
        {
            return Ok(MediaReply::NotModified { etag: stored.etag });
        }

        Ok(MediaReply::Content {
            content: stored.content,
            etag: stored.etag,
        })
    }

    fn gate(&self, mode: SourceMode) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.gates.lock().entry(mode).or_default())
    }

    async fn resolve_fresh(&self) -> Result<WorkbookIdentity, SourceError> {
        let identity = self.source.resolve_identity().await?;
        *self.resolved.lock() = Some(ResolvedIdentity {
            identity: identity.clone(),
            at: Instant::now(),
        });
        Ok(identity)
    }

    async fn resolve_reusing(&self) -> Result<WorkbookIdentity, SourceError> {
        let reused = self
            .resolved
            .lock()
            .as_ref()
            .filter(|r| r.at.elapsed() < self.settings.identity_reuse)
            .map(|r| r.identity.clone());
        if let Some(identity) = reused {
            return Ok(identity);
        }
        self.resolve_fresh().await
    }

    /// Loads, extracts and publishes one workbook version. Callers hold the gate.
    async fn build(
        &self,
        mode: SourceMode,
        identity: &WorkbookIdentity,
        abort: &AbortSignal,
        started: Instant,
    ) -> Result<(Arc<CatalogResponse>, String), CatalogError> {
        info!(mode = %mode, identity = %identity, "Building catalog");

        let workbook = self.source.load(abort).await.map_err(|e| {
            warn!(mode = %mode, error = %self.source.redact(&e.to_string()), "Workbook load failed");
            e
        })?;

        let extraction_started = Instant::now();
        let extractor = Arc::clone(&self.extractor);
        let categories = tokio::task::spawn_blocking(move || extractor.extract(&workbook))
            .await
            .map_err(|e| CatalogError::internal(format!("extraction task failed: {e}")))?
            .map_err(|e| {
                warn!(mode = %mode, error = %e, "Workbook extraction failed");
                e
            })?;
        let extraction_ms = extraction_started.elapsed().as_millis();

        for image in categories.iter().flat_map(|c| c.images()) {
            self.media.put(identity, image).await?;
        }

        let previous = self.state.previous();
        let report = self.media.reconcile(previous.as_ref(), identity).await;

        let response = Arc::new(CatalogResponse::from_categories(&categories));
        let etag = catalog_etag(identity);
        self.catalogs
            .put(
                mode,
                identity,
                Arc::clone(&response),
                etag.clone(),
                self.settings.catalog_ttl,
            )
            .await;
        self.state.record(identity.clone());

        info!(
            mode = %mode,
            identity = %identity,
            categories = response.categories.len(),
            images = response.total_images(),
            files_removed = report.files_removed(),
            extraction_ms,
            total_ms = started.elapsed().as_millis(),
            "Catalog built"
        );

        Ok((response, etag))
    }
}

fn reply_from_entry(entry: CachedCatalogEntry, cache_state: CacheState) -> CatalogReply {
    CatalogReply {
        response: entry.response,
        cache_state,
        etag: entry.etag,
        identity: entry.identity,
    }
}

/// Entity tag of the catalog built from `identity`.
#[must_use]
pub fn catalog_etag(identity: &WorkbookIdentity) -> String {
    format!("W/\"catalog-{}\"", identity.short_hash())
}

/// Weak comparison of an `If-None-Match` value against `etag`.
#[must_use]
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let strip = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let wanted = strip(etag);
    if_none_match
        .split(',')
        .any(|candidate| candidate.trim() == "*" || strip(candidate) == wanted)
}
