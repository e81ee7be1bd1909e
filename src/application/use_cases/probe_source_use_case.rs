//! Source health probe.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::dto::SourceHealth;
use crate::domain::entities::SourceMode;
use crate::domain::errors::SourceError;
use crate::domain::ports::{AbortSignal, WorkbookSource};
use crate::infrastructure::source::redact;

/// Reports whether the remote workbook can be downloaded.
#[derive(Clone)]
pub struct ProbeSourceUseCase {
    mode: SourceMode,
    source: Result<Arc<dyn WorkbookSource>, SourceError>,
}

impl ProbeSourceUseCase {
    /// Creates a probe for `mode` over the outcome of building its source.
    #[must_use]
    pub const fn new(mode: SourceMode, source: Result<Arc<dyn WorkbookSource>, SourceError>) -> Self {
        Self { mode, source }
    }

    /// Executes the probe.
    pub async fn execute(&self) -> SourceHealth {
        if self.mode == SourceMode::Local {
            debug!("Health probe disabled in local mode");
            return SourceHealth::Disabled;
        }

        let source = match &self.source {
            Ok(source) => source,
            Err(SourceError::Misconfigured { missing, .. }) => {
                warn!(missing = ?missing, "Source is not configured");
                return SourceHealth::MissingConfiguration {
                    missing: missing.clone(),
                };
            }
            Err(e) => {
                let message = redact(&e.to_string(), &[]);
                warn!(error = %message, "Source could not be created");
                return SourceHealth::Error { message };
            }
        };

        match source.load(&AbortSignal::never()).await {
            Ok(bytes) => {
                info!(bytes = bytes.len(), "Workbook source reachable");
                SourceHealth::Reachable { bytes: bytes.len() }
            }
            Err(e) => {
                let message = source.redact(&e.to_string());
                warn!(error = %message, "Workbook source unreachable");
                SourceHealth::Error { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::WorkbookIdentity;
    use crate::domain::ports::mocks::MockWorkbookSource;

    fn graph_source() -> Arc<MockWorkbookSource> {
        Arc::new(MockWorkbookSource::new(
            SourceMode::Graph,
            WorkbookIdentity::new("graph:drives/d/items/i", Some(1), Some(5)),
            b"bytes".to_vec(),
        ))
    }

    #[tokio::test]
    async fn test_local_mode_is_disabled() {
        let probe = ProbeSourceUseCase::new(SourceMode::Local, Err(SourceError::unavailable("x")));
        assert_eq!(probe.execute().await, SourceHealth::Disabled);
    }

    #[tokio::test]
    async fn test_missing_configuration() {
        let probe = ProbeSourceUseCase::new(
            SourceMode::Graph,
            Err(SourceError::misconfigured(
                "graph",
                vec!["MS_TENANT_ID".to_string(), "MS_CLIENT_SECRET".to_string()],
            )),
        );
        assert_eq!(
            probe.execute().await,
            SourceHealth::MissingConfiguration {
                missing: vec!["MS_TENANT_ID".to_string(), "MS_CLIENT_SECRET".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_source_construction_error_is_redacted() {
        let probe = ProbeSourceUseCase::new(
            SourceMode::Graph,
            Err(SourceError::unavailable(
                "client setup failed: Authorization: Bearer eyJ0eXAi.secret https://x?sig=abcdef",
            )),
        );
        let SourceHealth::Error { message } = probe.execute().await else {
            panic!("expected error health");
        };
        assert!(message.contains("client setup failed"));
        assert!(!message.contains("eyJ0eXAi"));
        assert!(!message.contains("abcdef"));
    }

    #[tokio::test]
    async fn test_reachable() {
        let source = graph_source();
        let probe = ProbeSourceUseCase::new(SourceMode::Graph, Ok(source));
        assert_eq!(probe.execute().await, SourceHealth::Reachable { bytes: 5 });
    }

    #[tokio::test]
    async fn test_unreachable() {
        let source = graph_source();
        source.set_available(false);
        let probe = ProbeSourceUseCase::new(SourceMode::Graph, Ok(source));
        assert!(matches!(probe.execute().await, SourceHealth::Error { .. }));
    }
}
