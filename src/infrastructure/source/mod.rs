//! Workbook source adapters.

pub mod graph;
pub mod local;

use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::domain::entities::SourceMode;
use crate::domain::errors::SourceError;
use crate::domain::ports::{AbortSignal, WorkbookSource};
use crate::infrastructure::config::AppConfig;

pub use graph::{GraphSettings, GraphWorkbookSource, RemoteLocator};
pub use local::LocalWorkbookSource;

const REDACTED: &str = "[REDACTED]";

static BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)bearer\s+[A-Za-z0-9\-._~+/]+=*").expect("Invalid regex")
});

static SECRET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(access_token|client_secret|code|sig)=[^&\s]+").expect("Invalid regex")
});

/// Builds the source selected by `config`.
///
/// # Errors
/// Returns `SourceError::Misconfigured` when required settings are missing.
pub fn build_source(config: &AppConfig) -> Result<Arc<dyn WorkbookSource>, SourceError> {
    config.validate_source()?;

    match config.effective_mode() {
        SourceMode::Local => {
            let Some(path) = config.local_xlsx_path.clone() else {
                return Err(SourceError::misconfigured(
                    "local mode requires a workbook path",
                    vec!["LOCAL_XLSX_PATH".to_string()],
                ));
            };
            Ok(Arc::new(LocalWorkbookSource::new(
                path,
                config.source_timeout(),
                config.identity_digest,
            )))
        }
        SourceMode::Graph => {
            let settings = GraphSettings::from_config(config)?;
            Ok(Arc::new(GraphWorkbookSource::new(settings)?))
        }
    }
}

/// Runs `fut` until it finishes, `timeout` elapses or `abort` fires.
pub(crate) async fn with_deadline<T, F>(
    timeout: Duration,
    abort: &AbortSignal,
    fut: F,
) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        biased;
        () = abort.aborted() => Err(SourceError::unavailable("workbook load aborted")),
        result = tokio::time::timeout(timeout, fut) => {
            result.unwrap_or_else(|_| Err(SourceError::timed_out(timeout.as_secs())))
        }
    }
}

/// Masks bearer tokens, secret query parameters and each of `secrets`.
#[must_use]
pub fn redact(message: &str, secrets: &[&str]) -> String {
    let mut out = BEARER.replace_all(message, format!("Bearer {REDACTED}")).into_owned();
    out = SECRET_PARAM
        .replace_all(&out, format!("$1={REDACTED}"))
        .into_owned();
    for secret in secrets.iter().filter(|s| s.len() >= 4) {
        out = out.replace(secret, REDACTED);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_redact_bearer_and_params() {
        let message = "GET failed: Authorization: Bearer eyJ0eXAi.abc-123 url=https://x?sig=abc&v=1";
        let redacted = redact(message, &[]);
        assert!(!redacted.contains("eyJ0eXAi"));
        assert!(!redacted.contains("sig=abc"));
        assert!(redacted.contains("Bearer [REDACTED]"));
        assert!(redacted.contains("v=1"));
    }

    #[test]
    fn test_redact_known_secrets() {
        let redacted = redact("secret s3cr3t-value leaked", &["s3cr3t-value", ""]);
        assert_eq!(redacted, "secret [REDACTED] leaked");
    }

    #[tokio::test]
    async fn test_with_deadline_times_out() {
        let result: Result<(), _> = with_deadline(
            Duration::from_millis(20),
            &AbortSignal::never(),
            std::future::pending(),
        )
        .await;
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_with_deadline_aborts() {
        let (handle, signal) = AbortSignal::pair();
        handle.abort();
        let result: Result<(), _> =
            with_deadline(Duration::from_secs(5), &signal, std::future::pending()).await;
        assert_eq!(
            result.unwrap_err(),
            SourceError::unavailable("workbook load aborted")
        );
    }

    #[tokio::test]
    async fn test_with_deadline_passes_result() {
        let result = with_deadline(Duration::from_secs(1), &AbortSignal::never(), async {
            Ok::<_, SourceError>(7)
        })
        .await;
        tokio_test::assert_ok!(&result);
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_build_source_local() {
        let config = AppConfig {
            local_xlsx_path: Some(PathBuf::from("/tmp/art.xlsx")),
            ..AppConfig::default()
        };
        let source = build_source(&config).unwrap();
        assert_eq!(source.mode(), SourceMode::Local);
    }

    #[test]
    fn test_build_source_misconfigured_graph() {
        let config = AppConfig {
            source_mode: Some(SourceMode::Graph),
            ..AppConfig::default()
        };
        let err = build_source(&config).err().unwrap();
        assert!(err.missing_settings().contains(&"MS_FILE_URL".to_string()));
    }
}
