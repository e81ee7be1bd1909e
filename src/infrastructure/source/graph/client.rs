//! Microsoft Graph workbook source.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode, Url, header};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::dto::{DriveItemResponse, GraphErrorResponse, TokenErrorResponse, TokenResponse};
use super::locator::RemoteLocator;
use crate::domain::entities::{DIGEST_PREFIX_BYTES, SourceMode, WorkbookIdentity, prefix_digest};
use crate::domain::errors::SourceError;
use crate::domain::ports::{AbortSignal, IdentityResolverPort, SourceLoaderPort, WorkbookSource};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::source::{redact, with_deadline};

const USER_AGENT: &str = concat!("artwork-catalog/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const METADATA_SELECT: &str = "id,size,lastModifiedDateTime";

/// Everything needed to reach the workbook through Graph.
#[allow(missing_docs)]
pub struct GraphSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    pub base_url: String,
    pub token_url_base: String,
    pub scope: String,
    pub locator: RemoteLocator,
    /// Bound on each identity probe and download.
    pub timeout: Duration,
    /// Always hash the content prefix into the identity.
    pub identity_digest: bool,
}

impl GraphSettings {
    /// Extracts Graph settings from the application config.
    ///
    /// # Errors
    /// Returns `SourceError::Misconfigured` naming every missing setting.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        config.validate_source()?;
        let graph = &config.graph;

        let required = |value: &Option<String>, key: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    SourceError::misconfigured("graph mode requires client credentials", vec![key.to_string()])
                })
        };

        Ok(Self {
            tenant_id: required(&graph.tenant_id, "MS_TENANT_ID")?,
            client_id: required(&graph.client_id, "MS_CLIENT_ID")?,
            client_secret: Zeroizing::new(required(&graph.client_secret, "MS_CLIENT_SECRET")?),
            base_url: graph.base_url.trim_end_matches('/').to_string(),
            token_url_base: graph.token_url_base.trim_end_matches('/').to_string(),
            scope: graph.scope.clone(),
            locator: RemoteLocator::from_config(graph)?,
            timeout: config.source_timeout(),
            identity_digest: config.identity_digest,
        })
    }
}

impl std::fmt::Debug for GraphSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphSettings")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("locator", &self.locator.describe())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

struct CachedToken {
    value: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > TimeDelta::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

/// Workbook stored in OneDrive or SharePoint.
pub struct GraphWorkbookSource {
    client: Client,
    settings: GraphSettings,
    token: Mutex<Option<CachedToken>>,
    refresh: tokio::sync::Mutex<()>,
}

impl GraphWorkbookSource {
    /// Creates a source for `settings`.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(settings: GraphSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings,
            token: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        })
    }

    fn cached_token(&self) -> Option<Zeroizing<String>> {
        let now = Utc::now();
        self.token
            .lock()
            .as_ref()
            .filter(|token| token.is_fresh(now))
            .map(|token| token.value.clone())
    }

    async fn access_token(&self) -> Result<Zeroizing<String>, SourceError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *self.token.lock() = Some(token);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, SourceError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.token_url_base, self.settings.tenant_id
        );

        debug!(tenant = %self.settings.tenant_id, "Requesting Graph access token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("scope", self.settings.scope.as_str()),
        ];
        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<TokenErrorResponse>().await {
                Ok(error) => error.error_description.unwrap_or(error.error),
                Err(_) => format!("HTTP {status}"),
            };
            warn!(status = %status, "Graph token request rejected");
            return Err(SourceError::unavailable(
                self.redact(&format!("token request failed: {status} - {detail}")),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SourceError::unavailable(format!("failed to parse token response: {e}"))
        })?;

        debug!(expires_in = token.expires_in, "Graph access token acquired");

        Ok(CachedToken {
            value: Zeroizing::new(token.access_token),
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> SourceError {
        warn!(error = %self.redact(&e.to_string()), "Failed to reach Microsoft Graph");
        if e.is_timeout() {
            SourceError::unavailable("request timed out")
        } else if e.is_connect() {
            SourceError::unavailable("failed to connect to Microsoft Graph")
        } else {
            SourceError::unavailable(self.redact(&e.to_string()))
        }
    }

    async fn handle_error_response(&self, status: StatusCode, response: Response) -> SourceError {
        let error_message = match response.json::<GraphErrorResponse>().await {
            Ok(error) => format!("{}: {}", error.error.code, error.error.message),
            Err(_) => format!("HTTP {status}"),
        };

        let message = match status {
            StatusCode::UNAUTHORIZED => {
                self.token.lock().take();
                "Graph rejected the access token".to_string()
            }
            StatusCode::FORBIDDEN => format!("access denied: {error_message}"),
            StatusCode::NOT_FOUND => format!("workbook not found: {error_message}"),
            StatusCode::TOO_MANY_REQUESTS => "Graph throttled the request".to_string(),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                "Microsoft Graph is temporarily unavailable".to_string()
            }
            _ => format!("unexpected response: {status} - {error_message}"),
        };
        SourceError::unavailable(self.redact(&message))
    }

    async fn get(&self, url: Url, range: Option<&str>) -> Result<Response, SourceError> {
        let token = self.access_token().await?;
        let mut request = self.client.get(url).bearer_auth(token.as_str());
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        let response = request.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.handle_error_response(status, response).await);
        }
        Ok(response)
    }

    async fn probe_metadata(&self) -> Result<Option<DriveItemResponse>, SourceError> {
        let Some(mut url) = self.settings.locator.metadata_url(&self.settings.base_url)? else {
            return Ok(None);
        };
        url.query_pairs_mut().append_pair("$select", METADATA_SELECT);

        let item = self.get(url, None).await?.json().await.map_err(|e| {
            SourceError::unavailable(format!("failed to parse drive item: {e}"))
        })?;
        Ok(Some(item))
    }

    /// Fetches up to the first 64 KiB and the total size, when the server reports it.
    async fn fetch_prefix(&self) -> Result<(Vec<u8>, Option<u64>), SourceError> {
        let url = self.settings.locator.content_url(&self.settings.base_url)?;
        let range = format!("bytes=0-{}", DIGEST_PREFIX_BYTES - 1);
        let mut response = self.get(url, Some(&range)).await?;

        let total = if response.status() == StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(header::CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total)
        } else {
            response.content_length()
        };

        let mut prefix = Vec::with_capacity(DIGEST_PREFIX_BYTES);
        while prefix.len() < DIGEST_PREFIX_BYTES {
            match response.chunk().await.map_err(|e| self.transport_error(&e))? {
                Some(chunk) => prefix.extend_from_slice(&chunk),
                None => break,
            }
        }
        prefix.truncate(DIGEST_PREFIX_BYTES);
        Ok((prefix, total))
    }
}

/// Total length from a `Content-Range` value such as `bytes 0-99/1234`.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl IdentityResolverPort for GraphWorkbookSource {
    async fn resolve_identity(&self) -> Result<WorkbookIdentity, SourceError> {
        with_deadline(self.settings.timeout, &AbortSignal::never(), async {
            let locator = self.settings.locator.describe();
            let item = self.probe_metadata().await?;
            let size = item.as_ref().and_then(|i| i.size);
            let modified_ns = item.as_ref().and_then(DriveItemResponse::modified_ns);

            if !self.settings.identity_digest && size.is_some() && modified_ns.is_some() {
                return Ok(WorkbookIdentity::new(locator, modified_ns, size));
            }

            debug!(locator = %locator, "Hashing workbook prefix for identity");
            let (prefix, total) = self.fetch_prefix().await?;
            Ok(WorkbookIdentity::new(locator, modified_ns, size.or(total))
                .with_digest(prefix_digest(&prefix)))
        })
        .await
    }
}

#[async_trait]
impl SourceLoaderPort for GraphWorkbookSource {
    async fn load(&self, abort: &AbortSignal) -> Result<Bytes, SourceError> {
        with_deadline(self.settings.timeout, abort, async {
            let url = self.settings.locator.content_url(&self.settings.base_url)?;
            debug!(locator = %self.settings.locator.describe(), "Downloading workbook");

            let bytes = self
                .get(url, None)
                .await?
                .bytes()
                .await
                .map_err(|e| self.transport_error(&e))?;

            info!(bytes = bytes.len(), "Workbook downloaded from Microsoft Graph");
            Ok(bytes)
        })
        .await
    }
}

impl WorkbookSource for GraphWorkbookSource {
    fn mode(&self) -> SourceMode {
        SourceMode::Graph
    }

    fn redact(&self, message: &str) -> String {
        let token = self.token.lock().as_ref().map(|t| t.value.clone());
        let mut secrets = vec![self.settings.client_secret.as_str()];
        if let Some(token) = &token {
            secrets.push(token.as_str());
        }
        redact(message, &secrets)
    }
}
