//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::domain::entities::SourceMode;
use crate::domain::errors::SourceError;
use crate::infrastructure::cache::default_media_dir;
use crate::infrastructure::cache::catalog_cache::DEFAULT_CATALOG_CAPACITY;
use crate::infrastructure::extract::DEFAULT_IGNORED_SHEET_PATTERN;

const APP_NAME: &str = "artwork-catalog";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Default Microsoft Graph API root.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
/// Default OAuth2 authority.
pub const DEFAULT_TOKEN_URL_BASE: &str = "https://login.microsoftonline.com";
/// Default client-credentials scope.
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Workbook source. Inferred from `local_xlsx_path` when unset.
    #[serde(default)]
    pub source_mode: Option<SourceMode>,

    /// Path of a local workbook.
    #[serde(default)]
    pub local_xlsx_path: Option<PathBuf>,

    /// Upper bound for a single workbook load.
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Hash the first 64 KiB of the workbook into its identity.
    #[serde(default)]
    pub identity_digest: bool,

    /// Query parameter that forces a rebuild.
    #[serde(default = "default_bypass_query_param")]
    pub bypass_query_param: String,

    /// Worksheets whose trimmed title matches are never published.
    #[serde(default = "default_ignored_sheet_pattern")]
    pub ignored_sheet_pattern: String,

    /// Microsoft Graph settings.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Microsoft Graph source configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Never written back to disk.
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub drive_id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Sharing link or Graph URL of the workbook.
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_token_url_base")]
    pub token_url_base: String,
    #[serde(default = "default_graph_scope")]
    pub scope: String,
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("drive_id", &self.drive_id)
            .field("item_id", &self.item_id)
            .field("site_id", &self.site_id)
            .field("file_path", &self.file_path)
            .field("file_url", &self.file_url.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            drive_id: None,
            item_id: None,
            site_id: None,
            file_path: None,
            file_url: None,
            base_url: default_graph_base_url(),
            token_url_base: default_token_url_base(),
            scope: default_graph_scope(),
        }
    }
}

impl GraphConfig {
    /// Missing pieces of a usable remote locator, named by their env keys.
    fn locator_gaps(&self) -> Vec<String> {
        let drive = (is_set(&self.drive_id), is_set(&self.item_id));
        let site = (is_set(&self.site_id), is_set(&self.file_path));

        let mut missing = Vec::new();
        match drive {
            (true, false) => missing.push("GRAPH_ITEM_ID".to_string()),
            (false, true) => missing.push("GRAPH_DRIVE_ID".to_string()),
            _ => {}
        }
        match site {
            (true, false) => missing.push("GRAPH_FILE_PATH".to_string()),
            (false, true) => missing.push("GRAPH_SITE_ID".to_string()),
            _ => {}
        }
        if !missing.is_empty() {
            return missing;
        }

        let has_locator =
            is_set(&self.file_url) || drive == (true, true) || site == (true, true);
        if !has_locator {
            missing.extend(["MS_FILE_URL", "GRAPH_DRIVE_ID", "GRAPH_ITEM_ID"].map(String::from));
        }
        missing
    }

    fn credential_gaps(&self) -> Vec<String> {
        [
            (&self.tenant_id, "MS_TENANT_ID"),
            (&self.client_id, "MS_CLIENT_ID"),
            (&self.client_secret, "MS_CLIENT_SECRET"),
        ]
        .into_iter()
        .filter(|(value, _)| !is_set(value))
        .map(|(_, key)| key.to_string())
        .collect()
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Catalog time-to-live in seconds; 0 disables catalog caching.
    #[serde(default = "default_catalog_ttl_secs")]
    pub catalog_ttl_secs: u64,

    /// Maximum number of cached catalogs.
    #[serde(default = "default_catalog_capacity")]
    pub catalog_capacity: usize,

    /// Media cache directory.
    #[serde(default)]
    pub media_dir: Option<PathBuf>,

    /// How long a resolved identity is reused for media requests.
    #[serde(default = "default_identity_reuse_ms")]
    pub identity_reuse_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            catalog_ttl_secs: default_catalog_ttl_secs(),
            catalog_capacity: default_catalog_capacity(),
            media_dir: None,
            identity_reuse_ms: default_identity_reuse_ms(),
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

const fn default_source_timeout_secs() -> u64 {
    30
}

fn default_bypass_query_param() -> String {
    "refresh".to_string()
}

fn default_ignored_sheet_pattern() -> String {
    DEFAULT_IGNORED_SHEET_PATTERN.to_string()
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}

fn default_token_url_base() -> String {
    DEFAULT_TOKEN_URL_BASE.to_string()
}

fn default_graph_scope() -> String {
    DEFAULT_GRAPH_SCOPE.to_string()
}

const fn default_catalog_ttl_secs() -> u64 {
    60
}

const fn default_catalog_capacity() -> usize {
    DEFAULT_CATALOG_CAPACITY
}

const fn default_identity_reuse_ms() -> u64 {
    2000
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(mode) = args.source_mode {
            self.source_mode = Some(mode);
        }
        if let Some(path) = &args.local_xlsx_path {
            self.local_xlsx_path = Some(path.clone());
        }
        if let Some(secs) = args.source_timeout_secs {
            self.source_timeout_secs = secs;
        }
        if let Some(digest) = args.identity_digest {
            self.identity_digest = digest;
        }
        if let Some(param) = &args.bypass_query_param {
            self.bypass_query_param.clone_from(param);
        }
        if let Some(pattern) = &args.ignored_sheet_pattern {
            self.ignored_sheet_pattern.clone_from(pattern);
        }

        let graph = &mut self.graph;
        for (target, value) in [
            (&mut graph.tenant_id, &args.tenant_id),
            (&mut graph.client_id, &args.client_id),
            (&mut graph.client_secret, &args.client_secret),
            (&mut graph.drive_id, &args.drive_id),
            (&mut graph.item_id, &args.item_id),
            (&mut graph.site_id, &args.site_id),
            (&mut graph.file_path, &args.file_path),
            (&mut graph.file_url, &args.file_url),
        ] {
            if value.is_some() {
                target.clone_from(value);
            }
        }
        if let Some(base_url) = &args.graph_base_url {
            graph.base_url.clone_from(base_url);
        }

        if let Some(ttl) = args.catalog_ttl_secs {
            self.cache.catalog_ttl_secs = ttl;
        }
        if let Some(dir) = &args.media_dir {
            self.cache.media_dir = Some(dir.clone());
        }
    }

    /// Source mode, inferring local when a workbook path is configured.
    #[must_use]
    pub fn effective_mode(&self) -> SourceMode {
        self.source_mode.unwrap_or(if self.local_xlsx_path.is_some() {
            SourceMode::Local
        } else {
            SourceMode::Graph
        })
    }

    /// Checks that the selected source can be built.
    ///
    /// # Errors
    /// Returns `SourceError::Misconfigured` naming every missing setting.
    pub fn validate_source(&self) -> Result<(), SourceError> {
        match self.effective_mode() {
            SourceMode::Local => {
                if self.local_xlsx_path.is_none() {
                    return Err(SourceError::misconfigured(
                        "local mode requires a workbook path",
                        vec!["LOCAL_XLSX_PATH".to_string()],
                    ));
                }
                Ok(())
            }
            SourceMode::Graph => {
                let locator_gaps = self.graph.locator_gaps();
                if !locator_gaps.is_empty() {
                    return Err(SourceError::misconfigured(
                        "graph mode requires a complete file locator",
                        locator_gaps,
                    ));
                }
                let credential_gaps = self.graph.credential_gaps();
                if !credential_gaps.is_empty() {
                    return Err(SourceError::misconfigured(
                        "graph mode requires client credentials",
                        credential_gaps,
                    ));
                }
                Ok(())
            }
        }
    }

    /// Source load timeout.
    #[must_use]
    pub const fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    /// Catalog cache time-to-live.
    #[must_use]
    pub const fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.catalog_ttl_secs)
    }

    /// Identity reuse window for media requests.
    #[must_use]
    pub const fn identity_reuse(&self) -> Duration {
        Duration::from_millis(self.cache.identity_reuse_ms)
    }

    /// Returns the effective media cache directory.
    #[must_use]
    pub fn effective_media_dir(&self) -> PathBuf {
        self.cache.media_dir.clone().unwrap_or_else(default_media_dir)
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("artwork-catalog.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            source_mode: None,
            local_xlsx_path: None,
            source_timeout_secs: default_source_timeout_secs(),
            identity_digest: false,
            bypass_query_param: default_bypass_query_param(),
            ignored_sheet_pattern: default_ignored_sheet_pattern(),
            graph: GraphConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}
