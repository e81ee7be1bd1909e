//! Remote workbook locators.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Url;

use crate::domain::entities::short_sha256;
use crate::domain::errors::SourceError;
use crate::infrastructure::config::GraphConfig;

const GRAPH_HOST: &str = "graph.microsoft.com";

/// Where the workbook lives in Microsoft 365.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLocator {
    /// `/drives/{drive}/items/{item}`.
    DriveItem { drive_id: String, item_id: String },
    /// `/sites/{site}/drive/root:/{path}`.
    SitePath { site_id: String, file_path: String },
    /// OneDrive or SharePoint sharing link.
    Share { url: String },
    /// Direct Graph `/content` URL.
    ContentUrl { url: String },
}

impl RemoteLocator {
    /// Picks the configured locator; a file URL wins over ids.
    ///
    /// # Errors
    /// Returns `SourceError::Misconfigured` when nothing usable is configured.
    pub fn from_config(graph: &GraphConfig) -> Result<Self, SourceError> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(url) = non_empty(&graph.file_url) {
            return Ok(Self::from_file_url(&url));
        }
        if let (Some(drive_id), Some(item_id)) = (non_empty(&graph.drive_id), non_empty(&graph.item_id))
        {
            return Ok(Self::DriveItem { drive_id, item_id });
        }
        if let (Some(site_id), Some(file_path)) = (non_empty(&graph.site_id), non_empty(&graph.file_path))
        {
            return Ok(Self::SitePath {
                site_id,
                file_path: file_path.trim_matches('/').to_string(),
            });
        }

        Err(SourceError::misconfigured(
            "graph file locator is missing",
            vec![
                "MS_FILE_URL".to_string(),
                "GRAPH_DRIVE_ID".to_string(),
                "GRAPH_ITEM_ID".to_string(),
            ],
        ))
    }

    /// Classifies a user-supplied file URL.
    ///
    /// Graph URLs naming a drive item are used directly; anything not on the
    /// Graph host is treated as a sharing link.
    #[must_use]
    pub fn from_file_url(raw: &str) -> Self {
        let Ok(url) = Url::parse(raw) else {
            return Self::Share {
                url: raw.to_string(),
            };
        };

        let on_graph = url
            .host_str()
            .is_some_and(|host| host.to_ascii_lowercase().contains(GRAPH_HOST));
        if !on_graph {
            return Self::Share {
                url: raw.to_string(),
            };
        }

        let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();
        let drive_item = segments.windows(4).find_map(|window| match window {
            ["drives", drive, "items", item] => Some((percent_decode(drive), percent_decode(item))),
            _ => None,
        });
        if let Some((drive_id, item_id)) = drive_item {
            return Self::DriveItem { drive_id, item_id };
        }
        if url.path().ends_with("/content") {
            return Self::ContentUrl {
                url: raw.to_string(),
            };
        }

        Self::Share {
            url: raw.to_string(),
        }
    }

    /// Stable identity locator. Sharing URLs are hashed.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::DriveItem { drive_id, item_id } => format!("graph:drives/{drive_id}/items/{item_id}"),
            Self::SitePath { site_id, file_path } => format!("graph:sites/{site_id}/root:/{file_path}"),
            Self::Share { url } => format!("graph:share:{}", short_sha256(url.as_bytes())),
            Self::ContentUrl { url } => format!("graph:url:{}", short_sha256(url.as_bytes())),
        }
    }

    /// URL of the item's metadata, `None` for direct content URLs.
    ///
    /// # Errors
    /// Returns `SourceError::Misconfigured` if `base_url` is not a usable URL.
    pub fn metadata_url(&self, base_url: &str) -> Result<Option<Url>, SourceError> {
        match self {
            Self::DriveItem { drive_id, item_id } => {
                graph_url(base_url, &["drives", drive_id, "items", item_id]).map(Some)
            }
            Self::SitePath { site_id, file_path } => {
                let mut segments = vec!["sites", site_id.as_str(), "drive", "root:"];
                segments.extend(file_path.split('/').filter(|s| !s.is_empty()));
                graph_url(base_url, &segments).map(Some)
            }
            Self::Share { url } => {
                let share = share_id(url);
                graph_url(base_url, &["shares", &share, "driveItem"]).map(Some)
            }
            Self::ContentUrl { .. } => Ok(None),
        }
    }

    /// URL of the item's content.
    ///
    /// # Errors
    /// Returns `SourceError::Misconfigured` if a URL cannot be built.
    pub fn content_url(&self, base_url: &str) -> Result<Url, SourceError> {
        match self {
            Self::DriveItem { drive_id, item_id } => {
                graph_url(base_url, &["drives", drive_id, "items", item_id, "content"])
            }
            Self::SitePath { site_id, file_path } => {
                let mut segments = vec!["sites".to_string(), site_id.clone(), "drive".to_string(), "root:".to_string()];
                segments.extend(file_path.split('/').filter(|s| !s.is_empty()).map(str::to_string));
                if let Some(last) = segments.last_mut() {
                    last.push(':');
                }
                segments.push("content".to_string());
                let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
                graph_url(base_url, &refs)
            }
            Self::Share { url } => {
                let share = share_id(url);
                graph_url(base_url, &["shares", &share, "driveItem", "content"])
            }
            Self::ContentUrl { url } => Url::parse(url)
                .map_err(|e| SourceError::misconfigured(format!("invalid MS_FILE_URL: {e}"), vec!["MS_FILE_URL".to_string()])),
        }
    }
}

/// Encodes a sharing URL as a Graph share id, `u!<base64url>`.
#[must_use]
pub fn share_id(url: &str) -> String {
    format!("u!{}", URL_SAFE_NO_PAD.encode(url.as_bytes()))
}

fn graph_url(base_url: &str, segments: &[&str]) -> Result<Url, SourceError> {
    let invalid = || {
        SourceError::misconfigured(
            format!("invalid graph base url: {base_url}"),
            vec!["GRAPH_BASE_URL".to_string()],
        )
    };
    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let Some(byte) = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
