//! HTTP-shaped replies for catalog, media and health requests.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::application::dto::{CatalogReply, MediaReply, SourceHealth};
use crate::application::services::etag_matches;
use crate::domain::errors::{CatalogError, ExtractError, MediaError, SourceError};

/// Seconds clients should wait before retrying an unavailable source.
pub const RETRY_AFTER_SECS: u64 = 30;

const CATALOG_CACHE_HEADER: &str = "X-Catalog-Cache";
const CATALOG_CACHE_CONTROL: &str = "no-cache";
const MEDIA_CACHE_CONTROL: &str = "public, max-age=0, must-revalidate";

/// Values of the bypass parameter that force a rebuild.
const TRUTHY: [&str; 3] = ["1", "true", "yes"];

/// Status, headers and body of one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Body, empty for 304.
    pub body: Bytes,
}

impl HttpResponse {
    fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                body: Bytes::from(body),
                ..Self::new(status)
            }
            .header("Content-Type", "application/json"),
            Err(e) => {
                error!(error = %e, "Failed to encode response body");
                Self::new(500)
            }
        }
    }

    /// First header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Reason phrase for the status code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            304 => "Not Modified",
            400 => "Bad Request",
            404 => "Not Found",
            503 => "Service Unavailable",
            _ => "Internal Server Error",
        }
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HTTP/1.1 {} {}", self.status, self.reason())?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}: {value}")?;
        }
        if self.body.is_empty() {
            return Ok(());
        }
        writeln!(f)?;
        match std::str::from_utf8(&self.body) {
            Ok(text) if self.header_value("Content-Type") == Some("application/json") => {
                write!(f, "{text}")
            }
            _ => write!(f, "<{} bytes>", self.body.len()),
        }
    }
}

/// Whether `query` asks to skip the catalog cache via `param`.
#[must_use]
pub fn is_bypass(query: &str, param: &str) -> bool {
    query
        .trim_start_matches('?')
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .any(|(key, value)| {
            key == param && TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t))
        })
}

/// Maps a catalog result.
#[must_use]
pub fn catalog_response(
    result: Result<CatalogReply, CatalogError>,
    if_none_match: Option<&str>,
) -> HttpResponse {
    let reply = match result {
        Ok(reply) => reply,
        Err(e) => return error_response(&e),
    };

    if if_none_match.is_some_and(|tag| etag_matches(tag, &reply.etag)) {
        debug!(etag = %reply.etag, "Catalog not modified");
        return HttpResponse::new(304)
            .header("ETag", reply.etag)
            .header("Cache-Control", CATALOG_CACHE_CONTROL)
            .header(CATALOG_CACHE_HEADER, reply.cache_state.as_str());
    }

    HttpResponse::json(200, reply.response.as_ref())
        .header("ETag", reply.etag)
        .header("Cache-Control", CATALOG_CACHE_CONTROL)
        .header(CATALOG_CACHE_HEADER, reply.cache_state.as_str())
}

/// Maps a media result.
#[must_use]
pub fn media_response(result: Result<MediaReply, CatalogError>) -> HttpResponse {
    match result {
        Ok(MediaReply::Content { content, etag }) => HttpResponse {
            body: content,
            ..HttpResponse::new(200)
        }
        .header("Content-Type", "image/png")
        .header("ETag", etag)
        .header("Cache-Control", MEDIA_CACHE_CONTROL),
        Ok(MediaReply::NotModified { etag }) => HttpResponse::new(304)
            .header("ETag", etag)
            .header("Cache-Control", MEDIA_CACHE_CONTROL),
        Err(e) => error_response(&e),
    }
}

/// Maps a health probe outcome.
#[must_use]
pub fn health_response(health: &SourceHealth) -> HttpResponse {
    HttpResponse::json(200, health)
}

/// Maps an error to its status code and JSON body.
#[must_use]
pub fn error_response(err: &CatalogError) -> HttpResponse {
    if err.is_not_found() {
        return HttpResponse::json(404, &json!({ "detail": "Not Found" }));
    }

    match err {
        CatalogError::Source(SourceError::Misconfigured { reason, missing }) => {
            warn!(reason = %reason, missing = ?missing, "Source misconfigured");
            HttpResponse::json(400, &json!({ "detail": reason, "missing": missing }))
        }
        CatalogError::Source(SourceError::Unavailable { message })
        | CatalogError::Extract(ExtractError::InvalidPackage { message }) => {
            warn!(error = %message, "Catalog temporarily unavailable");
            HttpResponse::json(503, &json!({ "detail": err.to_string() }))
                .header("Retry-After", RETRY_AFTER_SECS.to_string())
        }
        CatalogError::Media(MediaError::Io { .. }) | CatalogError::Internal { .. } => {
            error!(error = %err, "Catalog request failed");
            HttpResponse::json(500, &json!({ "detail": err.to_string() }))
        }
        CatalogError::Media(_) => HttpResponse::json(404, &json!({ "detail": "Not Found" })),
    }
}
