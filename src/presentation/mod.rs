//! Presentation layer mapping application replies to HTTP-shaped responses.

/// Status, header and body mapping.
pub mod http;

pub use http::HttpResponse;
