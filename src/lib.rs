//! Artwork Catalog - serves the images embedded in a spreadsheet workbook.
//!
//! This crate resolves a cheap fingerprint of the workbook, rebuilds the image
//! catalog only when that fingerprint changes, and keeps a disk media cache in
//! step with the catalog it last built.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the orchestrator, use cases, and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer mapping replies to HTTP-shaped responses.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "artwork-catalog";
