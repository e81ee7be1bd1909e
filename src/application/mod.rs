//! Application layer with use cases and DTOs.

/// Data transfer objects.
pub mod dto;
/// Catalog orchestration.
pub mod services;
/// Use case implementations.
pub mod use_cases;

pub use dto::{CatalogReply, CatalogRequest, MediaReply, MediaRequest, SourceHealth};
pub use services::{BuildState, CatalogOrchestrator, OrchestratorSettings};
pub use use_cases::ProbeSourceUseCase;
