//! Application services.

pub mod catalog_orchestrator;

pub use catalog_orchestrator::{
    BuildState, CatalogOrchestrator, OrchestratorSettings, catalog_etag, etag_matches,
};
