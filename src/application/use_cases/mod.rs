//! Use case implementations.

mod probe_source_use_case;

pub use probe_source_use_case::ProbeSourceUseCase;
