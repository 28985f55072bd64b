//! Helpers for tests: environment set-up and an in-memory host backend.
mod memory_backend;
mod prepare_env;

pub use memory_backend::{ExportBehaviour, MemoryBackend, MemoryState};
pub use prepare_env::{prepare_test_env, sample_order, status_xml, OperationXml};
