//! Test utilities for the FamDB workspace
//!
//! A small multi-partition taxonomy with matching families, and a
//! tempdir-backed environment that builds a complete generation from them.
//! Intended for integration tests in `tests/` directories.

pub mod environment;
pub mod fixtures;

pub use environment::TestEnvironment;
pub use fixtures::{sample_families, sample_file_map, sample_taxonomy, PREFIX};

pub use anyhow::{Context, Result};
pub use tempfile;

/// Install a quiet tracing subscriber; safe to call from every test
pub fn init_test_logging() {
    let _ = famdb_core::init_logging(&famdb_core::LoggingConfig::default());
}
