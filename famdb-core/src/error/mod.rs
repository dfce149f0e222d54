//! Core error types for FamDB

use thiserror::Error;

use crate::types::TaxonId;

/// Main error type for FamDB operations
#[derive(Error, Debug)]
pub enum FamDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("File format version is {found:?}, but this is version {expected}")]
    FormatVersion {
        found: Option<String>,
        expected: String,
    },

    #[error("A partitioned famdb database is not present in {0}")]
    MissingRootPartition(String),

    #[error("Multiple famdb root partitions were found: {}", .0.join(", "))]
    MultipleDatabases(Vec<String>),

    #[error("Partition {0} is present more than once")]
    DuplicatePartition(u32),

    #[error("Files from different partitioning runs: {0:?}")]
    GenerationMismatch(Vec<u32>),

    #[error("Family is not unique! Already seen {accession}{}", .name.as_ref().map(|n| format!(" ({})", n)).unwrap_or_default())]
    DuplicateFamily {
        accession: String,
        name: Option<String>,
    },

    #[error("Taxon {0} not found")]
    TaxonNotFound(TaxonId),

    #[error("Partition {0} is not installed")]
    PartitionUnavailable(u32),

    #[error("Lineage error: {0}")]
    LineageCombine(String),

    #[error("Partition is open read-only")]
    ReadOnly,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for FamDB operations
pub type FamDbResult<T> = Result<T, FamDbError>;

impl FamDbError {
    /// True for errors that reject a single record rather than the whole operation
    pub fn is_per_record(&self) -> bool {
        matches!(self, FamDbError::DuplicateFamily { .. })
    }
}

// Conversion implementations for common error types
impl From<serde_json::Error> for FamDbError {
    fn from(err: serde_json::Error) -> Self {
        FamDbError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FamDbError {
    fn from(err: anyhow::Error) -> Self {
        FamDbError::Other(err.to_string())
    }
}
