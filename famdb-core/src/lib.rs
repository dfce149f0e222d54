//! Core utilities and types shared across all FamDB crates

pub mod config;
pub mod error;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, save_config, Config, DatabaseConfig, LoggingConfig, StorageConfig};
pub use error::{FamDbError, FamDbResult};

// Re-export core types
pub use types::{
    is_curated_accession, Counts, DbInfo, Family, FileMap, FileMetadata, GenerationMeta,
    NameRecord, PartitionEntry, TaxonId, SCIENTIFIC_NAME,
};

// Re-export system utilities
pub use system::{check_format_version, init_logging, FILE_VERSION, GENERATOR_VERSION};

/// Version information for the FamDB project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
