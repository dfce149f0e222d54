/// Shared data types for the FamDB workspace
pub mod family;
pub mod generation;
pub mod names;
pub mod taxonomy;

pub use family::{is_curated_accession, Family};
pub use generation::{Counts, DbInfo, FileMap, FileMetadata, GenerationMeta, PartitionEntry};
pub use names::{NameRecord, SCIENTIFIC_NAME};
pub use taxonomy::TaxonId;
