//! FamDB: a family database split across taxonomy-aligned partition files
//!
//! A generation is a root partition (`<prefix>.0.famdb`) holding the top of
//! the taxonomy and every taxon's names, plus leaf partitions holding
//! subtrees. [`Database`] opens them together and answers lineage, name and
//! family queries across partition boundaries.

pub mod database;
pub mod lineage;
pub mod names;
pub mod partition;
pub mod taxonomy;

pub use database::{
    AccessionStream, AppendReport, Database, DatabaseCounts, FamilyQuery, NamesEntry,
    PartitionSummary, QueryPlan,
};
pub use lineage::{Lineage, LineageNode, LineageOptions, LineageTotals};
pub use names::{sanitize_name, soundex, NameIndex, Resolution, SpeciesSearch, TaxonMatch};
pub use partition::{Partition, RootPartition};
pub use taxonomy::{TaxonIndex, TaxonomyDump};

pub use famdb_core::{
    Config, Counts, DbInfo, FamDbError, FamDbResult, Family, FileMap, FileMetadata, NameRecord,
    PartitionEntry, TaxonId,
};
pub use famdb_storage::{OpenMode, StoreOptions};
