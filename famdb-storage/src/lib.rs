//! Storage layer for FamDB partitions
//!
//! Each partition is one RocksDB directory. Column families play the role
//! of the hierarchical groups (`Families`, `Lookup`, `Taxonomy`, ...) and
//! family records are bucketed by [`accession_bin`].

pub mod backend;
pub mod keys;
pub mod locator;

pub use backend::{cf_names, NodeRecord, OpenMode, PartitionStore, StoreOptions};
pub use locator::{accession_bin, family_key};
