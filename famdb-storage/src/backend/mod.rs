//! Partition storage backends

mod config;
mod rocksdb_backend;

pub use config::StoreOptions;
pub use rocksdb_backend::{cf_names, NodeRecord, OpenMode, PartitionStore};
