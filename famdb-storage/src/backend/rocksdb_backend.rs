/// RocksDB container for one FamDB partition
///
/// Every partition of a database is its own RocksDB directory. Column
/// families stand in for the top-level groups of the partition layout; keys
/// within them are the group paths from [`crate::keys`].
use famdb_core::{FamDbError, FamDbResult, Family};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, WriteBatch,
    WriteOptions,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::config::StoreOptions;
use crate::keys;
use crate::locator::{accession_from_key, family_key};

/// Column family names for the partition groups
pub mod cf_names {
    pub const ATTRIBUTES: &str = "attributes";
    pub const FAMILIES: &str = "families";
    pub const TAXONOMY: &str = "taxonomy";
    pub const LINKS: &str = "links";
    pub const NAMES: &str = "names";

    pub const ALL: [&str; 5] = [ATTRIBUTES, FAMILIES, TAXONOMY, LINKS, NAMES];
}

/// How a partition is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a new partition; the directory must not exist yet
    Create,
    /// Open an existing partition for appending
    Append,
    /// Open read-only, without taking the RocksDB lock
    Read,
}

impl OpenMode {
    pub fn is_writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// One taxonomy node as written by the bulk taxonomy writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: u32,
    pub parent: Option<u32>,
    pub children: Vec<u32>,
}

/// Storage for a single partition
pub struct PartitionStore {
    db: DBWithThreadMode<MultiThreaded>,
    path: PathBuf,
    mode: OpenMode,
    write_opts: WriteOptions,
}

fn storage_err<C: Display>(context: C) -> impl FnOnce(rocksdb::Error) -> FamDbError {
    move |e| FamDbError::Storage(format!("{}: {}", context, e))
}

impl PartitionStore {
    /// Open or create the partition at `path`
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, options: &StoreOptions) -> FamDbResult<Self> {
        let path = path.as_ref().to_path_buf();

        match mode {
            OpenMode::Create if path.exists() => {
                return Err(FamDbError::InvalidInput(format!(
                    "Refusing to create partition over existing path {}",
                    path.display()
                )));
            }
            OpenMode::Append | OpenMode::Read if !path.is_dir() => {
                return Err(FamDbError::NotFound(format!("partition {}", path.display())));
            }
            _ => {}
        }

        let cache = options.block_cache();
        let descriptors: Vec<ColumnFamilyDescriptor> = cf_names::ALL
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, options.cf_options(name, &cache)))
            .collect();
        let db_opts = options.db_options(mode == OpenMode::Create);

        let opened = match mode {
            // Read-only opens take no LOCK file, so any number of readers may share a partition
            OpenMode::Read => DBWithThreadMode::<MultiThreaded>::open_cf_descriptors_read_only(
                &db_opts,
                &path,
                descriptors,
                false,
            ),
            OpenMode::Create | OpenMode::Append => {
                DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&db_opts, &path, descriptors)
            }
        };

        let db = opened.map_err(|e| {
            error!("Failed to open partition at {}: {}", path.display(), e);
            FamDbError::Storage(format!("Failed to open {}: {}", path.display(), e))
        })?;

        debug!("Opened partition {} ({:?})", path.display(), mode);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);

        Ok(Self {
            db,
            path,
            mode,
            write_opts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    fn ensure_writable(&self) -> FamDbResult<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(FamDbError::ReadOnly)
        }
    }

    fn cf_handle(&self, name: &str) -> FamDbResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| FamDbError::Storage(format!("Column family '{}' not found", name)))
    }

    fn get_raw(&self, cf_name: &str, key: &str) -> FamDbResult<Option<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(storage_err(format!("Failed to read {}", key)))
    }

    fn put_raw(&self, cf_name: &str, key: &str, value: &[u8]) -> FamDbResult<()> {
        self.ensure_writable()?;
        let cf = self.cf_handle(cf_name)?;
        self.db
            .put_cf_opt(&cf, key.as_bytes(), value, &self.write_opts)
            .map_err(storage_err(format!("Failed to write {}", key)))
    }

    fn contains(&self, cf_name: &str, key: &str) -> FamDbResult<bool> {
        Ok(self.get_raw(cf_name, key)?.is_some())
    }

    /// All `(key, value)` pairs whose key starts with `prefix`
    fn scan_prefix(&self, cf_name: &str, prefix: &str) -> FamDbResult<Vec<(String, Vec<u8>)>> {
        let cf = self.cf_handle(cf_name)?;
        let mut results = Vec::new();

        for item in self.db.prefix_iterator_cf(&cf, prefix.as_bytes()) {
            let (key, value) = item.map_err(storage_err(format!("Failed to scan {}", prefix)))?;
            if !key.starts_with(prefix.as_bytes()) {
                break; // Reached end of prefix range
            }
            match String::from_utf8(key.to_vec()) {
                Ok(key) => results.push((key, value.to_vec())),
                Err(_) => warn!(
                    "Skipping non UTF-8 key under {} in {}",
                    prefix,
                    self.path.display()
                ),
            }
        }

        Ok(results)
    }

    // Attributes

    pub fn get_attr<T: DeserializeOwned>(&self, name: &str) -> FamDbResult<Option<T>> {
        match self.get_raw(cf_names::ATTRIBUTES, name)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_attr<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> FamDbResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put_raw(cf_names::ATTRIBUTES, name, &bytes)
    }

    pub fn has_attr(&self, name: &str) -> FamDbResult<bool> {
        self.contains(cf_names::ATTRIBUTES, name)
    }

    // Families

    pub fn put_family(&self, family: &Family) -> FamDbResult<()> {
        let bytes = rmp_serde::to_vec_named(family)
            .map_err(|e| FamDbError::Serialization(format!("{}: {}", family.accession, e)))?;
        self.put_raw(cf_names::FAMILIES, &family_key(&family.accession), &bytes)
    }

    pub fn get_family(&self, accession: &str) -> FamDbResult<Option<Family>> {
        match self.get_raw(cf_names::FAMILIES, &family_key(accession))? {
            Some(bytes) => rmp_serde::from_slice(&bytes)
                .map(Some)
                .map_err(|e| FamDbError::Serialization(format!("{}: {}", accession, e))),
            None => Ok(None),
        }
    }

    /// Store an already encoded family record
    pub fn put_family_bytes(&self, accession: &str, bytes: &[u8]) -> FamDbResult<()> {
        self.put_raw(cf_names::FAMILIES, &family_key(accession), bytes)
    }

    pub fn has_family(&self, accession: &str) -> FamDbResult<bool> {
        self.contains(cf_names::FAMILIES, &family_key(accession))
    }

    /// Accessions of every stored family
    pub fn family_accessions(&self) -> FamDbResult<Vec<String>> {
        self.family_accessions_under(keys::GROUP_FAMILIES)
    }

    /// Accessions stored below one bucket group, e.g. `Families/DF`
    pub fn family_accessions_under(&self, group: &str) -> FamDbResult<Vec<String>> {
        let prefix = format!("{}/", group.trim_end_matches('/'));
        let cf = self.cf_handle(cf_names::FAMILIES)?;
        let mut accessions = Vec::new();

        for item in self.db.prefix_iterator_cf(&cf, prefix.as_bytes()) {
            let (key, _) = item.map_err(storage_err("Failed to scan families"))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            match std::str::from_utf8(&key).ok().and_then(accession_from_key) {
                Some(acc) => accessions.push(acc.to_string()),
                None => warn!(
                    "Skipping malformed family key {:?} in {}",
                    String::from_utf8_lossy(&key),
                    self.path.display()
                ),
            }
        }

        Ok(accessions)
    }

    // Links

    pub fn put_link(&self, key: &str, accession: &str) -> FamDbResult<()> {
        self.put_raw(cf_names::LINKS, key, accession.as_bytes())
    }

    pub fn get_link(&self, key: &str) -> FamDbResult<Option<String>> {
        match self.get_raw(cf_names::LINKS, key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| FamDbError::Serialization(format!("link {}: {}", key, e))),
            None => Ok(None),
        }
    }

    pub fn has_link(&self, key: &str) -> FamDbResult<bool> {
        self.contains(cf_names::LINKS, key)
    }

    /// Link targets below `prefix`, as `(key suffix, target accession)`
    pub fn scan_links(&self, prefix: &str) -> FamDbResult<Vec<(String, String)>> {
        let mut links = Vec::new();
        for (key, value) in self.scan_prefix(cf_names::LINKS, prefix)? {
            match String::from_utf8(value) {
                Ok(target) => links.push((key[prefix.len()..].to_string(), target)),
                Err(_) => warn!("Skipping malformed link {} in {}", key, self.path.display()),
            }
        }
        Ok(links)
    }

    // Taxonomy

    /// Write taxonomy nodes and the child to parent index in one batch
    pub fn write_nodes<'a, I>(&self, nodes: I) -> FamDbResult<usize>
    where
        I: IntoIterator<Item = &'a NodeRecord>,
    {
        self.ensure_writable()?;
        let cf = self.cf_handle(cf_names::TAXONOMY)?;
        let mut batch = WriteBatch::default();
        let mut count = 0;

        for node in nodes {
            let children = bincode::serialize(&node.children)
                .map_err(|e| FamDbError::Serialization(e.to_string()))?;
            batch.put_cf(&cf, keys::node_children(node.id), children);

            if let Some(parent) = node.parent {
                let parent = bincode::serialize(&parent)
                    .map_err(|e| FamDbError::Serialization(e.to_string()))?;
                batch.put_cf(&cf, keys::node_parent(node.id), &parent);
            }

            let own_id = bincode::serialize(&node.id)
                .map_err(|e| FamDbError::Serialization(e.to_string()))?;
            for child in &node.children {
                batch.put_cf(&cf, keys::parent_index(*child), &own_id);
            }
            count += 1;
        }

        self.db
            .write_opt(batch, &self.write_opts)
            .map_err(storage_err("Failed to write taxonomy nodes"))?;
        Ok(count)
    }

    pub fn has_node(&self, taxon: u32) -> FamDbResult<bool> {
        self.contains(cf_names::TAXONOMY, &keys::node_children(taxon))
    }

    /// Children of a local node, `None` if the node is not stored here
    pub fn children(&self, taxon: u32) -> FamDbResult<Option<Vec<u32>>> {
        self.get_bincode(&keys::node_children(taxon))
    }

    pub fn parent(&self, taxon: u32) -> FamDbResult<Option<u32>> {
        self.get_bincode(&keys::node_parent(taxon))
    }

    /// Parent of `child` according to the parent index, whether or not the
    /// child itself is stored in this partition
    pub fn indexed_parent(&self, child: u32) -> FamDbResult<Option<u32>> {
        self.get_bincode(&keys::parent_index(child))
    }

    fn get_bincode<T: DeserializeOwned>(&self, key: &str) -> FamDbResult<Option<T>> {
        match self.get_raw(cf_names::TAXONOMY, key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| FamDbError::Serialization(format!("{}: {}", key, e))),
            None => Ok(None),
        }
    }

    // Taxon names

    pub fn put_names_blob(&self, partition: u32, json: &str) -> FamDbResult<()> {
        self.put_raw(cf_names::NAMES, &keys::taxa_names(partition), json.as_bytes())
    }

    /// Every stored names blob, keyed by the partition it describes
    pub fn names_blobs(&self) -> FamDbResult<Vec<(u32, String)>> {
        let prefix = format!("{}/", keys::GROUP_TAXANAMES);
        let mut blobs = Vec::new();

        for (key, value) in self.scan_prefix(cf_names::NAMES, &prefix)? {
            let partition = match keys::parse_taxa_names(&key) {
                Some(p) => p,
                None => {
                    warn!("Skipping unexpected names key {} in {}", key, self.path.display());
                    continue;
                }
            };
            match String::from_utf8(value) {
                Ok(json) => blobs.push((partition, json)),
                Err(_) => warn!("Skipping non UTF-8 names blob for partition {}", partition),
            }
        }

        Ok(blobs)
    }

    /// Flush memtables of every column family to disk
    pub fn flush(&self) -> FamDbResult<()> {
        if !self.mode.is_writable() {
            return Ok(());
        }
        for name in cf_names::ALL {
            let cf = self.cf_handle(name)?;
            self.db
                .flush_cf(&cf)
                .map_err(storage_err(format!("Failed to flush {}", name)))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PartitionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionStore")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}
