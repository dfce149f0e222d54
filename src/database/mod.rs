//! The database coordinator: every partition of one generation behind one handle

pub mod filter;
pub mod query;

use famdb_core::{
    Config, Counts, DbInfo, FamDbError, FamDbResult, Family, FileMap, FileMetadata, NameRecord,
    TaxonId, SCIENTIFIC_NAME,
};
use famdb_storage::{OpenMode, StoreOptions};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::lineage::{Lineage, LineageNode, LineageOptions, LineageTotals};
use crate::names::{Resolution, SpeciesSearch};
use crate::partition::{Partition, RootPartition};
use crate::taxonomy::TaxonomyDump;

pub use filter::{FamilyQuery, STAGE_ALL, STAGE_SEARCH_UNION};
pub use query::{AccessionStream, QueryPlan};

/// Totals over the open partitions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseCounts {
    pub consensus: u64,
    pub hmm: u64,
    /// Number of partition files open
    pub files: usize,
}

/// One partition as listed in the file map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub number: u32,
    pub name: String,
    pub detail: String,
    pub filename: String,
    pub present: bool,
    /// Stored counts, `None` when the partition is not installed
    pub counts: Option<Counts>,
}

/// Names of one taxon matched by [`Database::resolve_names`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamesEntry {
    pub taxon_id: TaxonId,
    pub partition: u32,
    /// True if the owning partition is installed
    pub present: bool,
    pub names: Vec<NameRecord>,
}

/// Outcome of [`Database::append_families`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppendReport {
    pub total: usize,
    pub added: usize,
    /// Accessions rejected because they or their names already exist
    pub duplicates: Vec<String>,
    /// Accessions whose clades are in no open partition
    pub unplaced: Vec<String>,
}

/// All open partitions of one FamDB generation
pub struct Database {
    db_dir: PathBuf,
    prefix: String,
    mode: OpenMode,
    config: Config,
    root: RootPartition,
    leaves: BTreeMap<u32, Partition>,
    file_map: FileMap,
    lineage_cache: Mutex<HashMap<TaxonId, Vec<String>>>,
}

fn partition_path(dir: &Path, prefix: &str, number: u32, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}.{}", prefix, number, extension))
}

/// Find the partition files in `dir`: the single prefix owning a root
/// partition, and its files by partition number
fn discover(dir: &Path, extension: &str) -> FamDbResult<(String, BTreeMap<u32, PathBuf>)> {
    let pattern = Regex::new(&format!(r"^(.+)\.(\d+)\.{}$", regex::escape(extension)))
        .map_err(|e| FamDbError::Configuration(format!("Invalid file extension {:?}: {}", extension, e)))?;

    let mut found: BTreeMap<String, BTreeMap<u32, PathBuf>> = BTreeMap::new();
    let mut repeated: BTreeMap<String, u32> = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = pattern.captures(name) else {
            continue;
        };

        let number: u32 = match caps[2].parse() {
            Ok(n) => n,
            Err(_) => {
                warn!("Ignoring {}: partition number out of range", name);
                continue;
            }
        };

        let files = found.entry(caps[1].to_string()).or_default();
        if files.insert(number, entry.path()).is_some() {
            repeated.entry(caps[1].to_string()).or_insert(number);
        }
    }

    let mut roots: Vec<String> = found
        .iter()
        .filter(|(_, files)| files.contains_key(&0))
        .map(|(prefix, _)| prefix.clone())
        .collect();

    match roots.len() {
        0 => {
            error!("No root partition found in {}", dir.display());
            Err(FamDbError::MissingRootPartition(dir.display().to_string()))
        }
        1 => {
            let prefix = roots.remove(0);
            if let Some(number) = repeated.get(&prefix) {
                error!("Partition {} is present more than once in {}", number, dir.display());
                return Err(FamDbError::DuplicatePartition(*number));
            }
            let files = found.remove(&prefix).unwrap_or_default();
            Ok((prefix, files))
        }
        _ => {
            error!("Multiple root partitions found in {}", dir.display());
            Err(FamDbError::MultipleDatabases(roots))
        }
    }
}

impl Database {
    /// Open the generation in `dir` with default configuration
    pub fn open<P: AsRef<Path>>(dir: P, mode: OpenMode) -> FamDbResult<Self> {
        Self::open_with_config(dir, mode, &Config::default())
    }

    /// Open the generation in the configured directory (`FAMDB_DIR` first)
    pub fn open_from_config(config: &Config, mode: OpenMode) -> FamDbResult<Self> {
        let dir = config.database.resolve_db_dir().ok_or_else(|| {
            FamDbError::Configuration(
                "No database directory: set FAMDB_DIR or database.db_dir".to_string(),
            )
        })?;
        Self::open_with_config(dir, mode, config)
    }

    pub fn open_with_config<P: AsRef<Path>>(dir: P, mode: OpenMode, config: &Config) -> FamDbResult<Self> {
        if mode == OpenMode::Create {
            return Err(FamDbError::InvalidInput(
                "Use Database::create to create a new database".to_string(),
            ));
        }

        let start = Instant::now();
        let dir = dir.as_ref();
        let (prefix, files) = discover(dir, &config.database.file_extension)?;
        let options = StoreOptions::from(&config.storage);

        let root_path = files
            .get(&0)
            .ok_or_else(|| FamDbError::MissingRootPartition(dir.display().to_string()))?;
        let root = RootPartition::open(root_path, mode, &options, config.database.phonetic_fallback)?;
        let file_map = root.get_file_info()?.ok_or_else(|| {
            error!("Root partition {} has no file map", root_path.display());
            FamDbError::Storage(format!("{} has no file map", root_path.display()))
        })?;

        let mut leaves = BTreeMap::new();
        let mut mismatched = Vec::new();
        for (number, path) in files.range(1..) {
            let partition = Partition::open(path, mode, &options)?;
            if partition.number() != *number {
                error!(
                    "{} is named as partition {} but stores partition {}",
                    path.display(),
                    number,
                    partition.number()
                );
                return Err(FamDbError::InvalidInput(format!(
                    "{} does not hold partition {}",
                    path.display(),
                    number
                )));
            }

            let meta = partition.get_file_info()?.map(|map| map.meta);
            if meta.as_ref() != Some(&file_map.meta) {
                mismatched.push(*number);
            }
            leaves.insert(*number, partition);
        }

        if !mismatched.is_empty() {
            error!(
                "Partitions {:?} were not generated with root partition {}",
                mismatched,
                root_path.display()
            );
            return Err(FamDbError::GenerationMismatch(mismatched));
        }

        for number in file_map.partition_numbers() {
            if number != 0 && !leaves.contains_key(&number) {
                warn!("Partition {} is not installed", number);
            }
        }

        info!(
            "Opened {} with {} of {} partitions in {:.3}s",
            dir.display(),
            leaves.len() + 1,
            file_map.file_map.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            db_dir: dir.to_path_buf(),
            prefix,
            mode,
            config: config.clone(),
            root,
            leaves,
            file_map,
            lineage_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Create every partition listed in `file_map` under a fresh generation id
    pub fn create<P: AsRef<Path>>(dir: P, prefix: &str, file_map: FileMap, config: &Config) -> FamDbResult<Self> {
        let dir = dir.as_ref();
        if !file_map.file_map.contains_key(&0) {
            return Err(FamDbError::InvalidInput(
                "File map has no root partition".to_string(),
            ));
        }
        fs::create_dir_all(dir)?;

        let extension = config.database.file_extension.as_str();
        let options = StoreOptions::from(&config.storage);

        let mut file_map = file_map;
        file_map.meta.partition_id = Uuid::new_v4().to_string();
        for (number, entry) in file_map.file_map.iter_mut() {
            if entry.filename.is_empty() {
                entry.filename = format!("{}.{}.{}", prefix, number, extension);
            }
        }

        let root = RootPartition::create(
            partition_path(dir, prefix, 0, extension),
            &options,
            config.database.phonetic_fallback,
        )?;
        root.set_file_info(&file_map)?;

        let mut leaves = BTreeMap::new();
        for number in file_map.partition_numbers().filter(|n| *n != 0) {
            let partition = Partition::create(partition_path(dir, prefix, number, extension), number, &options)?;
            partition.set_file_info(&file_map)?;
            leaves.insert(number, partition);
        }

        info!(
            "Created {} partitions in {} (generation {})",
            leaves.len() + 1,
            dir.display(),
            file_map.meta.partition_id
        );

        Ok(Self {
            db_dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            mode: OpenMode::Create,
            config: config.clone(),
            root,
            leaves,
            file_map,
            lineage_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Write node tables to every open partition and names to the root
    pub fn write_taxonomy(&mut self, dump: &TaxonomyDump) -> FamDbResult<()> {
        let nodes = self.file_map.partition_nodes();

        for (number, ids) in &nodes {
            match self.partition(*number) {
                Some(partition) => {
                    partition.write_taxonomy(dump, ids)?;
                }
                None => warn!("Partition {} is not open, skipping its taxonomy", number),
            }
        }

        self.root.write_taxa_names(dump, &nodes)
    }

    // Partition access

    pub fn dir(&self) -> &Path {
        &self.db_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn file_map(&self) -> &FileMap {
        &self.file_map
    }

    pub fn root(&self) -> &RootPartition {
        &self.root
    }

    /// Every open partition, root first
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> + '_ {
        std::iter::once(&*self.root).chain(self.leaves.values())
    }

    pub fn partition(&self, number: u32) -> Option<&Partition> {
        if number == 0 {
            Some(&*self.root)
        } else {
            self.leaves.get(&number)
        }
    }

    fn partition_mut(&mut self, number: u32) -> Option<&mut Partition> {
        if number == 0 {
            Some(&mut *self.root)
        } else {
            self.leaves.get_mut(&number)
        }
    }

    pub fn is_open(&self, number: u32) -> bool {
        number == 0 || self.leaves.contains_key(&number)
    }

    // Aggregates

    pub fn counts(&self) -> FamDbResult<DatabaseCounts> {
        let mut total = Counts::default();
        let mut files = 0;
        for partition in self.partitions() {
            total += partition.get_counts()?;
            files += 1;
        }
        Ok(DatabaseCounts {
            consensus: total.consensus,
            hmm: total.hmm,
            files,
        })
    }

    pub fn db_info(&self) -> FamDbResult<Option<DbInfo>> {
        self.root.get_db_info()
    }

    /// Store the database description in every open partition
    pub fn set_db_info(&self, info: &DbInfo) -> FamDbResult<()> {
        for partition in self.partitions() {
            partition.set_db_info(info)?;
        }
        Ok(())
    }

    pub fn metadata(&self) -> FamDbResult<FileMetadata> {
        self.root.get_metadata()
    }

    pub fn partition_summaries(&self) -> FamDbResult<Vec<PartitionSummary>> {
        self.file_map
            .file_map
            .iter()
            .map(|(number, entry)| {
                let counts = match self.partition(*number) {
                    Some(partition) => Some(partition.get_counts()?),
                    None => None,
                };
                Ok(PartitionSummary {
                    number: *number,
                    name: entry.t_root_name.clone(),
                    detail: entry.detail(),
                    filename: entry.filename.clone(),
                    present: counts.is_some(),
                    counts,
                })
            })
            .collect()
    }

    /// Write counters of every open partition and flush them
    pub fn finalize(&self) -> FamDbResult<()> {
        for partition in self.partitions() {
            partition.finalize()?;
        }
        info!("Finalized {}", self.db_dir.display());
        Ok(())
    }

    // Lookups

    pub fn get_family_by_accession(&self, accession: &str) -> FamDbResult<Option<Family>> {
        for partition in self.partitions() {
            if let Some(family) = partition.get_family_by_accession(accession)? {
                return Ok(Some(family));
            }
        }
        Ok(None)
    }

    pub fn get_family_by_name(&self, name: &str) -> FamDbResult<Option<Family>> {
        for partition in self.partitions() {
            if let Some(family) = partition.get_family_by_name(name)? {
                return Ok(Some(family));
            }
        }
        Ok(None)
    }

    /// Families attached to `tax_id`, `None` if its partition is not installed
    pub fn families_for_taxon(
        &self,
        tax_id: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> FamDbResult<Option<Vec<String>>> {
        Ok(self
            .taxon_families(tax_id, curated_only, uncurated_only)?
            .map(|(_, accessions)| accessions))
    }

    pub(crate) fn taxon_families(
        &self,
        tax_id: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> FamDbResult<Option<(u32, Vec<String>)>> {
        let owner = self
            .root
            .find_taxon(tax_id)
            .ok_or(FamDbError::TaxonNotFound(tax_id))?;
        match self.partition(owner) {
            Some(partition) => Ok(Some((
                owner,
                partition.families_for_taxon(tax_id, curated_only, uncurated_only)?,
            ))),
            None => Ok(None),
        }
    }

    pub fn find_taxon(&self, tax_id: TaxonId) -> Option<u32> {
        self.root.find_taxon(tax_id)
    }

    pub fn taxon_name(&self, tax_id: TaxonId, kind: &str) -> Option<String> {
        self.root
            .get_taxon_name(tax_id, kind)
            .map(|(name, _)| name.to_string())
    }

    pub fn sanitized_name(&self, tax_id: TaxonId) -> Option<String> {
        self.root.get_sanitized_name(tax_id)
    }

    /// All names of every taxon matching `term`
    pub fn resolve_names(&self, term: &str) -> Vec<NamesEntry> {
        self.root
            .resolve_species(term, None, false)
            .matches
            .into_iter()
            .map(|m| NamesEntry {
                taxon_id: m.taxon_id,
                partition: m.partition,
                present: self.is_open(m.partition),
                names: self.root.get_taxon_names(m.taxon_id).to_vec(),
            })
            .collect()
    }

    pub fn resolve_species(&self, term: &str, kind: Option<&str>, search_similar: bool) -> SpeciesSearch {
        self.root.resolve_species(term, kind, search_similar)
    }

    pub fn resolve_one_species(&self, term: &str, kind: Option<&str>) -> Resolution {
        self.root.resolve_one_species(term, kind)
    }

    // Lineage

    /// Lineage of `tax_id` across every open partition.
    ///
    /// Leaf boundaries are filled in from the partitions that own them and a
    /// root boundary is attached to the ancestor chain held by the root
    /// partition. Taxa in partitions that are not installed end the tree
    /// and are listed in [`Lineage::missing`].
    pub fn get_lineage_combined(&self, tax_id: TaxonId, opts: LineageOptions) -> FamDbResult<Lineage> {
        let owner = self
            .root
            .find_taxon(tax_id)
            .ok_or(FamDbError::TaxonNotFound(tax_id))?;

        let Some(partition) = self.partition(owner) else {
            warn!("{}", FamDbError::PartitionUnavailable(owner));
            let mut lineage = Lineage::new(LineageNode::taxon(tax_id), false, owner)?;
            lineage.record_missing(tax_id, owner);
            return Ok(lineage);
        };

        let mut lineage = partition.get_lineage(tax_id, opts)?;

        for child in lineage.leaf_boundaries() {
            let child_owner = self.root.find_taxon(child);
            match child_owner.and_then(|n| self.leaves.get(&n)) {
                Some(leaf) => {
                    let below = leaf.get_lineage(child, LineageOptions::full())?;
                    lineage = lineage.combine(below)?;
                }
                None => {
                    lineage.terminate_leaf(child);
                    match child_owner {
                        Some(n) => {
                            warn!("Taxon {} is in partition {}, which is not installed", child, n);
                            lineage.record_missing(child, n);
                        }
                        None => warn!("Taxon {} has no owning partition", child),
                    }
                }
            }
        }

        if let Some(anchor) = lineage.root_anchor() {
            let parent = self.root.parent_of(anchor)?.ok_or_else(|| {
                FamDbError::LineageCombine(format!("No parent of {} in the root partition", anchor))
            })?;
            let above = self.root.get_lineage(
                parent,
                LineageOptions {
                    ancestors: true,
                    descendants: true,
                    children_as_boundaries: true,
                    keep_boundaries: false,
                },
            )?;
            lineage = lineage.combine(above)?;
        }

        if !opts.keep_boundaries {
            lineage.strip_boundaries();
        }

        debug!("Lineage of {}: {}", tax_id, lineage);
        Ok(lineage)
    }

    /// Scientific names from the root down to `tax_id`
    pub fn lineage_path(&self, tax_id: TaxonId) -> FamDbResult<Vec<String>> {
        if let Some(path) = self.lineage_cache.lock().get(&tax_id) {
            return Ok(path.clone());
        }

        let lineage = self.get_lineage_combined(tax_id, LineageOptions::ancestors())?;
        let path: Vec<String> = lineage
            .taxa()
            .into_iter()
            .map(|id| {
                self.taxon_name(id, SCIENTIFIC_NAME)
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();

        self.lineage_cache.lock().insert(tax_id, path.clone());
        Ok(path)
    }

    /// Count families above and at or below `target` along `lineage`
    pub fn lineage_totals(
        &self,
        lineage: &Lineage,
        target: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> FamDbResult<LineageTotals> {
        LineageTotals::tally(lineage, target, |id| {
            let owner = self.root.find_taxon(id).ok_or(FamDbError::TaxonNotFound(id))?;
            match self.partition(owner) {
                Some(partition) => Ok((
                    owner,
                    Some(partition.families_for_taxon(id, curated_only, uncurated_only)?),
                )),
                None => Ok((owner, None)),
            }
        })
    }

    // Queries

    /// Lazily list the accessions matching `query`
    pub fn get_accessions_filtered(&self, query: &FamilyQuery) -> AccessionStream<'_> {
        AccessionStream::new(self, query)
    }

    /// Like [`Database::get_accessions_filtered`], forcing `plan`
    pub fn get_accessions_with_plan(&self, query: &FamilyQuery, plan: QueryPlan) -> AccessionStream<'_> {
        AccessionStream::with_plan(self, query, plan)
    }

    /// Every accession stored below `group` in any open partition, each once
    pub fn accessions_in_group(&self, group: &str) -> AccessionStream<'_> {
        AccessionStream::with_plan(self, &FamilyQuery::new(), QueryPlan::GroupScan(group.to_string()))
    }

    // Ingestion

    /// Add a family to every open partition holding one of its clades.
    ///
    /// Returns the partitions written; empty if no open partition holds any
    /// of the clades.
    pub fn add_family(&mut self, family: &Family) -> FamDbResult<Vec<u32>> {
        if !self.mode.is_writable() {
            return Err(FamDbError::ReadOnly);
        }

        for partition in self.partitions() {
            if !partition.is_unique(family)? {
                return Err(FamDbError::DuplicateFamily {
                    accession: family.accession.clone(),
                    name: family.name.clone(),
                });
            }
        }

        let mut targets = Vec::new();
        for partition in self.partitions() {
            for clade in &family.clades {
                if partition.has_taxon(*clade)? {
                    targets.push(partition.number());
                    break;
                }
            }
        }

        for number in &targets {
            if let Some(partition) = self.partition_mut(*number) {
                partition.add_family(family)?;
            }
        }

        Ok(targets)
    }

    /// Add families one by one; duplicates are reported, not fatal
    pub fn append_families<I>(&mut self, families: I) -> FamDbResult<AppendReport>
    where
        I: IntoIterator<Item = Family>,
    {
        let start = Instant::now();
        let mut report = AppendReport::default();

        for family in families {
            report.total += 1;
            match self.add_family(&family) {
                Ok(written) if written.is_empty() => {
                    warn!("No open partition holds the clades of {}, skipping", family.accession);
                    report.unplaced.push(family.accession);
                }
                Ok(_) => report.added += 1,
                Err(e) if e.is_per_record() => {
                    warn!("{}", e);
                    report.duplicates.push(family.accession);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Appended {} of {} families ({} duplicates, {} unplaced) in {:.3}s",
            report.added,
            report.total,
            report.duplicates.len(),
            report.unplaced.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dir", &self.db_dir)
            .field("prefix", &self.prefix)
            .field("mode", &self.mode)
            .field("partitions", &self.partitions().map(Partition::number).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir(dir.join(name)).unwrap();
        }
    }

    #[test]
    fn test_discover_single_generation() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["dfam.0.famdb", "dfam.3.famdb", "notes.txt", "other.2.famdb"]);

        let (prefix, files) = discover(dir.path(), "famdb").unwrap();
        assert_eq!(prefix, "dfam");
        assert_eq!(files.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_discover_errors() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["dfam.1.famdb"]);
        assert!(matches!(
            discover(dir.path(), "famdb"),
            Err(FamDbError::MissingRootPartition(_))
        ));

        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["a.0.famdb", "b.0.famdb"]);
        match discover(dir.path(), "famdb") {
            Err(FamDbError::MultipleDatabases(found)) => assert_eq!(found, vec!["a", "b"]),
            other => panic!("Expected MultipleDatabases, got {:?}", other.map(|(p, _)| p)),
        }

        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["dfam.0.famdb", "dfam.1.famdb", "dfam.01.famdb"]);
        assert!(matches!(
            discover(dir.path(), "famdb"),
            Err(FamDbError::DuplicatePartition(1))
        ));
    }

    #[test]
    fn test_discover_ignores_repeats_under_other_prefixes() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["dfam.0.famdb", "dfam.2.famdb", "old.2.famdb", "old.02.famdb"]);

        let (prefix, files) = discover(dir.path(), "famdb").unwrap();
        assert_eq!(prefix, "dfam");
        assert_eq!(files.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_open_rejects_create_mode() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Database::open(dir.path(), OpenMode::Create),
            Err(FamDbError::InvalidInput(_))
        ));
    }
}
