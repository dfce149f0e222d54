//! A single partition file of a FamDB generation

pub mod root;

use chrono::Utc;
use famdb_core::system::generator_string;
use famdb_core::{
    check_format_version, Counts, DbInfo, FamDbError, FamDbResult, Family, FileMap, FileMetadata,
    TaxonId, FILE_VERSION,
};
use famdb_storage::keys::{self, attrs};
use famdb_storage::{OpenMode, PartitionStore, StoreOptions};
use std::path::Path;
use tracing::{debug, error, info};

use crate::lineage::{Lineage, LineageNode, LineageOptions};
use crate::taxonomy::{TaxonIndex, TaxonomyDump};

pub use root::RootPartition;

/// One storage file holding families and a slice of the taxonomy
pub struct Partition {
    store: PartitionStore,
    number: u32,
    root: bool,
    /// Consensus sequences and HMMs written through this handle
    added: Counts,
}

impl Partition {
    /// Create a new, empty partition at `path`
    pub fn create<P: AsRef<Path>>(path: P, number: u32, options: &StoreOptions) -> FamDbResult<Self> {
        let store = PartitionStore::open(path, OpenMode::Create, options)?;

        store.put_attr(attrs::VERSION, FILE_VERSION)?;
        store.put_attr(attrs::GENERATOR, &generator_string())?;
        store.put_attr(attrs::CREATED, &Utc::now().to_rfc3339())?;

        let mut partition = Self {
            store,
            number,
            root: number == 0,
            added: Counts::default(),
        };
        partition.set_partition_info(number)?;

        info!("Created partition {} at {}", number, partition.path().display());
        Ok(partition)
    }

    /// Open an existing partition for reading or appending
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, options: &StoreOptions) -> FamDbResult<Self> {
        if mode == OpenMode::Create {
            return Err(FamDbError::InvalidInput(
                "Partition::open cannot create; use Partition::create".to_string(),
            ));
        }

        let store = PartitionStore::open(path, mode, options)?;

        let version: Option<String> = store.get_attr(attrs::VERSION)?;
        if let Err(e) = check_format_version(version.as_deref()) {
            error!("Refusing to open {}: {}", store.path().display(), e);
            return Err(e);
        }

        let number: u32 = store.get_attr(attrs::PARTITION_NUM)?.ok_or_else(|| {
            error!("{} has no partition number", store.path().display());
            FamDbError::Storage(format!("{} has no partition number", store.path().display()))
        })?;
        let root = store.get_attr(attrs::ROOT)?.unwrap_or(number == 0);

        let mut partition = Self {
            store,
            number,
            root,
            added: Counts::default(),
        };
        if mode == OpenMode::Append {
            partition.added = partition.get_counts()?;
        }

        Ok(partition)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn mode(&self) -> OpenMode {
        self.store.mode()
    }

    pub(crate) fn store(&self) -> &PartitionStore {
        &self.store
    }

    pub fn taxonomy(&self) -> TaxonIndex<'_> {
        TaxonIndex::new(&self.store)
    }

    // Metadata

    pub fn set_partition_info(&mut self, number: u32) -> FamDbResult<()> {
        self.store.put_attr(attrs::PARTITION_NUM, &number)?;
        self.store.put_attr(attrs::ROOT, &(number == 0))?;
        self.number = number;
        self.root = number == 0;
        Ok(())
    }

    pub fn set_file_info(&self, file_map: &FileMap) -> FamDbResult<()> {
        self.store.put_attr(attrs::FILE_INFO, file_map)
    }

    pub fn get_file_info(&self) -> FamDbResult<Option<FileMap>> {
        self.store.get_attr(attrs::FILE_INFO)
    }

    pub fn set_db_info(&self, info: &DbInfo) -> FamDbResult<()> {
        self.store.put_attr(attrs::DB_NAME, &info.name)?;
        self.store.put_attr(attrs::DB_VERSION, &info.version)?;
        self.store.put_attr(attrs::DB_DATE, &info.date)?;
        self.store.put_attr(attrs::DB_DESCRIPTION, &info.description)?;
        self.store.put_attr(attrs::DB_COPYRIGHT, &info.copyright)
    }

    /// Database description, `None` if it was never set
    pub fn get_db_info(&self) -> FamDbResult<Option<DbInfo>> {
        let name: Option<String> = self.store.get_attr(attrs::DB_NAME)?;
        let name = match name {
            Some(name) => name,
            None => return Ok(None),
        };

        Ok(Some(DbInfo {
            name,
            version: self.store.get_attr(attrs::DB_VERSION)?.unwrap_or_default(),
            date: self.store.get_attr(attrs::DB_DATE)?.unwrap_or_default(),
            description: self.store.get_attr(attrs::DB_DESCRIPTION)?.unwrap_or_default(),
            copyright: self.store.get_attr(attrs::DB_COPYRIGHT)?.unwrap_or_default(),
        }))
    }

    pub fn get_metadata(&self) -> FamDbResult<FileMetadata> {
        let entry = self
            .get_file_info()?
            .and_then(|map| map.partition(self.number).cloned())
            .unwrap_or_default();

        Ok(FileMetadata {
            generator: self.store.get_attr(attrs::GENERATOR)?.unwrap_or_default(),
            version: self.store.get_attr(attrs::VERSION)?.unwrap_or_default(),
            created: self.store.get_attr(attrs::CREATED)?.unwrap_or_default(),
            partition_name: entry.t_root_name.clone(),
            partition_detail: entry.detail(),
        })
    }

    /// Stored counts; absent counters read as zero
    pub fn get_counts(&self) -> FamDbResult<Counts> {
        Ok(Counts {
            consensus: self.store.get_attr(attrs::COUNT_CONSENSUS)?.unwrap_or(0),
            hmm: self.store.get_attr(attrs::COUNT_HMM)?.unwrap_or(0),
        })
    }

    /// Counts added through this handle, including those loaded on append
    pub fn added(&self) -> Counts {
        self.added
    }

    /// Write counters and flush to disk
    pub fn finalize(&self) -> FamDbResult<()> {
        if !self.mode().is_writable() {
            return Ok(());
        }
        self.store.put_attr(attrs::COUNT_CONSENSUS, &self.added.consensus)?;
        self.store.put_attr(attrs::COUNT_HMM, &self.added.hmm)?;
        self.store.flush()
    }

    // Families

    /// False if the family's accession or name is already taken here
    pub fn is_unique(&self, family: &Family) -> FamDbResult<bool> {
        let accession = family.accession.as_str();
        let with_v = format!("{}v", accession);

        for candidate in [accession, with_v.as_str()] {
            if self.store.has_family(candidate)? || self.store.has_link(&keys::by_name(candidate))? {
                return Ok(false);
            }
        }

        if let Some(name) = family.name.as_deref() {
            if self.store.has_link(&keys::by_name(name))? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Store a family and its lookup links
    pub fn add_family(&mut self, family: &Family) -> FamDbResult<()> {
        if !self.mode().is_writable() {
            return Err(FamDbError::ReadOnly);
        }

        if !self.is_unique(family)? {
            return Err(FamDbError::DuplicateFamily {
                accession: family.accession.clone(),
                name: family.name.clone(),
            });
        }

        let accession = family.accession.as_str();
        self.store.put_family(family)?;

        if let Some(name) = family.name.as_deref() {
            self.store.put_link(&keys::by_name(name), accession)?;
        }

        for stage in family.all_stages() {
            self.store.put_link(&keys::by_stage(&stage, accession), accession)?;
        }

        let taxonomy = self.taxonomy();
        for clade in &family.clades {
            if taxonomy.has_taxon(*clade)? {
                self.store
                    .put_link(&keys::node_family(clade.0, accession), accession)?;
            }
        }

        if family.has_consensus() {
            self.added.consensus += 1;
        }
        if family.has_model() {
            self.added.hmm += 1;
        }

        debug!("Added family {} to partition {}", family, self.number);
        Ok(())
    }

    pub fn get_family_by_accession(&self, accession: &str) -> FamDbResult<Option<Family>> {
        self.store.get_family(accession)
    }

    pub fn get_family_by_name(&self, name: &str) -> FamDbResult<Option<Family>> {
        match self.store.get_link(&keys::by_name(name))? {
            Some(accession) => self.store.get_family(&accession),
            None => Ok(None),
        }
    }

    /// Family names, sorted case-insensitively
    pub fn family_names(&self) -> FamDbResult<Vec<String>> {
        let mut names: Vec<String> = self
            .store
            .scan_links(&keys::by_name_prefix())?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        Ok(names)
    }

    pub fn accessions(&self) -> FamDbResult<Vec<String>> {
        self.store.family_accessions()
    }

    /// Accessions stored under one bucket group
    pub fn accessions_under(&self, group: &str) -> FamDbResult<Vec<String>> {
        self.store.family_accessions_under(group)
    }

    // Taxonomy and stages

    pub fn has_taxon(&self, tax_id: TaxonId) -> FamDbResult<bool> {
        self.taxonomy().has_taxon(tax_id)
    }

    pub fn families_for_taxon(
        &self,
        tax_id: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> FamDbResult<Vec<String>> {
        self.taxonomy()
            .families_for_taxon(tax_id, curated_only, uncurated_only)
    }

    /// Bulk-write the listed taxonomy nodes
    pub fn write_taxonomy(&self, dump: &TaxonomyDump, nodes: &[TaxonId]) -> FamDbResult<usize> {
        self.taxonomy().write_nodes(dump, nodes)
    }

    /// Accessions indexed under one search or buffer stage
    pub fn stage_accessions(&self, stage: &str) -> FamDbResult<Vec<String>> {
        Ok(self
            .store
            .scan_links(&keys::by_stage_prefix(stage))?
            .into_iter()
            .map(|(_, accession)| accession)
            .collect())
    }

    /// True if `accession` is indexed under any of `stages`
    pub fn filter_stages(&self, accession: &str, stages: &[String]) -> FamDbResult<bool> {
        for stage in stages {
            if self.store.has_link(&keys::by_stage(stage, accession))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lineage of `tax_id` built from this partition's nodes only
    pub fn get_lineage(&self, tax_id: TaxonId, opts: LineageOptions) -> FamDbResult<Lineage> {
        let taxonomy = self.taxonomy();
        if !taxonomy.has_taxon(tax_id)? {
            return Err(FamDbError::TaxonNotFound(tax_id));
        }

        let mut tree = if opts.descendants {
            self.descend(&taxonomy, tax_id, opts.children_as_boundaries)?
        } else {
            LineageNode::taxon(tax_id)
        };

        if opts.ancestors {
            let mut current = tax_id;
            while let Some(parent) = taxonomy.parent(current)? {
                if !taxonomy.has_taxon(parent)? {
                    tree = LineageNode::RootBoundary(Box::new(tree));
                    break;
                }
                tree = LineageNode::with_children(parent, vec![tree]);
                current = parent;
            }
        }

        Lineage::new(tree, self.root, self.number)
    }

    fn descend(
        &self,
        taxonomy: &TaxonIndex<'_>,
        tax_id: TaxonId,
        children_as_boundaries: bool,
    ) -> FamDbResult<LineageNode> {
        let mut nodes = Vec::new();

        for child in taxonomy.children(tax_id)?.unwrap_or_default() {
            if !children_as_boundaries && taxonomy.has_taxon(child)? {
                nodes.push(self.descend(taxonomy, child, false)?);
            } else if self.root {
                nodes.push(LineageNode::LeafBoundary(child));
            }
        }

        Ok(LineageNode::with_children(tax_id, nodes))
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("number", &self.number)
            .field("root", &self.root)
            .field("path", &self.path())
            .field("mode", &self.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn dump() -> TaxonomyDump {
        let mut dump = TaxonomyDump::new();
        dump.add_taxon(TaxonId(1), None);
        dump.add_taxon(TaxonId(9604), Some(TaxonId(1)));
        dump.add_taxon(TaxonId(9606), Some(TaxonId(9604)));
        dump.add_taxon(TaxonId(63221), Some(TaxonId(9606)));
        dump.add_taxon(TaxonId(10088), Some(TaxonId(1)));
        dump
    }

    fn family(acc: &str, name: &str, clade: u32) -> Family {
        let mut family = Family::new(acc);
        family.name = Some(name.to_string());
        family.consensus = Some("ACGT".to_string());
        family.search_stages = Some("35,50".to_string());
        family.buffer_stages = Some("10[1-50],10[60-80]".to_string());
        family.clades = vec![TaxonId(clade)];
        family
    }

    fn root_partition(dir: &TempDir) -> Partition {
        let partition =
            Partition::create(dir.path().join("t.0.famdb"), 0, &StoreOptions::development()).unwrap();
        partition
            .write_taxonomy(&dump(), &[TaxonId(1), TaxonId(9604), TaxonId(10088)])
            .unwrap();
        partition
    }

    #[test]
    fn test_create_and_reopen_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.2.famdb");
        {
            let partition = Partition::create(&path, 2, &StoreOptions::development()).unwrap();
            assert!(!partition.is_root());
            partition
                .set_db_info(&DbInfo {
                    name: "Test".into(),
                    version: "3.8".into(),
                    ..Default::default()
                })
                .unwrap();
            partition.finalize().unwrap();
        }

        let partition = Partition::open(&path, OpenMode::Read, &StoreOptions::development()).unwrap();
        assert_eq!(partition.number(), 2);
        assert_eq!(partition.get_db_info().unwrap().unwrap().version, "3.8");
        assert_eq!(partition.get_counts().unwrap(), Counts::default());

        let meta = partition.get_metadata().unwrap();
        assert_eq!(meta.version, FILE_VERSION);
        assert!(meta.generator.starts_with("famdb v"));
    }

    #[test]
    fn test_db_info_absent() {
        let dir = TempDir::new().unwrap();
        let partition = root_partition(&dir);
        assert_eq!(partition.get_db_info().unwrap(), None);
    }

    #[test]
    fn test_duplicate_accession_and_name() {
        let dir = TempDir::new().unwrap();
        let mut partition = root_partition(&dir);

        partition.add_family(&family("DF0000001", "MIR", 9604)).unwrap();
        let before = partition.added();

        let dup = partition.add_family(&family("DF0000001", "Other", 9604));
        assert!(matches!(dup, Err(FamDbError::DuplicateFamily { .. })));

        let same_name = partition.add_family(&family("DF0000002", "MIR", 9604));
        assert!(matches!(same_name, Err(FamDbError::DuplicateFamily { .. })));

        assert_eq!(partition.added(), before);
        assert_eq!(partition.added().consensus, 1);
    }

    #[test]
    fn test_links_built_on_insert() {
        let dir = TempDir::new().unwrap();
        let mut partition = root_partition(&dir);
        partition.add_family(&family("DF0000001", "MIR", 9604)).unwrap();
        // clade not stored here: no taxon link
        partition.add_family(&family("DF0000002", "L2", 9606)).unwrap();

        assert_eq!(
            partition.get_family_by_name("MIR").unwrap().unwrap().accession,
            "DF0000001"
        );
        assert_eq!(partition.stage_accessions("35").unwrap().len(), 2);
        assert_eq!(partition.stage_accessions("10").unwrap().len(), 2);
        assert!(partition
            .filter_stages("DF0000001", &["60".to_string(), "50".to_string()])
            .unwrap());
        assert!(!partition.filter_stages("DF0000001", &["60".to_string()]).unwrap());

        assert_eq!(
            partition.families_for_taxon(TaxonId(9604), false, false).unwrap(),
            vec!["DF0000001".to_string()]
        );
        assert!(partition
            .families_for_taxon(TaxonId(9606), false, false)
            .unwrap()
            .is_empty());
        assert_eq!(partition.family_names().unwrap(), vec!["L2", "MIR"]);
    }

    #[test]
    fn test_root_lineage_marks_foreign_children() {
        let dir = TempDir::new().unwrap();
        let partition = root_partition(&dir);

        let lineage = partition.get_lineage(TaxonId(1), LineageOptions::descendants()).unwrap();
        assert_eq!(lineage.to_string(), "[1, [9604, leaf_link:9606], [10088]]");

        let opts = LineageOptions {
            ancestors: true,
            descendants: true,
            children_as_boundaries: true,
            keep_boundaries: false,
        };
        let lineage = partition.get_lineage(TaxonId(9604), opts).unwrap();
        assert_eq!(lineage.to_string(), "[1, [9604, leaf_link:9606]]");
    }

    #[test]
    fn test_leaf_lineage_wraps_at_root_boundary() {
        let dir = TempDir::new().unwrap();
        let partition =
            Partition::create(dir.path().join("t.3.famdb"), 3, &StoreOptions::development()).unwrap();
        partition
            .write_taxonomy(&dump(), &[TaxonId(9606), TaxonId(63221)])
            .unwrap();

        let lineage = partition.get_lineage(TaxonId(63221), LineageOptions::full()).unwrap();
        assert!(lineage.has_root_boundary());
        assert_eq!(lineage.root_anchor(), Some(TaxonId(9606)));
        assert_eq!(lineage.to_string(), "[root_link:9606, [9606, [63221]]]");

        assert!(matches!(
            partition.get_lineage(TaxonId(1), LineageOptions::full()),
            Err(FamDbError::TaxonNotFound(_))
        ));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.0.famdb");
        drop(root_partition_at(&path));

        let mut partition = Partition::open(&path, OpenMode::Read, &StoreOptions::development()).unwrap();
        assert!(matches!(
            partition.add_family(&family("DF0000009", "X", 1)),
            Err(FamDbError::ReadOnly)
        ));
    }

    fn root_partition_at(path: &Path) -> Partition {
        Partition::create(path, 0, &StoreOptions::development()).unwrap()
    }
}
