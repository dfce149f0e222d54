use famdb_core::{FamDbError, FamDbResult, NameRecord, TaxonId};
use famdb_storage::{OpenMode, StoreOptions};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use super::Partition;
use crate::names::{encode_names_blob, NameIndex, Resolution, SpeciesSearch, TaxonMatch};
use crate::taxonomy::TaxonomyDump;

/// Partition 0: owns the top of the taxonomy and every taxon's names
pub struct RootPartition {
    partition: Partition,
    names: NameIndex,
}

impl RootPartition {
    pub fn create<P: AsRef<Path>>(path: P, options: &StoreOptions, phonetic_fallback: bool) -> FamDbResult<Self> {
        Ok(Self {
            partition: Partition::create(path, 0, options)?,
            names: NameIndex::new(phonetic_fallback),
        })
    }

    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        options: &StoreOptions,
        phonetic_fallback: bool,
    ) -> FamDbResult<Self> {
        Self::from_partition(Partition::open(path, mode, options)?, phonetic_fallback)
    }

    /// Promote an opened partition, loading the stored name blobs
    pub fn from_partition(partition: Partition, phonetic_fallback: bool) -> FamDbResult<Self> {
        if !partition.is_root() {
            return Err(FamDbError::InvalidInput(format!(
                "{} is partition {}, not the root partition",
                partition.path().display(),
                partition.number()
            )));
        }

        let names = NameIndex::from_blobs(partition.store().names_blobs()?, phonetic_fallback);
        Ok(Self { partition, names })
    }

    pub fn names(&self) -> &NameIndex {
        &self.names
    }

    /// Store the names of each partition's taxa, one blob per partition
    pub fn write_taxa_names(
        &mut self,
        dump: &TaxonomyDump,
        partition_nodes: &BTreeMap<u32, Vec<TaxonId>>,
    ) -> FamDbResult<()> {
        info!("Writing taxon names");
        let start = Instant::now();

        for (partition, nodes) in partition_nodes {
            let names: BTreeMap<TaxonId, Vec<NameRecord>> = nodes
                .iter()
                .map(|id| (*id, dump.names(*id).to_vec()))
                .collect();

            let blob = encode_names_blob(&names)?;
            self.partition.store().put_names_blob(*partition, &blob)?;
            self.names.insert_partition(*partition, names);
        }

        info!(
            "Wrote names for {} taxa in {:.3}s",
            self.names.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Partition owning `tax_id`
    pub fn find_taxon(&self, tax_id: TaxonId) -> Option<u32> {
        self.names.find_taxon(tax_id)
    }

    pub fn get_taxon_names(&self, tax_id: TaxonId) -> &[NameRecord] {
        self.names.get_taxon_names(tax_id)
    }

    pub fn get_taxon_name(&self, tax_id: TaxonId, kind: &str) -> Option<(&str, u32)> {
        self.names.get_taxon_name(tax_id, kind)
    }

    pub fn get_sanitized_name(&self, tax_id: TaxonId) -> Option<String> {
        self.names.get_sanitized_name(tax_id)
    }

    pub fn search_taxon_names(&self, text: &str, kind: Option<&str>, search_similar: bool) -> Vec<TaxonMatch> {
        self.names.search_taxon_names(text, kind, search_similar)
    }

    pub fn resolve_species(&self, term: &str, kind: Option<&str>, search_similar: bool) -> SpeciesSearch {
        self.names.resolve_species(term, kind, search_similar)
    }

    pub fn resolve_one_species(&self, term: &str, kind: Option<&str>) -> Resolution {
        self.names.resolve_one_species(term, kind)
    }

    /// Parent of `child` from the parent index, even if `child` lives elsewhere
    pub fn parent_of(&self, child: TaxonId) -> FamDbResult<Option<TaxonId>> {
        self.partition.taxonomy().parent_of(child)
    }
}

impl Deref for RootPartition {
    type Target = Partition;

    fn deref(&self) -> &Partition {
        &self.partition
    }
}

impl DerefMut for RootPartition {
    fn deref_mut(&mut self) -> &mut Partition {
        &mut self.partition
    }
}

impl std::fmt::Debug for RootPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootPartition")
            .field("partition", &self.partition)
            .field("taxa", &self.names.len())
            .finish()
    }
}
