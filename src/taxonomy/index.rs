use famdb_core::{is_curated_accession, FamDbResult, TaxonId};
use famdb_storage::{keys, NodeRecord, PartitionStore};
use std::time::Instant;
use tracing::{info, warn};

use super::dump::TaxonomyDump;

/// One partition's slice of the taxonomy backbone
///
/// Nodes not stored locally but referenced as a parent or child mark a
/// partition boundary; they are not missing data.
pub struct TaxonIndex<'a> {
    store: &'a PartitionStore,
}

impl<'a> TaxonIndex<'a> {
    pub fn new(store: &'a PartitionStore) -> Self {
        Self { store }
    }

    pub fn has_taxon(&self, tax_id: TaxonId) -> FamDbResult<bool> {
        self.store.has_node(tax_id.0)
    }

    /// Children of a local node in stored order, `None` if the node is not local
    pub fn children(&self, tax_id: TaxonId) -> FamDbResult<Option<Vec<TaxonId>>> {
        Ok(self
            .store
            .children(tax_id.0)?
            .map(|ids| ids.into_iter().map(TaxonId).collect()))
    }

    pub fn parent(&self, tax_id: TaxonId) -> FamDbResult<Option<TaxonId>> {
        Ok(self.store.parent(tax_id.0)?.map(TaxonId))
    }

    /// Parent of `child` from the direct parent index; the child may live in
    /// another partition
    pub fn parent_of(&self, child: TaxonId) -> FamDbResult<Option<TaxonId>> {
        Ok(self.store.indexed_parent(child.0)?.map(TaxonId))
    }

    /// Accessions of the families attached directly to `tax_id`
    pub fn families_for_taxon(
        &self,
        tax_id: TaxonId,
        curated_only: bool,
        uncurated_only: bool,
    ) -> FamDbResult<Vec<String>> {
        let links = self.store.scan_links(&keys::node_families_prefix(tax_id.0))?;
        Ok(links
            .into_iter()
            .map(|(_, accession)| accession)
            .filter(|acc| {
                if curated_only {
                    is_curated_accession(acc)
                } else if uncurated_only {
                    !is_curated_accession(acc)
                } else {
                    true
                }
            })
            .collect())
    }

    /// Write the listed nodes of `dump` in one batch
    pub fn write_nodes(&self, dump: &TaxonomyDump, nodes: &[TaxonId]) -> FamDbResult<usize> {
        info!("Writing taxonomy nodes");
        let start = Instant::now();

        let records: Vec<NodeRecord> = nodes
            .iter()
            .filter_map(|id| match dump.get(*id) {
                Some(node) => Some(NodeRecord {
                    id: id.0,
                    parent: node.parent_id.filter(|_| !id.is_root()).map(|p| p.0),
                    children: dump.children(*id).into_iter().map(|c| c.0).collect(),
                }),
                None => {
                    warn!("Taxon {} is not in the taxonomy dump, skipping", id);
                    None
                }
            })
            .collect();

        let count = self.store.write_nodes(&records)?;
        info!(
            "Wrote {} taxonomy nodes in {:.3}s",
            count,
            start.elapsed().as_secs_f64()
        );
        Ok(count)
    }
}
