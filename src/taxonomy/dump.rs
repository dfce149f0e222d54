//! In-memory taxonomy dump used when building a database
//!
//! A dump is the whole taxonomy as loaded from an external source (e.g. the
//! NCBI `nodes.dmp`/`names.dmp` pair). It is only needed while writing; a
//! finished database never loads the full taxonomy.

use famdb_core::{FamDbError, FamDbResult, NameRecord, TaxonId};
use std::collections::{BTreeMap, BTreeSet};

/// A taxonomy node with its names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxNode {
    pub tax_id: TaxonId,
    /// `None` only for the root
    pub parent_id: Option<TaxonId>,
    pub names: Vec<NameRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct TaxonomyDump {
    nodes: BTreeMap<TaxonId, TaxNode>,
    children: BTreeMap<TaxonId, BTreeSet<TaxonId>>,
}

impl TaxonomyDump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A parent equal to the node itself (as NCBI encodes the
    /// root) is treated as no parent.
    pub fn add_taxon(&mut self, tax_id: TaxonId, parent_id: Option<TaxonId>) {
        let parent_id = parent_id.filter(|p| *p != tax_id);
        if let Some(parent) = parent_id {
            self.children.entry(parent).or_default().insert(tax_id);
        }
        self.nodes.insert(
            tax_id,
            TaxNode {
                tax_id,
                parent_id,
                names: Vec::new(),
            },
        );
    }

    pub fn add_name(
        &mut self,
        tax_id: TaxonId,
        name_class: impl Into<String>,
        text: impl Into<String>,
    ) -> FamDbResult<()> {
        let node = self
            .nodes
            .get_mut(&tax_id)
            .ok_or(FamDbError::TaxonNotFound(tax_id))?;
        node.names.push(NameRecord::new(tax_id, name_class, text));
        Ok(())
    }

    pub fn get(&self, tax_id: TaxonId) -> Option<&TaxNode> {
        self.nodes.get(&tax_id)
    }

    /// Children in ascending id order
    pub fn children(&self, tax_id: TaxonId) -> Vec<TaxonId> {
        self.children
            .get(&tax_id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn names(&self, tax_id: TaxonId) -> &[NameRecord] {
        self.nodes
            .get(&tax_id)
            .map(|n| n.names.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaxNode> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_are_derived_and_sorted() {
        let mut dump = TaxonomyDump::new();
        dump.add_taxon(TaxonId(1), Some(TaxonId(1)));
        dump.add_taxon(TaxonId(10090), Some(TaxonId(10088)));
        dump.add_taxon(TaxonId(9606), Some(TaxonId(1)));
        dump.add_taxon(TaxonId(10088), Some(TaxonId(1)));

        assert_eq!(dump.get(TaxonId(1)).unwrap().parent_id, None);
        assert_eq!(dump.children(TaxonId(1)), vec![TaxonId(9606), TaxonId(10088)]);
        assert_eq!(dump.children(TaxonId(10088)), vec![TaxonId(10090)]);
        assert!(dump.children(TaxonId(9606)).is_empty());
        assert_eq!(dump.len(), 4);
    }

    #[test]
    fn test_names_require_known_taxon() {
        let mut dump = TaxonomyDump::new();
        dump.add_taxon(TaxonId(9606), None);
        dump.add_name(TaxonId(9606), "scientific name", "Homo sapiens").unwrap();
        dump.add_name(TaxonId(9606), "genbank common name", "human").unwrap();

        assert_eq!(dump.names(TaxonId(9606)).len(), 2);
        assert!(matches!(
            dump.add_name(TaxonId(42), "scientific name", "x"),
            Err(FamDbError::TaxonNotFound(TaxonId(42)))
        ));
    }
}
