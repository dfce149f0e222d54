use famdb_core::{FamDbResult, TaxonId};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use super::{Lineage, LineageNode};

/// Family counts along a lineage, split at a target taxon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LineageTotals {
    /// Families attached strictly above the target
    pub ancestral: usize,
    /// Families attached to the target or below it
    pub lineage_specific: usize,
    /// Partitions that contributed taxa
    pub present: BTreeSet<u32>,
    /// Partitions that hold taxa of the lineage but are not installed
    pub missing: BTreeSet<u32>,
}

impl LineageTotals {
    /// Walk `lineage` in pre-order and count each family once.
    ///
    /// `families_of` returns the owning partition of a taxon and its
    /// accessions, or `None` for the accessions when that partition is
    /// unavailable.
    pub fn tally<F>(lineage: &Lineage, target: TaxonId, mut families_of: F) -> FamDbResult<Self>
    where
        F: FnMut(TaxonId) -> FamDbResult<(u32, Option<Vec<String>>)>,
    {
        let mut totals = LineageTotals::default();
        totals.missing.extend(lineage.missing().values().copied());

        let mut seen = HashSet::new();
        let mut stack: Vec<(&LineageNode, bool)> = vec![(lineage.tree(), false)];

        while let Some((node, below)) = stack.pop() {
            match node {
                LineageNode::Taxon { id, children } => {
                    let below = below || *id == target;
                    let (partition, families) = families_of(*id)?;
                    match families {
                        Some(accessions) => {
                            totals.present.insert(partition);
                            for acc in accessions {
                                if seen.insert(acc) {
                                    if below {
                                        totals.lineage_specific += 1;
                                    } else {
                                        totals.ancestral += 1;
                                    }
                                }
                            }
                        }
                        None => {
                            totals.missing.insert(partition);
                        }
                    }
                    stack.extend(children.iter().rev().map(|c| (c, below)));
                }
                LineageNode::LeafBoundary(_) => {}
                LineageNode::RootBoundary(inner) => stack.push((inner, below)),
            }
        }

        Ok(totals)
    }

    pub fn total(&self) -> usize {
        self.ancestral + self.lineage_specific
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node(id: u32, children: Vec<LineageNode>) -> LineageNode {
        LineageNode::with_children(TaxonId(id), children)
    }

    #[test]
    fn test_split_at_target() {
        let lineage = Lineage::new(node(1, vec![node(9604, vec![node(9606, vec![])])]), true, 0).unwrap();

        let families: HashMap<u32, (u32, Option<Vec<String>>)> = [
            (1, (0, Some(vec!["DF1".to_string()]))),
            (9604, (0, Some(vec!["DF2".to_string(), "DF1".to_string()]))),
            (9606, (3, Some(vec!["DF3".to_string(), "DR000000001".to_string()]))),
        ]
        .into_iter()
        .collect();

        let totals = LineageTotals::tally(&lineage, TaxonId(9604), |id| {
            Ok(families.get(&id.0).cloned().unwrap_or((0, Some(Vec::new()))))
        })
        .unwrap();

        assert_eq!(totals.ancestral, 1);
        assert_eq!(totals.lineage_specific, 3);
        assert_eq!(totals.total(), 4);
        assert_eq!(totals.present.iter().copied().collect::<Vec<_>>(), vec![0, 3]);
        assert!(totals.missing.is_empty());
    }

    #[test]
    fn test_unavailable_partition_is_reported() {
        let mut lineage = Lineage::new(node(1, vec![node(10090, vec![])]), true, 0).unwrap();
        lineage.record_missing(TaxonId(10090), 4);

        let totals = LineageTotals::tally(&lineage, TaxonId(1), |id| {
            if id == TaxonId(10090) {
                Ok((4, None))
            } else {
                Ok((0, Some(vec!["DF1".to_string()])))
            }
        })
        .unwrap();

        assert_eq!(totals.lineage_specific, 1);
        assert_eq!(totals.missing.iter().copied().collect::<Vec<_>>(), vec![4]);
    }
}
