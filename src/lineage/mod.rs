//! Lineage trees spanning one or more partitions
//!
//! A lineage fetched from a single partition may end at a partition edge.
//! Such edges are kept as explicit markers so that the coordinator can fetch
//! the neighbouring piece and splice it in:
//!
//! - `LeafBoundary(id)` appears in root-partition lineages where a child
//!   `id` is stored in another partition.
//! - `RootBoundary(subtree)` wraps a non-root lineage whose top node's parent
//!   lives in the root partition.

pub mod totals;

use famdb_core::{FamDbError, FamDbResult, TaxonId};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

pub use totals::LineageTotals;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageNode {
    Taxon {
        id: TaxonId,
        children: Vec<LineageNode>,
    },
    /// A child stored in another partition
    LeafBoundary(TaxonId),
    /// The wrapped subtree's parent is stored in the root partition
    RootBoundary(Box<LineageNode>),
}

impl LineageNode {
    pub fn taxon(id: TaxonId) -> Self {
        LineageNode::Taxon {
            id,
            children: Vec::new(),
        }
    }

    pub fn with_children(id: TaxonId, children: Vec<LineageNode>) -> Self {
        LineageNode::Taxon { id, children }
    }

    /// Id of the top taxon, looking through a root boundary
    pub fn top_id(&self) -> TaxonId {
        match self {
            LineageNode::Taxon { id, .. } | LineageNode::LeafBoundary(id) => *id,
            LineageNode::RootBoundary(inner) => inner.top_id(),
        }
    }

    fn has_leaf_boundary(&self) -> bool {
        match self {
            LineageNode::Taxon { children, .. } => children.iter().any(Self::has_leaf_boundary),
            LineageNode::LeafBoundary(_) => true,
            LineageNode::RootBoundary(inner) => inner.has_leaf_boundary(),
        }
    }

    fn has_root_boundary(&self) -> bool {
        match self {
            LineageNode::Taxon { children, .. } => children.iter().any(Self::has_root_boundary),
            LineageNode::LeafBoundary(_) => false,
            LineageNode::RootBoundary(_) => true,
        }
    }

    fn collect_leaf_boundaries(&self, out: &mut Vec<TaxonId>) {
        match self {
            LineageNode::Taxon { children, .. } => {
                children.iter().for_each(|c| c.collect_leaf_boundaries(out))
            }
            LineageNode::LeafBoundary(id) => out.push(*id),
            LineageNode::RootBoundary(inner) => inner.collect_leaf_boundaries(out),
        }
    }

    fn find_root_boundary(&self) -> Option<&LineageNode> {
        match self {
            LineageNode::Taxon { children, .. } => {
                children.iter().find_map(Self::find_root_boundary)
            }
            LineageNode::LeafBoundary(_) => None,
            LineageNode::RootBoundary(inner) => Some(inner),
        }
    }

    /// Replace every `LeafBoundary(target)` with `replacement`
    fn replace_leaf(&mut self, target: TaxonId, replacement: &LineageNode) -> usize {
        match self {
            LineageNode::Taxon { children, .. } => children
                .iter_mut()
                .map(|c| c.replace_leaf(target, replacement))
                .sum(),
            LineageNode::LeafBoundary(id) if *id == target => {
                *self = replacement.clone();
                1
            }
            LineageNode::LeafBoundary(_) => 0,
            LineageNode::RootBoundary(inner) => inner.replace_leaf(target, replacement),
        }
    }

    /// Remove leaf markers and unwrap root markers
    fn strip(self) -> Option<LineageNode> {
        match self {
            LineageNode::Taxon { id, children } => Some(LineageNode::Taxon {
                id,
                children: children.into_iter().filter_map(Self::strip).collect(),
            }),
            LineageNode::LeafBoundary(_) => None,
            LineageNode::RootBoundary(inner) => inner.strip(),
        }
    }

    fn collect_taxa(&self, seen: &mut HashSet<TaxonId>, out: &mut Vec<TaxonId>) {
        match self {
            LineageNode::Taxon { id, children } => {
                if seen.insert(*id) {
                    out.push(*id);
                }
                for child in children {
                    child.collect_taxa(seen, out);
                }
            }
            LineageNode::LeafBoundary(_) => {}
            LineageNode::RootBoundary(inner) => inner.collect_taxa(seen, out),
        }
    }
}

/// Nested-list rendering, e.g. `[1, [9604, [9606]]]`
impl fmt::Display for LineageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineageNode::Taxon { id, children } => {
                write!(f, "[{}", id)?;
                for child in children {
                    write!(f, ", {}", child)?;
                }
                write!(f, "]")
            }
            LineageNode::LeafBoundary(id) => write!(f, "leaf_link:{}", id),
            LineageNode::RootBoundary(inner) => write!(f, "[root_link:{}, {}]", inner.top_id(), inner),
        }
    }
}

/// Options for fetching a lineage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineageOptions {
    pub ancestors: bool,
    pub descendants: bool,
    /// Turn every child into a leaf marker instead of expanding it
    pub children_as_boundaries: bool,
    /// Keep unresolved boundary markers in combined lineages
    pub keep_boundaries: bool,
}

impl LineageOptions {
    pub fn ancestors() -> Self {
        Self {
            ancestors: true,
            ..Default::default()
        }
    }

    pub fn descendants() -> Self {
        Self {
            descendants: true,
            ..Default::default()
        }
    }

    pub fn full() -> Self {
        Self {
            ancestors: true,
            descendants: true,
            ..Default::default()
        }
    }

    pub fn with_ancestors(mut self, yes: bool) -> Self {
        self.ancestors = yes;
        self
    }

    pub fn with_descendants(mut self, yes: bool) -> Self {
        self.descendants = yes;
        self
    }

    pub fn keep_boundaries(mut self) -> Self {
        self.keep_boundaries = true;
        self
    }
}

/// A lineage tree plus the partition bookkeeping needed to splice it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    tree: LineageNode,
    root: bool,
    partition: u32,
    descendants: bool,
    ancestors: bool,
    missing: BTreeMap<TaxonId, u32>,
}

impl Lineage {
    /// Validate and wrap a tree fetched from partition `partition`
    pub fn new(tree: LineageNode, root: bool, partition: u32) -> FamDbResult<Self> {
        let descendants = tree.has_leaf_boundary();
        let ancestors = tree.has_root_boundary();

        if descendants && !root {
            return Err(FamDbError::LineageCombine(
                "Leaf boundaries found in a non-root lineage".to_string(),
            ));
        }
        if ancestors && root {
            return Err(FamDbError::LineageCombine(
                "Root boundary found in a root lineage".to_string(),
            ));
        }

        Ok(Self {
            tree,
            root,
            partition,
            descendants,
            ancestors,
            missing: BTreeMap::new(),
        })
    }

    pub fn tree(&self) -> &LineageNode {
        &self.tree
    }

    pub fn into_tree(self) -> LineageNode {
        self.tree
    }

    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// True if the lineage continues below into other partitions
    pub fn has_leaf_boundaries(&self) -> bool {
        self.descendants
    }

    /// True if the lineage continues above into the root partition
    pub fn has_root_boundary(&self) -> bool {
        self.ancestors
    }

    pub fn leaf_boundaries(&self) -> Vec<TaxonId> {
        let mut out = Vec::new();
        self.tree.collect_leaf_boundaries(&mut out);
        out
    }

    /// Top taxon of the subtree wrapped in the root boundary
    pub fn root_anchor(&self) -> Option<TaxonId> {
        self.tree.find_root_boundary().map(LineageNode::top_id)
    }

    /// Taxa whose partition is not installed, with that partition
    pub fn missing(&self) -> &BTreeMap<TaxonId, u32> {
        &self.missing
    }

    pub(crate) fn record_missing(&mut self, taxon: TaxonId, partition: u32) {
        self.missing.insert(taxon, partition);
    }

    /// Replace a leaf marker with a plain terminal node
    pub(crate) fn terminate_leaf(&mut self, taxon: TaxonId) {
        self.tree.replace_leaf(taxon, &LineageNode::taxon(taxon));
        self.descendants = self.tree.has_leaf_boundary();
    }

    /// Splice a root-owned and a non-root lineage together.
    ///
    /// The non-root lineage's root-boundary subtree replaces the matching leaf
    /// marker of the root lineage. The result is owned by the root partition.
    pub fn combine(self, other: Lineage) -> FamDbResult<Lineage> {
        if self.root == other.root {
            return Err(FamDbError::LineageCombine(
                "Must combine a root and a non-root lineage".to_string(),
            ));
        }

        let (root_lineage, leaf_lineage) = if self.root {
            (self, other)
        } else {
            (other, self)
        };

        let subtree = leaf_lineage.tree.find_root_boundary().ok_or_else(|| {
            FamDbError::LineageCombine(format!(
                "Lineage from partition {} has no root boundary",
                leaf_lineage.partition
            ))
        })?;
        let anchor = subtree.top_id();

        let mut tree = root_lineage.tree;
        if tree.replace_leaf(anchor, subtree) == 0 {
            tracing::warn!(
                "No boundary for taxon {} in root lineage, partition {} not attached",
                anchor,
                leaf_lineage.partition
            );
        }

        let mut combined = Lineage::new(tree, true, root_lineage.partition)?;
        combined.missing = root_lineage.missing;
        combined.missing.extend(leaf_lineage.missing);
        Ok(combined)
    }

    /// Remove any boundary markers left in the tree
    pub fn strip_boundaries(&mut self) {
        let tree = std::mem::replace(&mut self.tree, LineageNode::taxon(TaxonId::ROOT));
        let top = tree.top_id();
        self.tree = tree.strip().unwrap_or_else(|| LineageNode::taxon(top));
        self.descendants = false;
        self.ancestors = false;
    }

    /// Every taxon in pre-order, each id once
    pub fn taxa(&self) -> Vec<TaxonId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.tree.collect_taxa(&mut seen, &mut out);
        out
    }

    pub fn contains(&self, taxon: TaxonId) -> bool {
        self.taxa().contains(&taxon)
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(id: u32, children: Vec<LineageNode>) -> LineageNode {
        LineageNode::with_children(TaxonId(id), children)
    }

    fn leaf(id: u32) -> LineageNode {
        LineageNode::LeafBoundary(TaxonId(id))
    }

    fn root_link(inner: LineageNode) -> LineageNode {
        LineageNode::RootBoundary(Box::new(inner))
    }

    #[test]
    fn test_construction_invariants() {
        assert!(Lineage::new(t(1, vec![leaf(9606)]), true, 0).is_ok());
        assert!(matches!(
            Lineage::new(t(1, vec![leaf(9606)]), false, 3),
            Err(FamDbError::LineageCombine(_))
        ));
        assert!(matches!(
            Lineage::new(root_link(t(9606, vec![])), true, 0),
            Err(FamDbError::LineageCombine(_))
        ));

        let leafy = Lineage::new(t(1, vec![t(9604, vec![leaf(9606)])]), true, 0).unwrap();
        assert!(leafy.has_leaf_boundaries());
        assert_eq!(leafy.leaf_boundaries(), vec![TaxonId(9606)]);

        let rooted = Lineage::new(root_link(t(9606, vec![])), false, 3).unwrap();
        assert!(rooted.has_root_boundary());
        assert_eq!(rooted.root_anchor(), Some(TaxonId(9606)));
    }

    #[test]
    fn test_combine_ancestor_splice() {
        let root = Lineage::new(t(1, vec![t(9604, vec![leaf(9598), leaf(9606)])]), true, 0).unwrap();
        let human = Lineage::new(root_link(t(9606, vec![t(63221, vec![])])), false, 3).unwrap();

        let mut combined = human.combine(root).unwrap();
        assert!(combined.is_root());
        assert_eq!(combined.partition(), 0);
        assert_eq!(combined.to_string(), "[1, [9604, leaf_link:9598, [9606, [63221]]]]");

        combined.strip_boundaries();
        assert_eq!(combined.to_string(), "[1, [9604, [9606, [63221]]]]");
    }

    #[test]
    fn test_combine_requires_opposite_ownership() {
        let a = Lineage::new(t(1, vec![]), true, 0).unwrap();
        let b = Lineage::new(t(2, vec![]), true, 0).unwrap();
        assert!(matches!(a.combine(b), Err(FamDbError::LineageCombine(_))));

        let c = Lineage::new(root_link(t(3, vec![])), false, 1).unwrap();
        let d = Lineage::new(root_link(t(4, vec![])), false, 2).unwrap();
        assert!(matches!(c.combine(d), Err(FamDbError::LineageCombine(_))));
    }

    #[test]
    fn test_combine_is_order_independent() {
        let root = || Lineage::new(t(1, vec![leaf(10), leaf(20)]), true, 0).unwrap();
        let p1 = || Lineage::new(root_link(t(10, vec![t(11, vec![])])), false, 1).unwrap();
        let p2 = || Lineage::new(root_link(t(20, vec![t(21, vec![])])), false, 2).unwrap();

        let forward = root().combine(p1()).unwrap().combine(p2()).unwrap();
        let backward = p2().combine(root()).unwrap().combine(p1()).unwrap();
        assert_eq!(forward.tree(), backward.tree());
        assert_eq!(forward.to_string(), "[1, [10, [11]], [20, [21]]]");
        assert!(!forward.has_leaf_boundaries());
    }

    #[test]
    fn test_terminate_leaf_and_missing() {
        let mut lineage = Lineage::new(t(1, vec![leaf(10090)]), true, 0).unwrap();
        lineage.terminate_leaf(TaxonId(10090));
        lineage.record_missing(TaxonId(10090), 4);

        assert_eq!(lineage.to_string(), "[1, [10090]]");
        assert!(!lineage.has_leaf_boundaries());
        assert_eq!(lineage.missing().get(&TaxonId(10090)), Some(&4));
    }

    #[test]
    fn test_taxa_and_contains() {
        let lineage = Lineage::new(t(1, vec![t(2, vec![t(3, vec![])]), t(4, vec![]), leaf(5)]), true, 0).unwrap();
        assert_eq!(lineage.taxa(), vec![TaxonId(1), TaxonId(2), TaxonId(3), TaxonId(4)]);
        assert!(lineage.contains(TaxonId(4)));
        assert!(!lineage.contains(TaxonId(5)));
    }
}
