//! Taxonomy backbone: the build-time dump and the per-partition index

pub mod dump;
pub mod index;

pub use dump::{TaxNode, TaxonomyDump};
pub use index::TaxonIndex;
