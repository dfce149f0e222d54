/// Taxonomy-related types used throughout FamDB
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Taxonomy ID type - newtype pattern for type safety
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonId(pub u32);

impl TaxonId {
    pub const ROOT: Self = Self(1);

    /// Create a new TaxonId
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Check if this is the root taxon (1)
    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaxonId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<TaxonId> for u32 {
    fn from(taxon: TaxonId) -> Self {
        taxon.0
    }
}

impl FromStr for TaxonId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(TaxonId)
    }
}
