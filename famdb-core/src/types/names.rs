use serde::{Deserialize, Serialize};

use super::taxonomy::TaxonId;

/// Name class used for display names
pub const SCIENTIFIC_NAME: &str = "scientific name";

/// One name of a taxon, e.g. ("scientific name", "Homo sapiens")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub taxon_id: TaxonId,
    pub name_class: String,
    pub text: String,
}

impl NameRecord {
    pub fn new(taxon_id: TaxonId, name_class: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            taxon_id,
            name_class: name_class.into(),
            text: text.into(),
        }
    }
}
