//! Family query description and the predicate pipeline applied to each accession

use famdb_core::{is_curated_accession, FamDbError, FamDbResult, Family, TaxonId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::partition::Partition;

/// Stage meaning "every stage"; selects no stage filter
pub const STAGE_ALL: u32 = 80;
/// Stage standing for the union of the RepeatMasker search stages
pub const STAGE_SEARCH_UNION: u32 = 95;

const SEARCH_UNION_STAGES: [&str; 7] = ["35", "50", "55", "60", "65", "70", "75"];

/// Which families to list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyQuery {
    /// Taxon to search; `None` means the whole database
    pub tax_id: Option<TaxonId>,
    pub ancestors: bool,
    pub descendants: bool,
    pub curated_only: bool,
    pub uncurated_only: bool,
    pub stage: Option<u32>,
    /// Require the stage to be one of the family's search stages
    pub is_hmm: bool,
    pub repeat_type: Option<String>,
    pub name: Option<String>,
}

impl FamilyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_taxon(tax_id: TaxonId) -> Self {
        Self {
            tax_id: Some(tax_id),
            ..Default::default()
        }
    }

    pub fn with_ancestors(mut self) -> Self {
        self.ancestors = true;
        self
    }

    pub fn with_descendants(mut self) -> Self {
        self.descendants = true;
        self
    }

    pub fn curated(mut self) -> Self {
        self.curated_only = true;
        self.uncurated_only = false;
        self
    }

    pub fn uncurated(mut self) -> Self {
        self.uncurated_only = true;
        self.curated_only = false;
        self
    }

    pub fn in_stage(mut self, stage: u32) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn hmm(mut self) -> Self {
        self.is_hmm = true;
        self
    }

    pub fn repeat_type(mut self, prefix: impl Into<String>) -> Self {
        self.repeat_type = Some(prefix.into());
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name = Some(prefix.into());
        self
    }

    /// The taxon and directions actually searched
    pub fn target(&self) -> (TaxonId, bool, bool) {
        match self.tax_id {
            Some(id) => (id, self.ancestors, self.descendants),
            None => (TaxonId::ROOT, true, true),
        }
    }

    /// Stage names selected by `stage`; empty means no stage filter
    pub fn stages(&self) -> Vec<String> {
        match self.stage {
            None | Some(STAGE_ALL) => Vec::new(),
            Some(STAGE_SEARCH_UNION) => SEARCH_UNION_STAGES.iter().map(|s| s.to_string()).collect(),
            Some(stage) => vec![stage.to_string()],
        }
    }

    /// The ordered predicate pipeline for this query
    pub(crate) fn predicates(&self, stage_index_plan: bool) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        let stages = self.stages();

        if self.curated_only {
            predicates.push(Predicate::Curated(true));
        } else if self.uncurated_only {
            predicates.push(Predicate::Curated(false));
        }

        if !stages.is_empty() {
            if !stage_index_plan {
                predicates.push(Predicate::InStages(stages.clone()));
            }
            if self.is_hmm {
                predicates.push(Predicate::SearchStages(stages));
            }
        }

        if let Some(prefix) = &self.repeat_type {
            predicates.push(Predicate::RepeatTypePrefix(prefix.to_lowercase()));
        }
        if let Some(prefix) = &self.name {
            predicates.push(Predicate::NamePrefix(prefix.to_lowercase()));
        }

        predicates
    }
}

/// One filter step
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    /// `true` keeps curated families, `false` keeps uncurated ones
    Curated(bool),
    /// Indexed under any of these stages
    InStages(Vec<String>),
    /// One of these stages is among the family's search stages
    SearchStages(Vec<String>),
    RepeatTypePrefix(String),
    NamePrefix(String),
}

impl Predicate {
    pub(crate) fn accepts(&self, family: &mut LazyFamily<'_>) -> FamDbResult<bool> {
        Ok(match self {
            Predicate::Curated(curated) => is_curated_accession(family.accession()) == *curated,
            Predicate::InStages(stages) => family.partition.filter_stages(family.accession(), stages)?,
            Predicate::SearchStages(stages) => family
                .get()?
                .map(|f| f.search_stage_list().iter().any(|s| stages.contains(s)))
                .unwrap_or(false),
            Predicate::RepeatTypePrefix(prefix) => family
                .get()?
                .and_then(Family::full_repeat_type)
                .map(|t| t.to_lowercase().starts_with(prefix.as_str()))
                .unwrap_or(false),
            Predicate::NamePrefix(prefix) => family
                .get()?
                .and_then(|f| f.name.as_deref())
                .map(|n| n.to_lowercase().starts_with(prefix.as_str()))
                .unwrap_or(false),
        })
    }
}

/// An accession whose family record is read on first use, at most once
pub(crate) struct LazyFamily<'a> {
    partition: &'a Partition,
    accession: &'a str,
    family: Option<Option<Family>>,
}

impl<'a> LazyFamily<'a> {
    pub(crate) fn new(partition: &'a Partition, accession: &'a str) -> Self {
        Self {
            partition,
            accession,
            family: None,
        }
    }

    pub(crate) fn accession(&self) -> &str {
        self.accession
    }

    /// The family record; one that cannot be decoded reads as absent
    pub(crate) fn get(&mut self) -> FamDbResult<Option<&Family>> {
        if self.family.is_none() {
            let family = match self.partition.get_family_by_accession(self.accession) {
                Ok(family) => family,
                Err(FamDbError::Serialization(e)) => {
                    warn!("Skipping malformed family {}: {}", self.accession, e);
                    None
                }
                Err(e) => return Err(e),
            };
            self.family = Some(family);
        }
        Ok(self.family.as_ref().and_then(Option::as_ref))
    }

    pub(crate) fn is_loaded(&self) -> bool {
        self.family.is_some()
    }
}

/// Run `predicates` in order, stopping at the first rejection
pub(crate) fn accept_all(predicates: &[Predicate], family: &mut LazyFamily<'_>) -> FamDbResult<bool> {
    for predicate in predicates {
        if !predicate.accepts(family)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use famdb_storage::StoreOptions;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case(None, &[] ; "no stage")]
    #[test_case(Some(80), &[] ; "all stages")]
    #[test_case(Some(35), &["35"] ; "single stage")]
    #[test_case(Some(95), &["35", "50", "55", "60", "65", "70", "75"] ; "search union")]
    fn test_stage_expansion(stage: Option<u32>, expected: &[&str]) {
        let query = FamilyQuery {
            stage,
            ..Default::default()
        };
        assert_eq!(query.stages(), expected.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn test_whole_database_target() {
        assert_eq!(FamilyQuery::new().target(), (TaxonId::ROOT, true, true));
        assert_eq!(
            FamilyQuery::for_taxon(TaxonId(9606)).with_ancestors().target(),
            (TaxonId(9606), true, false)
        );
    }

    #[test]
    fn test_hmm_check_needs_a_stage() {
        let without_stage = FamilyQuery::new().hmm().predicates(false);
        assert!(without_stage.is_empty());

        let with_stage = FamilyQuery::new().in_stage(35).hmm().predicates(false);
        assert_eq!(
            with_stage,
            vec![
                Predicate::InStages(vec!["35".into()]),
                Predicate::SearchStages(vec!["35".into()]),
            ]
        );

        let indexed = FamilyQuery::new().in_stage(35).predicates(true);
        assert!(indexed.is_empty());
    }

    #[test]
    fn test_family_loaded_once_and_only_when_needed() {
        let dir = TempDir::new().unwrap();
        let mut partition =
            Partition::create(dir.path().join("t.0.famdb"), 0, &StoreOptions::development()).unwrap();

        let mut family = Family::new("DF0000001");
        family.name = Some("MIR".into());
        family.repeat_type = Some("SINE".into());
        family.repeat_subtype = Some("MIR".into());
        family.search_stages = Some("35".into());
        partition.add_family(&family).unwrap();

        let mut lazy = LazyFamily::new(&partition, "DF0000001");
        assert!(accept_all(&[Predicate::Curated(true)], &mut lazy).unwrap());
        assert!(!lazy.is_loaded());

        let query = FamilyQuery::new().repeat_type("sine/m").name_prefix("mi").in_stage(35).hmm();
        assert!(accept_all(&query.predicates(false), &mut lazy).unwrap());
        assert!(lazy.is_loaded());

        let mut lazy = LazyFamily::new(&partition, "DF0000001");
        assert!(!accept_all(&FamilyQuery::new().repeat_type("LINE").predicates(false), &mut lazy).unwrap());
        assert!(!accept_all(&[Predicate::Curated(false)], &mut lazy).unwrap());
    }

    #[test]
    fn test_undecodable_family_is_rejected() {
        let dir = TempDir::new().unwrap();
        let partition =
            Partition::create(dir.path().join("t.0.famdb"), 0, &StoreOptions::development()).unwrap();
        partition.store().put_family_bytes("DF0000002", b"\xc1garbage").unwrap();

        let mut lazy = LazyFamily::new(&partition, "DF0000002");
        assert!(lazy.get().unwrap().is_none());
        assert!(lazy.is_loaded());
        assert!(!accept_all(&FamilyQuery::new().name_prefix("a").predicates(false), &mut lazy).unwrap());
        assert!(partition.get_family_by_accession("DF0000002").is_err());
    }
}
