//! Global taxon name index held by the root partition

use famdb_core::{FamDbResult, NameRecord, TaxonId, SCIENTIFIC_NAME};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use super::sanitize_name;
use super::soundex::sounds_like;

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonMatch {
    pub taxon_id: TaxonId,
    pub partition: u32,
    /// True if any of the taxon's names matched exactly
    pub exact: bool,
}

/// Result of [`NameIndex::resolve_species`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesSearch {
    /// Matches, exact ones first
    pub matches: Vec<TaxonMatch>,
    /// Phonetic near-misses, only filled when `matches` is empty
    pub similar: Vec<TaxonMatch>,
}

/// Outcome of resolving a term to a single taxon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(TaxonMatch),
    NotFound,
    Ambiguous(Vec<TaxonMatch>),
}

impl Resolution {
    pub fn found(&self) -> Option<&TaxonMatch> {
        match self {
            Resolution::Found(m) => Some(m),
            _ => None,
        }
    }
}

/// Names of every taxon, grouped by the partition that owns the taxon
#[derive(Debug, Clone)]
pub struct NameIndex {
    by_partition: BTreeMap<u32, BTreeMap<TaxonId, Vec<NameRecord>>>,
    owner: HashMap<TaxonId, u32>,
    phonetic_fallback: bool,
}

impl Default for NameIndex {
    fn default() -> Self {
        Self {
            by_partition: BTreeMap::new(),
            owner: HashMap::new(),
            phonetic_fallback: true,
        }
    }
}

/// Serialize one partition's names for storage
pub fn encode_names_blob(names: &BTreeMap<TaxonId, Vec<NameRecord>>) -> FamDbResult<String> {
    Ok(serde_json::to_string(names)?)
}

impl NameIndex {
    pub fn new(phonetic_fallback: bool) -> Self {
        Self {
            phonetic_fallback,
            ..Default::default()
        }
    }

    /// Build the index from stored `(partition, json)` blobs.
    ///
    /// A blob that does not parse is skipped; its taxa are then unknown.
    pub fn from_blobs(blobs: Vec<(u32, String)>, phonetic_fallback: bool) -> Self {
        let mut index = Self::new(phonetic_fallback);
        for (partition, json) in blobs {
            match serde_json::from_str::<BTreeMap<TaxonId, Vec<NameRecord>>>(&json) {
                Ok(names) => index.insert_partition(partition, names),
                Err(e) => warn!("Skipping malformed names of partition {}: {}", partition, e),
            }
        }
        index
    }

    pub fn insert_partition(&mut self, partition: u32, names: BTreeMap<TaxonId, Vec<NameRecord>>) {
        for tax_id in names.keys() {
            if let Some(previous) = self.owner.insert(*tax_id, partition) {
                if previous != partition {
                    warn!(
                        "Taxon {} is listed in partitions {} and {}",
                        tax_id, previous, partition
                    );
                }
            }
        }
        self.by_partition.insert(partition, names);
    }

    pub fn phonetic_fallback(&self) -> bool {
        self.phonetic_fallback
    }

    pub fn len(&self) -> usize {
        self.owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }

    /// Partition owning `tax_id`
    pub fn find_taxon(&self, tax_id: TaxonId) -> Option<u32> {
        self.owner.get(&tax_id).copied()
    }

    pub fn get_taxon_names(&self, tax_id: TaxonId) -> &[NameRecord] {
        self.find_taxon(tax_id)
            .and_then(|p| self.by_partition.get(&p))
            .and_then(|names| names.get(&tax_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First name of class `kind` and the owning partition
    pub fn get_taxon_name(&self, tax_id: TaxonId, kind: &str) -> Option<(&str, u32)> {
        let partition = self.find_taxon(tax_id)?;
        self.get_taxon_names(tax_id)
            .iter()
            .find(|n| n.name_class == kind)
            .map(|n| (n.text.as_str(), partition))
    }

    /// The sanitized scientific name of `tax_id`
    pub fn get_sanitized_name(&self, tax_id: TaxonId) -> Option<String> {
        self.get_taxon_name(tax_id, SCIENTIFIC_NAME)
            .map(|(name, _)| sanitize_name(name))
    }

    /// Every taxon with a name containing `text`, each reported once.
    ///
    /// A taxon counts as exact if any name equals the text, equals it up to
    /// a trailing ` <...>` disambiguator, or has the text as its sanitized
    /// form. `kind` restricts the name classes searched.
    pub fn search_taxon_names(
        &self,
        text: &str,
        kind: Option<&str>,
        search_similar: bool,
    ) -> Vec<TaxonMatch> {
        let text = text.to_lowercase();
        let disambiguated = format!("{} <", text);
        let mut results = Vec::new();

        for (partition, taxa) in &self.by_partition {
            for (tax_id, names) in taxa {
                let mut matches = false;
                let mut exact = false;

                for record in names {
                    if kind.is_some_and(|k| k != record.name_class) {
                        continue;
                    }
                    let name = record.text.to_lowercase();
                    if text == name
                        || name.starts_with(&disambiguated)
                        || text == sanitize_name(&name)
                    {
                        matches = true;
                        exact = true;
                    } else if name.contains(&text) || (search_similar && sounds_like(&text, &name)) {
                        matches = true;
                    }
                }

                if matches {
                    results.push(TaxonMatch {
                        taxon_id: *tax_id,
                        partition: *partition,
                        exact,
                    });
                }
            }
        }

        results
    }

    /// Resolve `term` as a taxon id or a name search.
    ///
    /// Text matches are ordered exact first. When nothing matches and a
    /// phonetic search was not already requested, a "sounds like" search is
    /// tried and its hits are reported in [`SpeciesSearch::similar`].
    pub fn resolve_species(
        &self,
        term: &str,
        kind: Option<&str>,
        search_similar: bool,
    ) -> SpeciesSearch {
        if let Ok(id) = term.trim().parse::<TaxonId>() {
            let matches = self
                .find_taxon(id)
                .map(|partition| TaxonMatch {
                    taxon_id: id,
                    partition,
                    exact: true,
                })
                .into_iter()
                .collect();
            return SpeciesSearch {
                matches,
                similar: Vec::new(),
            };
        }

        let (exact, inexact): (Vec<_>, Vec<_>) = self
            .search_taxon_names(term, kind, search_similar)
            .into_iter()
            .partition(|m| m.exact);
        let matches: Vec<TaxonMatch> = exact.into_iter().chain(inexact).collect();

        let mut similar = Vec::new();
        if matches.is_empty() && !search_similar && self.phonetic_fallback {
            similar = self.search_taxon_names(term, kind, true);
            if !similar.is_empty() {
                info!("No results were found for '{}', but some names sound similar", term);
                for hit in &similar {
                    let names: Vec<&str> = self
                        .get_taxon_names(hit.taxon_id)
                        .iter()
                        .map(|n| n.text.as_str())
                        .collect();
                    info!("  {} {}", hit.taxon_id, names.join(", "));
                }
            }
        }

        SpeciesSearch { matches, similar }
    }

    /// Resolve `term` to exactly one taxon: a single exact match wins, then a
    /// single match of any kind
    pub fn resolve_one_species(&self, term: &str, kind: Option<&str>) -> Resolution {
        let results = self.resolve_species(term, kind, false).matches;

        let exact: Vec<&TaxonMatch> = results.iter().filter(|m| m.exact).collect();
        if exact.len() == 1 {
            return Resolution::Found(*exact[0]);
        }

        match results.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(results[0]),
            n => {
                info!(
                    "Ambiguous search term '{}' (found {} results, {} exact)",
                    term,
                    n,
                    exact.len()
                );
                Resolution::Ambiguous(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(entries: &[(u32, &[(&str, &str)])]) -> BTreeMap<TaxonId, Vec<NameRecord>> {
        entries
            .iter()
            .map(|(id, list)| {
                let id = TaxonId(*id);
                let records = list
                    .iter()
                    .map(|(class, text)| NameRecord::new(id, *class, *text))
                    .collect();
                (id, records)
            })
            .collect()
    }

    fn sample_index() -> NameIndex {
        let mut index = NameIndex::new(true);
        index.insert_partition(
            0,
            names(&[
                (1, &[("scientific name", "root")]),
                (9604, &[("scientific name", "Hominidae"), ("common name", "great apes")]),
                (10088, &[("scientific name", "Mus <mouse, genus>")]),
            ]),
        );
        index.insert_partition(
            4,
            names(&[
                (10090, &[("scientific name", "Mus musculus"), ("genbank common name", "house mouse")]),
                (10092, &[("scientific name", "Mus musculus domesticus")]),
            ]),
        );
        index
    }

    #[test]
    fn test_find_and_names() {
        let index = sample_index();
        assert_eq!(index.find_taxon(TaxonId(10090)), Some(4));
        assert_eq!(index.find_taxon(TaxonId(9606)), None);
        assert_eq!(
            index.get_taxon_name(TaxonId(9604), "common name"),
            Some(("great apes", 0))
        );
        assert_eq!(index.get_taxon_name(TaxonId(9604), "synonym"), None);
        assert_eq!(
            index.get_sanitized_name(TaxonId(10088)).as_deref(),
            Some("Mus_mouse_genus")
        );
        assert_eq!(index.get_taxon_names(TaxonId(10090)).len(), 2);
    }

    #[test]
    fn test_exact_matches_rank_first() {
        let index = sample_index();
        let search = index.resolve_species("Mus", None, false);

        assert_eq!(search.matches[0].taxon_id, TaxonId(10088));
        assert!(search.matches[0].exact);
        assert!(search.matches[1..].iter().all(|m| !m.exact));
        assert_eq!(search.matches.len(), 3);
        assert!(search.similar.is_empty());
    }

    #[test]
    fn test_sanitized_form_is_exact() {
        let index = sample_index();
        let hits = index.search_taxon_names("mus_musculus", None, false);
        assert_eq!(
            hits,
            vec![TaxonMatch { taxon_id: TaxonId(10090), partition: 4, exact: true }]
        );
    }

    #[test]
    fn test_kind_restricts_classes() {
        let index = sample_index();
        let hits = index.search_taxon_names("mouse", Some("genbank common name"), false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].taxon_id, TaxonId(10090));
    }

    #[test]
    fn test_numeric_terms() {
        let index = sample_index();
        let found = index.resolve_species("10090", None, false);
        assert_eq!(found.matches.len(), 1);
        assert!(found.matches[0].exact);
        assert!(index.resolve_species("424242", None, false).matches.is_empty());
    }

    #[test]
    fn test_phonetic_fallback_reports_similar() {
        let index = sample_index();
        let search = index.resolve_species("hominidee", None, false);
        assert!(search.matches.is_empty());
        assert_eq!(search.similar.len(), 1);
        assert_eq!(search.similar[0].taxon_id, TaxonId(9604));

        let mut strict = sample_index();
        strict.phonetic_fallback = false;
        assert!(strict.resolve_species("hominidee", None, false).similar.is_empty());
    }

    #[test]
    fn test_resolve_one_species() {
        let index = sample_index();

        assert_eq!(
            index.resolve_one_species("Mus musculus", None).found().map(|m| m.taxon_id),
            Some(TaxonId(10090))
        );
        assert_eq!(index.resolve_one_species("Hominidae", None).found().map(|m| m.partition), Some(0));
        assert_eq!(index.resolve_one_species("Drosophila", None), Resolution::NotFound);
        match index.resolve_one_species("musculus", None) {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("Expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_blob_round_trip() {
        let blob = encode_names_blob(&names(&[(9606, &[("scientific name", "Homo sapiens")])])).unwrap();
        let index = NameIndex::from_blobs(vec![(3, blob)], true);
        assert_eq!(index.find_taxon(TaxonId(9606)), Some(3));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_malformed_blob_is_skipped() {
        let blob = encode_names_blob(&names(&[(9606, &[("scientific name", "Homo sapiens")])])).unwrap();
        let index = NameIndex::from_blobs(vec![(3, blob), (4, "{not json".to_string())], true);

        assert_eq!(index.find_taxon(TaxonId(9606)), Some(3));
        assert_eq!(
            index.resolve_one_species("Homo sapiens", None).found().map(|m| m.taxon_id),
            Some(TaxonId(9606))
        );
        assert_eq!(index.find_taxon(TaxonId(10090)), None);
    }
}
