//! Taxon name lookups through a reopened database

use famdb::{OpenMode, Resolution, TaxonId};
use famdb_test::{init_test_logging, TestEnvironment};
use pretty_assertions::assert_eq;

fn built() -> TestEnvironment {
    init_test_logging();
    let env = TestEnvironment::new().unwrap();
    env.build_generation().unwrap();
    env
}

#[test]
fn test_exact_match_ranks_first() {
    let env = built();
    let db = env.open(OpenMode::Read).unwrap();

    let search = db.resolve_species("Mus", None, false);
    let ids: Vec<TaxonId> = search.matches.iter().map(|m| m.taxon_id).collect();
    assert_eq!(ids, vec![TaxonId(10088), TaxonId(10090)]);
    assert!(search.matches[0].exact);
    assert!(!search.matches[1].exact);

    match db.resolve_one_species("Mus", None) {
        Resolution::Found(m) => {
            assert_eq!(m.taxon_id, TaxonId(10088));
            assert_eq!(m.partition, 0);
        }
        other => panic!("Expected a single match, got {:?}", other),
    }
}

#[test]
fn test_three_way_resolution() {
    let env = built();
    let db = env.open(OpenMode::Read).unwrap();

    assert_eq!(
        db.resolve_one_species("9606", None).found().map(|m| m.partition),
        Some(3)
    );
    assert_eq!(db.resolve_one_species("xyzzy", None), Resolution::NotFound);
    assert!(matches!(
        db.resolve_one_species("Homo", None),
        Resolution::Ambiguous(candidates) if candidates.len() == 2
    ));
    assert_eq!(
        db.resolve_one_species("house mouse", Some("genbank common name"))
            .found()
            .map(|m| m.taxon_id),
        Some(TaxonId(10090))
    );
}

#[test]
fn test_phonetic_near_misses() {
    let env = built();
    let db = env.open(OpenMode::Read).unwrap();

    let search = db.resolve_species("Homo sapienz", None, false);
    assert!(search.matches.is_empty());
    assert!(search.similar.iter().any(|m| m.taxon_id == TaxonId(9606)));
}

#[test]
fn test_names_and_sanitized_names() {
    let env = built();
    let db = env.open(OpenMode::Read).unwrap();

    assert_eq!(db.find_taxon(TaxonId(63221)), Some(3));
    assert_eq!(db.taxon_name(TaxonId(9598), "common name").as_deref(), Some("chimpanzee"));
    assert_eq!(db.sanitized_name(TaxonId(10088)).as_deref(), Some("Mus_mouse_genus"));

    let entries = db.resolve_names("Pan troglodytes");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].taxon_id, TaxonId(9598));
    assert!(entries[0].present);
    assert_eq!(entries[0].names.len(), 2);
}

#[test]
fn test_names_of_uninstalled_partition_are_known() {
    let env = built();
    env.remove_partition(5).unwrap();
    let db = env.open(OpenMode::Read).unwrap();

    let entries = db.resolve_names("chimpanzee");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].partition, 5);
    assert!(!entries[0].present);
    assert_eq!(db.families_for_taxon(TaxonId(9598), false, false).unwrap(), None);
}
