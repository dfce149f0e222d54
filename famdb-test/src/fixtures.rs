//! Test fixtures
//!
//! The sample generation has four partitions:
//!
//! | partition | taxa                                   |
//! |-----------|----------------------------------------|
//! | 0 (root)  | 1 root, 9604 Hominidae, 10088 Mus      |
//! | 3         | 9606 Homo sapiens, 63221 H. s. neanderthalensis |
//! | 4         | 10090 Mus musculus                     |
//! | 5         | 9598 Pan troglodytes                   |

use famdb::{Family, FileMap, PartitionEntry, TaxonId, TaxonomyDump};
use famdb_core::SCIENTIFIC_NAME;

/// File name prefix of the sample generation
pub const PREFIX: &str = "sample";

const TAXA: &[(u32, Option<u32>, &str)] = &[
    (1, None, "root"),
    (9604, Some(1), "Hominidae"),
    (10088, Some(1), "Mus <mouse, genus>"),
    (9606, Some(9604), "Homo sapiens"),
    (63221, Some(9606), "Homo sapiens neanderthalensis"),
    (10090, Some(10088), "Mus musculus"),
    (9598, Some(9604), "Pan troglodytes"),
];

const OTHER_NAMES: &[(u32, &str, &str)] = &[
    (9604, "common name", "great apes"),
    (9606, "genbank common name", "human"),
    (10090, "genbank common name", "house mouse"),
    (9598, "common name", "chimpanzee"),
];

/// The sample taxonomy with scientific and common names
pub fn sample_taxonomy() -> TaxonomyDump {
    let mut dump = TaxonomyDump::new();
    for (id, parent, _) in TAXA {
        dump.add_taxon(TaxonId(*id), parent.map(TaxonId));
    }
    for (id, _, name) in TAXA {
        dump.add_name(TaxonId(*id), SCIENTIFIC_NAME, *name)
            .expect("Failed to add scientific name");
    }
    for (id, class, name) in OTHER_NAMES {
        dump.add_name(TaxonId(*id), *class, *name)
            .expect("Failed to add name");
    }
    dump
}

fn entry(t_root: u32, name: &str, nodes: &[u32]) -> PartitionEntry {
    PartitionEntry {
        t_root: TaxonId(t_root),
        t_root_name: name.to_string(),
        f_roots: vec![TaxonId(t_root)],
        f_roots_names: vec![name.to_string()],
        nodes: nodes.iter().copied().map(TaxonId).collect(),
        ..Default::default()
    }
}

/// Layout of the sample generation
pub fn sample_file_map() -> FileMap {
    let mut map = FileMap::default();
    map.file_map.insert(0, entry(1, "root", &[1, 9604, 10088]));
    map.file_map.insert(3, entry(9606, "Homo sapiens", &[9606, 63221]));
    map.file_map.insert(4, entry(10090, "Mus musculus", &[10090]));
    map.file_map.insert(5, entry(9598, "Pan troglodytes", &[9598]));
    map.meta.db_version = "3.8".to_string();
    map.meta.db_date = "2024-01-01".to_string();
    map
}

fn family(
    accession: &str,
    name: &str,
    clades: &[u32],
    search_stages: &str,
    repeat: (&str, &str),
) -> Family {
    let mut family = Family::new(accession);
    family.name = Some(name.to_string());
    family.version = Some(1);
    family.clades = clades.iter().copied().map(TaxonId).collect();
    family.search_stages = Some(search_stages.to_string());
    family.repeat_type = Some(repeat.0.to_string());
    family.repeat_subtype = Some(repeat.1.to_string());
    family.consensus = Some("ACGTACGTAC".to_string());
    family.length = Some(10);
    family
}

/// Families spread over every sample partition.
///
/// `DR000000001` is uncurated and attached to two leaf partitions; `MER1`
/// carries a model but no consensus.
pub fn sample_families() -> Vec<Family> {
    let mut families = vec![
        family("DF0000001", "MIR", &[1], "35,50", ("SINE", "MIR")),
        family("DF0000002", "AluY", &[9604], "35", ("SINE", "Alu")),
        family("DF0000003", "L1HS", &[9606], "35,50", ("LINE", "L1")),
        family("DF0000004", "B1_Mus1", &[10090], "35", ("SINE", "Alu")),
        family("DF0000005", "PtERV1", &[9598], "50", ("LTR", "ERV1")),
        family("DR000000001", "Uncurated_1", &[9606, 9598], "35", ("DNA", "hAT")),
        family("DF0000006", "MER1", &[10088], "35", ("DNA", "hAT-Charlie")),
    ];

    families[1].buffer_stages = Some("10[1-50]".to_string());
    families[6].consensus = None;
    families[6].model = Some("HMMER3/f".to_string());
    families[0].model = Some("HMMER3/f".to_string());
    families
}
