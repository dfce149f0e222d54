//! Generation-level metadata shared by every partition of one database

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::AddAssign;

use super::taxonomy::TaxonId;

/// The partition layout written to every partition's `file_info` attribute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMap {
    pub file_map: BTreeMap<u32, PartitionEntry>,
    #[serde(default)]
    pub meta: GenerationMeta,
}

/// One partition's entry in the [`FileMap`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionEntry {
    /// Top of the taxonomy subtree held by this partition
    #[serde(rename = "T_root")]
    pub t_root: TaxonId,
    #[serde(rename = "T_root_name")]
    pub t_root_name: String,
    /// Roots of the family-bearing subtrees
    #[serde(rename = "F_roots", default)]
    pub f_roots: Vec<TaxonId>,
    #[serde(rename = "F_roots_names", default)]
    pub f_roots_names: Vec<String>,
    pub filename: String,
    #[serde(default)]
    pub bytes: u64,
    /// Every taxon owned by this partition
    #[serde(default)]
    pub nodes: Vec<TaxonId>,
}

/// Identifiers shared by all partitions produced in one partitioning run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub partition_id: String,
    pub db_version: String,
    pub db_date: String,
}

/// Database-wide release information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInfo {
    pub name: String,
    pub version: String,
    pub date: String,
    pub description: String,
    pub copyright: String,
}

/// Per-file metadata as reported by `info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub generator: String,
    pub version: String,
    pub created: String,
    pub partition_name: String,
    pub partition_detail: String,
}

/// Number of consensus sequences and HMMs stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub consensus: u64,
    pub hmm: u64,
}

impl AddAssign for Counts {
    fn add_assign(&mut self, other: Self) {
        self.consensus += other.consensus;
        self.hmm += other.hmm;
    }
}

impl FileMap {
    pub fn partition(&self, num: u32) -> Option<&PartitionEntry> {
        self.file_map.get(&num)
    }

    pub fn partition_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.file_map.keys().copied()
    }

    /// Taxa owned by each partition, as listed in the `nodes` entries
    pub fn partition_nodes(&self) -> BTreeMap<u32, Vec<TaxonId>> {
        self.file_map
            .iter()
            .map(|(num, entry)| (*num, entry.nodes.clone()))
            .collect()
    }
}

impl PartitionEntry {
    /// `F_roots_names` joined for display
    pub fn detail(&self) -> String {
        self.f_roots_names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAP_JSON: &str = r#"{
        "file_map": {
            "0": {"T_root": 1, "T_root_name": "root", "F_roots": [1],
                  "F_roots_names": ["root"], "filename": "dfam.0.famdb",
                  "bytes": 1024, "nodes": [1, 9604]},
            "3": {"T_root": 9606, "T_root_name": "Homo sapiens", "F_roots": [9606],
                  "F_roots_names": ["Homo sapiens", "Hominidae"], "filename": "dfam.3.famdb"}
        },
        "meta": {"partition_id": "abc", "db_version": "3.8", "db_date": "2024-01-01"}
    }"#;

    #[test]
    fn test_parse_file_map() {
        let map: FileMap = serde_json::from_str(MAP_JSON).unwrap();

        assert_eq!(map.partition_numbers().collect::<Vec<_>>(), vec![0, 3]);
        let root = map.partition(0).unwrap();
        assert_eq!(root.t_root, TaxonId(1));
        assert_eq!(root.nodes, vec![TaxonId(1), TaxonId(9604)]);

        let human = map.partition(3).unwrap();
        assert_eq!(human.bytes, 0);
        assert!(human.nodes.is_empty());
        assert_eq!(human.detail(), "Homo sapiens, Hominidae");
        assert_eq!(map.meta.db_version, "3.8");
    }

    #[test]
    fn test_file_map_keeps_stored_key_names() {
        let map: FileMap = serde_json::from_str(MAP_JSON).unwrap();
        let json = serde_json::to_value(&map).unwrap();

        assert_eq!(json["file_map"]["3"]["T_root_name"], "Homo sapiens");
        assert_eq!(json["file_map"]["0"]["F_roots"][0], 1);
        assert_eq!(json["meta"]["partition_id"], "abc");
    }

    #[test]
    fn test_counts_accumulate() {
        let mut total = Counts::default();
        total += Counts { consensus: 3, hmm: 1 };
        total += Counts { consensus: 2, hmm: 2 };
        assert_eq!(total, Counts { consensus: 5, hmm: 3 });
    }
}
