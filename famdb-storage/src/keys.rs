//! Key layout inside a partition
//!
//! Keys keep the slash-separated group paths of the FamDB layout so a prefix
//! scan over e.g. `Lookup/ByStage/35/` enumerates one group.

pub const GROUP_FAMILIES: &str = "Families";
pub const GROUP_LOOKUP_BYNAME: &str = "Lookup/ByName";
pub const GROUP_LOOKUP_BYSTAGE: &str = "Lookup/ByStage";
pub const GROUP_NODES: &str = "Taxonomy/Nodes";
pub const GROUP_PARENT_INDEX: &str = "Taxonomy/ParentIndex";
pub const GROUP_TAXANAMES: &str = "Partitions";

/// Scalar attribute names stored in the `attributes` column family
pub mod attrs {
    pub const VERSION: &str = "version";
    pub const GENERATOR: &str = "generator";
    pub const CREATED: &str = "created";
    pub const PARTITION_NUM: &str = "partition_num";
    pub const ROOT: &str = "root";
    pub const FILE_INFO: &str = "file_info";
    pub const DB_NAME: &str = "db_name";
    pub const DB_VERSION: &str = "db_version";
    pub const DB_DATE: &str = "db_date";
    pub const DB_DESCRIPTION: &str = "db_description";
    pub const DB_COPYRIGHT: &str = "db_copyright";
    pub const COUNT_CONSENSUS: &str = "count_consensus";
    pub const COUNT_HMM: &str = "count_hmm";
}

pub fn by_name(name: &str) -> String {
    format!("{}/{}", GROUP_LOOKUP_BYNAME, name)
}

pub fn by_name_prefix() -> String {
    format!("{}/", GROUP_LOOKUP_BYNAME)
}

pub fn by_stage(stage: &str, accession: &str) -> String {
    format!("{}/{}/{}", GROUP_LOOKUP_BYSTAGE, stage, accession)
}

pub fn by_stage_prefix(stage: &str) -> String {
    format!("{}/{}/", GROUP_LOOKUP_BYSTAGE, stage)
}

pub fn node_children(taxon: u32) -> String {
    format!("{}/{}/Children", GROUP_NODES, taxon)
}

pub fn node_parent(taxon: u32) -> String {
    format!("{}/{}/Parent", GROUP_NODES, taxon)
}

pub fn node_family(taxon: u32, accession: &str) -> String {
    format!("{}/{}/Families/{}", GROUP_NODES, taxon, accession)
}

pub fn node_families_prefix(taxon: u32) -> String {
    format!("{}/{}/Families/", GROUP_NODES, taxon)
}

pub fn parent_index(child: u32) -> String {
    format!("{}/{}", GROUP_PARENT_INDEX, child)
}

pub fn taxa_names(partition: u32) -> String {
    format!("{}/{}/TaxaNames", GROUP_TAXANAMES, partition)
}

/// Recover the partition number from a `Partitions/<n>/TaxaNames` key
pub fn parse_taxa_names(key: &str) -> Option<u32> {
    key.strip_prefix(GROUP_TAXANAMES)?
        .strip_prefix('/')?
        .strip_suffix("/TaxaNames")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_paths() {
        assert_eq!(by_name("MIR"), "Lookup/ByName/MIR");
        assert_eq!(by_stage("35", "DF0000001"), "Lookup/ByStage/35/DF0000001");
        assert_eq!(node_children(9606), "Taxonomy/Nodes/9606/Children");
        assert_eq!(node_family(9606, "DF1"), "Taxonomy/Nodes/9606/Families/DF1");
        assert_eq!(parent_index(9606), "Taxonomy/ParentIndex/9606");
    }

    #[test]
    fn test_stage_prefixes_do_not_overlap() {
        assert!(!by_stage("350", "DF1").starts_with(&by_stage_prefix("35")));
        assert!(by_stage("35", "DF1").starts_with(&by_stage_prefix("35")));
    }

    #[test]
    fn test_parse_taxa_names() {
        assert_eq!(parse_taxa_names(&taxa_names(7)), Some(7));
        assert_eq!(parse_taxa_names("Partitions/x/TaxaNames"), None);
        assert_eq!(parse_taxa_names("Partitions/7"), None);
    }
}
