//! Deterministic storage buckets for accessions
//!
//! Dfam-style accessions (`DF0000001`, `DR000123456`) are spread over
//! `Families/<kind>/<g1>/<g2>` so no single bucket grows unbounded. Anything
//! else goes to `Families/Aux/<first two characters>`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::keys::GROUP_FAMILIES;

static ACCESSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]{2})([0-9]{2})([0-9]{2})[0-9]{3,6}$").expect("valid accession pattern")
});

/// Map an accession to its bucket path
pub fn accession_bin(accession: &str) -> String {
    if let Some(caps) = ACCESSION_PATTERN.captures(accession) {
        return format!("{}/{}/{}/{}", GROUP_FAMILIES, &caps[1], &caps[2], &caps[3]);
    }

    let prefix: String = accession.chars().take(2).collect();
    format!("{}/Aux/{}", GROUP_FAMILIES, prefix.to_lowercase())
}

/// Full key of a family record: `<bucket>/<accession>`
pub fn family_key(accession: &str) -> String {
    format!("{}/{}", accession_bin(accession), accession)
}

/// Recover the accession from a family key produced by [`family_key`]
pub fn accession_from_key(key: &str) -> Option<&str> {
    key.match_indices('/')
        .map(|(idx, _)| &key[idx + 1..])
        .find(|candidate| !candidate.is_empty() && family_key(candidate) == key)
}
