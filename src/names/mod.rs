//! Taxon name handling: sanitizing, phonetic codes and the global name index

pub mod index;
pub mod soundex;

use once_cell::sync::Lazy;
use regex::Regex;

pub use index::{encode_names_blob, NameIndex, Resolution, SpeciesSearch, TaxonMatch};
pub use soundex::{sounds_like, soundex};

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s,_]+").expect("valid separator pattern"));
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()<>']+").expect("valid punctuation pattern"));

/// The "sanitized" form of a taxon name, as used in file names and exports.
///
/// Runs of whitespace, commas and underscores become a single `_`;
/// parentheses, angle brackets and apostrophes are removed.
pub fn sanitize_name(name: &str) -> String {
    let name = SEPARATORS.replace_all(name, "_");
    PUNCTUATION.replace_all(&name, "").into_owned()
}
