//! Transposable element family records

use serde::{Deserialize, Serialize};
use std::fmt;

use super::taxonomy::TaxonId;

/// A transposable element family, made up of metadata and a model.
///
/// Every field except `accession` is optional; absent values are not stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Family {
    // Core family metadata
    pub accession: String,
    pub name: Option<String>,
    pub version: Option<u32>,
    pub consensus: Option<String>,
    pub length: Option<u64>,

    // Optional family metadata
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub classification_note: Option<String>,
    pub search_stages: Option<String>,
    pub buffer_stages: Option<String>,
    pub clades: Vec<TaxonId>,
    pub date_created: Option<String>,
    pub date_modified: Option<String>,
    pub repeat_type: Option<String>,
    pub repeat_subtype: Option<String>,
    pub features: Option<String>,
    pub coding_sequences: Option<String>,
    pub aliases: Option<String>,
    pub citations: Option<String>,
    pub refineable: Option<bool>,
    pub target_site_cons: Option<String>,

    // Metadata available when a model is present
    pub model: Option<String>,
    pub max_length: Option<u64>,
    pub is_model_masked: Option<bool>,
    pub seed_count: Option<u32>,
    pub build_method: Option<String>,
    pub search_method: Option<String>,
    pub taxa_thresholds: Option<String>,
    pub general_cutoff: Option<f64>,
}

impl Family {
    pub fn new(accession: impl Into<String>) -> Self {
        Self {
            accession: accession.into(),
            ..Default::default()
        }
    }

    /// The accession with `.version` appended if the version is known
    pub fn accession_with_optional_version(&self) -> String {
        match self.version {
            Some(v) => format!("{}.{}", self.accession, v),
            None => self.accession.clone(),
        }
    }

    /// RepeatMasker type plus subtype, e.g. `DNA/CMC-EnSpm`
    pub fn full_repeat_type(&self) -> Option<String> {
        let rtype = self.repeat_type.as_deref()?;
        Some(match self.repeat_subtype.as_deref() {
            Some(sub) if !sub.is_empty() => format!("{}/{}", rtype, sub),
            _ => rtype.to_string(),
        })
    }

    pub fn has_consensus(&self) -> bool {
        self.consensus.as_deref().is_some_and(|c| !c.is_empty())
    }

    pub fn has_model(&self) -> bool {
        self.model.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Search stages as trimmed strings
    pub fn search_stage_list(&self) -> Vec<String> {
        split_stages(self.search_stages.as_deref())
    }

    /// Buffer stages with their `[start-end]` ranges removed
    pub fn buffer_stage_list(&self) -> Vec<String> {
        split_stages(self.buffer_stages.as_deref())
            .into_iter()
            .map(|s| s.split('[').next().unwrap_or_default().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Every stage this family is indexed under, search stages first
    pub fn all_stages(&self) -> Vec<String> {
        let mut stages = self.search_stage_list();
        for stage in self.buffer_stage_list() {
            if !stages.contains(&stage) {
                stages.push(stage);
            }
        }
        stages
    }
}

fn split_stages(stages: Option<&str>) -> Vec<String> {
    stages
        .map(|s| {
            s.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Families are curated unless their accession is of the form `DR<9 digits>`
pub fn is_curated_accession(accession: &str) -> bool {
    let uncurated = accession.len() == 11
        && accession.starts_with("DR")
        && accession[2..].bytes().all(|b| b.is_ascii_digit());
    !uncurated
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} '{}': {} len={}",
            self.accession,
            self.version.map(|v| v.to_string()).unwrap_or_else(|| "None".into()),
            self.name.as_deref().unwrap_or("None"),
            self.classification.as_deref().unwrap_or("None"),
            self.length.map(|l| l as i64).unwrap_or(-1)
        )
    }
}
