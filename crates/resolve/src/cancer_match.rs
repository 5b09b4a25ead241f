//! Disease → Cancer and Cancer → Biomarker linking.
//!
//! The curated cancer-name table is the only authority. An exact name
//! match carries confidence 0.95, a containment fallback 0.8, and
//! nothing weaker is linked at all.

use extract::schema::{Cancer, Disease};
use extract::vocabulary::{self, CancerKcdEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::disease_match::{code_covers, OFFICIAL_KCD_MAPPING};

/// How a cancer name matched the curated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMatch {
    Exact,
    Partial,
}

impl NameMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameMatch::Exact => "exact",
            NameMatch::Partial => "partial",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            NameMatch::Exact => 0.95,
            NameMatch::Partial => 0.8,
        }
    }
}

/// Disease → Cancer edge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancerType {
    pub kcd_code: String,
    pub cancer_id: String,
    pub confidence: f64,
    pub match_type: NameMatch,
}

/// Cancer → Biomarker edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancerHasBiomarker {
    pub cancer_id: String,
    pub biomarker_id: String,
    pub mapping_method: String,
}

/// Looks a cancer name up in the curated table: a full exact pass
/// first, containment only when no exact entry exists anywhere.
pub fn table_entry(name_kr: &str) -> Option<(&'static CancerKcdEntry, NameMatch)> {
    let name = name_kr.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(entry) = vocabulary::cancer_kcd_table().iter().find(|e| e.name_kr == name) {
        return Some((entry, NameMatch::Exact));
    }
    vocabulary::cancer_kcd_table()
        .iter()
        .find(|e| name.contains(e.name_kr) || e.name_kr.contains(name))
        .map(|entry| (entry, NameMatch::Partial))
}

/// One edge per (disease, cancer) pair whose codes agree under the
/// prefix rule. Cancers missing from the curated table are skipped.
pub fn link_cancer_types(diseases: &[Disease], cancers: &[Cancer]) -> Vec<CancerType> {
    let mut edges = Vec::new();
    for cancer in cancers {
        let Some((entry, name_match)) = table_entry(&cancer.name_kr) else {
            warn!(name = %cancer.name_kr, "cancer name not in curated table, skipping");
            continue;
        };
        for disease in diseases {
            let covered = entry
                .kcd_codes
                .iter()
                .any(|curated| code_covers(curated, &disease.kcd_code));
            if covered {
                edges.push(CancerType {
                    kcd_code: disease.kcd_code.clone(),
                    cancer_id: cancer.cancer_id.clone(),
                    confidence: name_match.confidence(),
                    match_type: name_match,
                });
            }
        }
    }
    debug!(edges = edges.len(), "linked diseases to cancer types");
    edges
}

/// Cancer → Biomarker edges wherever the curated code sets overlap.
pub fn link_cancer_biomarkers(cancers: &[Cancer]) -> Vec<CancerHasBiomarker> {
    let mut edges = Vec::new();
    for cancer in cancers {
        let Some((entry, _)) = table_entry(&cancer.name_kr) else {
            continue;
        };
        for def in vocabulary::biomarkers() {
            let overlaps = entry.kcd_codes.iter().any(|c| {
                def.kcd_codes
                    .iter()
                    .any(|d| code_covers(c, d) || code_covers(d, c))
            });
            if overlaps {
                edges.push(CancerHasBiomarker {
                    cancer_id: cancer.cancer_id.clone(),
                    biomarker_id: def.entity_id(),
                    mapping_method: OFFICIAL_KCD_MAPPING.to_string(),
                });
            }
        }
    }
    edges
}
