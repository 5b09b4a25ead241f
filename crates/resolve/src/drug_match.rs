//! Drug → Biomarker and Drug → Cancer linking.

use extract::biomarker::BiomarkerMatcher;
use extract::normalizer::normalize_name;
use extract::schema::{Cancer, Drug};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Drug → Biomarker edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    pub atc_code: String,
    pub biomarker_id: String,
}

/// Drug → Cancer edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatedFor {
    pub atc_code: String,
    pub cancer_id: String,
}

/// Runs the monograph matcher over every drug's mechanism text and
/// ATC level-3 class name.
pub fn link_targets(drugs: &[Drug]) -> Vec<Targets> {
    let matcher = BiomarkerMatcher::new();
    let mut edges = Vec::new();
    for drug in drugs {
        for def in matcher.extract(&drug.mechanism_of_action, &drug.atc_level3) {
            edges.push(Targets {
                atc_code: drug.atc_code.clone(),
                biomarker_id: def.entity_id(),
            });
        }
    }
    debug!(edges = edges.len(), drugs = drugs.len(), "linked drugs to targets");
    edges
}

/// A drug is indicated for a cancer when one of the cancer's announced
/// ingredient tags equals the drug's Korean or English ingredient name
/// after normalization.
pub fn link_indications(drugs: &[Drug], cancers: &[Cancer]) -> Vec<IndicatedFor> {
    let mut edges = Vec::new();
    for cancer in cancers {
        let tags: Vec<String> = cancer.tags.iter().map(|t| normalize_name(t)).collect();
        if tags.is_empty() {
            continue;
        }
        for drug in drugs {
            let ko = normalize_name(&drug.ingredient_ko);
            let en = normalize_name(&drug.ingredient_en);
            if tags.iter().any(|t| *t == ko || *t == en) {
                edges.push(IndicatedFor {
                    atc_code: drug.atc_code.clone(),
                    cancer_id: cancer.cancer_id.clone(),
                });
            }
        }
    }
    debug!(edges = edges.len(), "linked drugs to indications");
    edges
}
