//! Disease → Biomarker linking over the curated KCD code tables.

use extract::schema::Disease;
use extract::vocabulary;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const OFFICIAL_KCD_MAPPING: &str = "official_kcd_code";

/// Disease → Biomarker edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasBiomarker {
    pub kcd_code: String,
    pub biomarker_id: String,
    pub mapping_method: String,
}

/// A curated category code covers itself and every dotted subcode:
/// `C50` links `C50`, `C50.0` .. `C50.9`, but never `C501` or `C5`.
pub fn code_covers(curated: &str, kcd_code: &str) -> bool {
    kcd_code == curated || kcd_code.starts_with(&format!("{curated}."))
}

/// One edge per (disease, biomarker) pair whose codes agree under the
/// prefix rule.
pub fn link_diseases(diseases: &[Disease]) -> Vec<HasBiomarker> {
    let mut edges = Vec::new();
    for disease in diseases {
        for def in vocabulary::biomarkers() {
            let covered = def
                .kcd_codes
                .iter()
                .any(|curated| code_covers(curated, &disease.kcd_code));
            if covered {
                edges.push(HasBiomarker {
                    kcd_code: disease.kcd_code.clone(),
                    biomarker_id: def.entity_id(),
                    mapping_method: OFFICIAL_KCD_MAPPING.to_string(),
                });
            }
        }
    }
    debug!(edges = edges.len(), diseases = diseases.len(), "linked diseases to biomarkers");
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::schema::DiseaseClass;
    use extract::vocabulary::find_by_name;

    fn disease(code: &str) -> Disease {
        Disease::new(code, "", "", true, DiseaseClass::Detail)
    }

    #[test]
    fn test_prefix_rule_links_subcodes() {
        let diseases = vec![
            disease("C50"),
            disease("C50.1"),
            disease("C50.9"),
            disease("C34.1"),
        ];
        let edges = link_diseases(&diseases);
        let her2 = find_by_name("HER2").unwrap().entity_id();

        let her2_codes: Vec<&str> = edges
            .iter()
            .filter(|e| e.biomarker_id == her2)
            .map(|e| e.kcd_code.as_str())
            .collect();
        assert_eq!(her2_codes, vec!["C50", "C50.1", "C50.9"]);
        assert!(edges.iter().all(|e| e.mapping_method == OFFICIAL_KCD_MAPPING));
    }

    #[test]
    fn test_bare_prefix_is_not_a_dotted_match() {
        assert!(code_covers("C50", "C50.3"));
        assert!(!code_covers("C50", "C501"));
        assert!(!code_covers("C50", "C5"));
        assert!(!code_covers("C50.1", "C50"));
    }

    #[test]
    fn test_d_chapter_markers_link_too() {
        // JAK2 is curated to D45/D47 (myeloproliferative neoplasms).
        let edges = link_diseases(&[disease("D47.1")]);
        let jak2 = find_by_name("JAK2").unwrap().entity_id();
        assert!(edges.iter().any(|e| e.biomarker_id == jak2));
    }

    #[test]
    fn test_unrelated_code_yields_nothing() {
        assert!(link_diseases(&[disease("E11.9")]).is_empty());
    }
}
