use regex::Regex;
use tracing::debug;

use crate::vocabulary::{self, BiomarkerDef};

/// Finds curated biomarkers named in drug monograph text. English names
/// match on token boundaries; Korean surface forms match by substring.
pub struct BiomarkerMatcher {
    patterns: Vec<(Regex, &'static BiomarkerDef)>,
}

impl BiomarkerMatcher {
    pub fn new() -> Self {
        let patterns = vocabulary::biomarkers()
            .iter()
            .map(|def| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(def.name))).unwrap();
                (re, def)
            })
            .collect();
        Self { patterns }
    }

    /// Markers found in the mechanism-of-action text or the ATC level-3
    /// class name, in first-appearance order, excluded tokens dropped.
    pub fn extract(
        &self,
        mechanism_of_action: &str,
        atc_class_name: &str,
    ) -> Vec<&'static BiomarkerDef> {
        let haystack = format!("{mechanism_of_action} {atc_class_name}");
        let mut hits: Vec<(usize, &'static BiomarkerDef)> = Vec::new();

        for (re, def) in &self.patterns {
            if vocabulary::is_excluded(def.name) {
                continue;
            }
            let english = re.find(&haystack).map(|m| m.start());
            let korean = def
                .korean_forms
                .iter()
                .filter_map(|form| haystack.find(form))
                .min();
            if let Some(pos) = match (english, korean) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            } {
                hits.push((pos, def));
            }
        }

        hits.sort_by_key(|(pos, _)| *pos);
        let markers: Vec<_> = hits.into_iter().map(|(_, def)| def).collect();
        if !markers.is_empty() {
            debug!(count = markers.len(), "biomarkers found in monograph");
        }
        markers
    }
}

impl Default for BiomarkerMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(defs: &[&'static BiomarkerDef]) -> Vec<&'static str> {
        defs.iter().map(|d| d.name).collect()
    }

    #[test]
    fn test_marker_found_in_mechanism_text() {
        let matcher = BiomarkerMatcher::new();
        let found = matcher.extract("HER2 수용체에 결합하는 단일클론항체", "");
        assert_eq!(names(&found), vec!["HER2"]);
    }

    #[test]
    fn test_korean_surface_form_matches() {
        let matcher = BiomarkerMatcher::new();
        let found = matcher.extract("에스트로겐 수용체 길항제", "");
        assert_eq!(names(&found), vec!["ER"]);
    }

    #[test]
    fn test_atc_class_name_contributes() {
        let matcher = BiomarkerMatcher::new();
        let found = matcher.extract("세포주기 정지를 유도", "BRAF 억제제");
        assert_eq!(names(&found), vec!["BRAF"]);
    }

    #[test]
    fn test_token_boundary_blocks_substring_hits() {
        let matcher = BiomarkerMatcher::new();
        // ANDROGEN contains "AR" but not as a token.
        let found = matcher.extract("BLOCKS ANDROGEN SYNTHESIS", "");
        assert!(found.is_empty());
        let found = matcher.extract("AR 길항제", "");
        assert_eq!(names(&found), vec!["AR"]);
    }

    #[test]
    fn test_first_appearance_order_kept() {
        let matcher = BiomarkerMatcher::new();
        let found = matcher.extract("KRAS 및 EGFR 경로를 차단", "");
        assert_eq!(names(&found), vec!["KRAS", "EGFR"]);
    }

    #[test]
    fn test_hyphenated_markers_stay_distinct() {
        let matcher = BiomarkerMatcher::new();
        let found = matcher.extract("PD-L1 발현 종양에 투여", "");
        assert_eq!(names(&found), vec!["PD-L1"]);
    }
}
