//! Biomarker resolution for laboratory-test rows.
//!
//! Resolution is a priority cascade: LOINC code, then SNOMED CT code,
//! then keyword matching on the test name. Code lookups are
//! authoritative; the keyword step is a flagged last resort and only
//! runs on rows that name a gene-level assay category.

use extract::biomarker::BiomarkerMatcher;
use extract::schema::Test;
use extract::vocabulary;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which cascade step produced a test-biomarker link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Loinc,
    Snomed,
    Keyword,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Loinc => "loinc",
            MatchType::Snomed => "snomed",
            MatchType::Keyword => "keyword",
        }
    }
}

/// Biomarker → Test edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestedBy {
    pub biomarker_id: String,
    pub test_id: String,
    pub match_type: MatchType,
}

/// Runs the cascade over every test row, filling `biomarker_name` in
/// place. Rows no step matches keep `biomarker_name = None` and produce
/// no edge.
pub fn resolve_tests(tests: &mut [Test]) -> Vec<TestedBy> {
    let matcher = BiomarkerMatcher::new();
    let mut edges = Vec::new();

    for test in tests.iter_mut() {
        let Some((def, match_type)) = resolve_one(test, &matcher) else {
            continue;
        };
        test.biomarker_name = Some(def.name.to_string());
        edges.push(TestedBy {
            biomarker_id: def.entity_id(),
            test_id: test.test_id.clone(),
            match_type,
        });
    }

    debug!(
        resolved = edges.len(),
        total = tests.len(),
        "resolved test rows to biomarkers"
    );
    edges
}

fn resolve_one(
    test: &Test,
    matcher: &BiomarkerMatcher,
) -> Option<(&'static vocabulary::BiomarkerDef, MatchType)> {
    if let Some(code) = test.loinc_code.as_deref() {
        if let Some(def) = vocabulary::find_by_loinc(code) {
            return Some((def, MatchType::Loinc));
        }
    }
    if let Some(code) = test.snomed_ct_id.as_deref() {
        if let Some(def) = vocabulary::find_by_snomed(code) {
            return Some((def, MatchType::Snomed));
        }
    }
    keyword_match(&test.name_ko, matcher).map(|def| (def, MatchType::Keyword))
}

/// Keyword fallback: the name must carry a gene-test category keyword
/// and a recognizable marker keyword, and neither may be on the
/// exclusion list.
fn keyword_match(name: &str, matcher: &BiomarkerMatcher) -> Option<&'static vocabulary::BiomarkerDef> {
    let category = vocabulary::gene_test_keywords()
        .iter()
        .copied()
        .find(|kw| name.contains(kw) && !vocabulary::is_excluded(kw))?;
    let def = matcher
        .extract(name, "")
        .into_iter()
        .find(|def| !vocabulary::is_excluded(def.name))?;
    debug!(category, marker = def.name, "keyword fallback matched test name");
    Some(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::normalizer::stable_id;

    fn test_row(edi: &str, name: &str, loinc: Option<&str>, snomed: Option<&str>) -> Test {
        Test {
            test_id: stable_id(&["test", edi]),
            edi_code: edi.to_string(),
            name_ko: name.to_string(),
            loinc_code: loinc.map(str::to_string),
            snomed_ct_id: snomed.map(str::to_string),
            biomarker_name: None,
        }
    }

    #[test]
    fn test_loinc_resolution_for_her2() {
        let mut rows = vec![test_row(
            "B5831",
            "HER2 유전자검사 [실시간중합효소연쇄반응]",
            Some("48675-3"),
            None,
        )];
        let edges = resolve_tests(&mut rows);

        assert_eq!(rows[0].biomarker_name.as_deref(), Some("HER2"));
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].match_type, MatchType::Loinc);
        assert_eq!(edges[0].test_id, rows[0].test_id);
    }

    #[test]
    fn test_snomed_used_when_loinc_is_absent() {
        let mut rows = vec![test_row("B6001", "BRAF 돌연변이검사", None, Some("416941005"))];
        let edges = resolve_tests(&mut rows);

        assert_eq!(rows[0].biomarker_name.as_deref(), Some("BRAF"));
        assert_eq!(edges[0].match_type, MatchType::Snomed);
    }

    #[test]
    fn test_code_match_wins_over_keyword() {
        // Name mentions EGFR; the LOINC code says HER2. The code wins.
        let mut rows = vec![test_row(
            "B5900",
            "EGFR 유전자검사",
            Some("48675-3"),
            None,
        )];
        resolve_tests(&mut rows);
        assert_eq!(rows[0].biomarker_name.as_deref(), Some("HER2"));
    }

    #[test]
    fn test_keyword_fallback_needs_gene_test_context() {
        let mut with_context = vec![test_row("B7001", "EGFR 유전자검사", None, None)];
        let edges = resolve_tests(&mut with_context);
        assert_eq!(with_context[0].biomarker_name.as_deref(), Some("EGFR"));
        assert_eq!(edges[0].match_type, MatchType::Keyword);

        let mut without_context = vec![test_row("B7002", "EGFR 정량", None, None)];
        let edges = resolve_tests(&mut without_context);
        assert_eq!(without_context[0].biomarker_name, None);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_unmatched_row_stays_null() {
        let mut rows = vec![test_row("B0001", "일반혈액검사", None, None)];
        let edges = resolve_tests(&mut rows);
        assert_eq!(rows[0].biomarker_name, None);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_match_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MatchType::Loinc).unwrap(), "\"loinc\"");
        assert_eq!(MatchType::Keyword.as_str(), "keyword");
    }
}
