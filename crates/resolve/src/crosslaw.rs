//! Reference resolution over the loaded article hierarchy.
//!
//! A citation resolves to the 조 of its target law first, then descends
//! one level when a clause number is given. Nothing is ever invented: a
//! citation whose law or 조 is not in the load goes to the unresolved
//! side report instead of becoming an edge.

use std::collections::{HashMap, HashSet};

use extract::reference::{ArticleReference, ReferenceExtractor, ReferenceKind, ReferenceType};
use extract::schema::{Article, Law};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Article → Article edge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub source_article_id: String,
    pub target_article_id: String,
    pub reference_type: ReferenceType,
    pub cross_law: bool,
}

/// Side-report entry for a citation that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub source_article_id: String,
    pub raw: String,
    pub target_law: Option<String>,
    pub article_number: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ReferenceResolution {
    pub resolved: Vec<ResolvedReference>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Lookup structure over every loaded law and article.
pub struct ArticleIndex {
    laws_by_name: HashMap<String, String>,
    /// law_id → (article_number → id of the 조).
    roots: HashMap<String, HashMap<String, String>>,
    /// 조 id → [(clause_number, clause id)].
    clauses: HashMap<String, Vec<(u32, String)>>,
}

impl ArticleIndex {
    pub fn build(laws: &[Law], articles: &[Article]) -> Self {
        let laws_by_name = laws
            .iter()
            .map(|l| (l.law_name.trim().to_string(), l.law_id.clone()))
            .collect();

        let mut roots: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut clauses: HashMap<String, Vec<(u32, String)>> = HashMap::new();
        for article in articles {
            if article.depth == 0 {
                roots
                    .entry(article.law_id.clone())
                    .or_default()
                    .insert(article.article_number.clone(), article.article_id.clone());
            } else if article.depth == 1 {
                if let (Some(parent), Some(clause)) =
                    (&article.parent_article_id, article.clause_number)
                {
                    clauses
                        .entry(parent.clone())
                        .or_default()
                        .push((clause, article.article_id.clone()));
                }
            }
        }

        Self { laws_by_name, roots, clauses }
    }

    /// Extracts and resolves every citation in every article body.
    /// Duplicate citations of the same target collapse to one edge.
    pub fn resolve_references(&self, articles: &[Article]) -> ReferenceResolution {
        let extractor = ReferenceExtractor::new();
        let mut out = ReferenceResolution::default();
        let mut seen: HashSet<(String, String, ReferenceType, bool)> = HashSet::new();

        for article in articles {
            for reference in extractor.extract(&article.full_text) {
                match self.resolve_one(article, &reference) {
                    Outcome::Resolved(edge) => {
                        let key = (
                            edge.source_article_id.clone(),
                            edge.target_article_id.clone(),
                            edge.reference_type,
                            edge.cross_law,
                        );
                        if seen.insert(key) {
                            out.resolved.push(edge);
                        }
                    }
                    Outcome::Unresolved(entry) => out.unresolved.push(entry),
                    Outcome::Skipped => {}
                }
            }
        }

        info!(
            resolved = out.resolved.len(),
            unresolved = out.unresolved.len(),
            "resolved article references"
        );
        out
    }

    fn resolve_one(&self, source: &Article, reference: &ArticleReference) -> Outcome {
        // Relative and pronoun mentions carry no addressable target.
        if matches!(reference.kind, ReferenceKind::Relative | ReferenceKind::Pronoun) {
            return Outcome::Skipped;
        }
        let Some(article_number) = reference.article_number.as_deref() else {
            return Outcome::Skipped;
        };

        let cross_law = reference.kind == ReferenceKind::CrossLaw;
        let law_id = if cross_law {
            let name = reference.target_law.as_deref().unwrap_or_default().trim();
            match self.laws_by_name.get(name) {
                Some(id) => id.as_str(),
                None => return Outcome::Unresolved(self.miss(source, reference, "law not loaded")),
            }
        } else {
            source.law_id.as_str()
        };

        let Some(root) = self.roots.get(law_id).and_then(|by_num| by_num.get(article_number))
        else {
            return Outcome::Unresolved(self.miss(source, reference, "article not found"));
        };

        let target = match reference.clause_number {
            Some(n) => self.clause_child(root, n).unwrap_or(root),
            None => root,
        };

        if *target == source.article_id {
            debug!(article = %source.article_id, "self mention skipped");
            return Outcome::Skipped;
        }

        Outcome::Resolved(ResolvedReference {
            source_article_id: source.article_id.clone(),
            target_article_id: target.clone(),
            reference_type: reference.reference_type,
            cross_law,
        })
    }

    fn clause_child(&self, root: &str, clause_number: u32) -> Option<&String> {
        self.clauses
            .get(root)?
            .iter()
            .find(|(n, _)| *n == clause_number)
            .map(|(_, id)| id)
    }

    fn miss(
        &self,
        source: &Article,
        reference: &ArticleReference,
        reason: &str,
    ) -> UnresolvedReference {
        UnresolvedReference {
            source_article_id: source.article_id.clone(),
            raw: reference.raw.clone(),
            target_law: reference.target_law.clone(),
            article_number: reference.article_number.clone(),
            reason: reason.to_string(),
        }
    }
}

enum Outcome {
    Resolved(ResolvedReference),
    Unresolved(UnresolvedReference),
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::schema::LawType;

    fn law(id: &str, name: &str) -> Law {
        Law {
            law_id: id.to_string(),
            law_name: name.to_string(),
            law_type: LawType::Statute,
        }
    }

    fn article(id: &str, law_id: &str, number: &str, depth: u8, text: &str) -> Article {
        Article {
            article_id: id.to_string(),
            law_id: law_id.to_string(),
            article_number: number.to_string(),
            article_title: None,
            depth,
            clause_number: None,
            subclause_number: None,
            item_number: None,
            full_text: text.to_string(),
            parent_article_id: None,
        }
    }

    fn clause(id: &str, law_id: &str, number: &str, n: u32, parent: &str) -> Article {
        Article {
            clause_number: Some(n),
            parent_article_id: Some(parent.to_string()),
            ..article(id, law_id, number, 1, "")
        }
    }

    fn fixture() -> (Vec<Law>, Vec<Article>) {
        let laws = vec![law("L1", "국민건강보험법"), law("L2", "의료법")];
        let articles = vec![
            article("L1/제7조", "L1", "제7조", 0, ""),
            article("L1/제11조", "L1", "제11조", 0, ""),
            article("L2/제27조", "L2", "제27조", 0, ""),
            clause("L2/제27조/제1항", "L2", "제27조", 1, "L2/제27조"),
        ];
        (laws, articles)
    }

    fn resolve_text(text: &str) -> ReferenceResolution {
        let (laws, mut articles) = fixture();
        articles[0].full_text = text.to_string();
        let index = ArticleIndex::build(&laws, &articles);
        index.resolve_references(&articles)
    }

    #[test]
    fn test_same_law_citation_resolves_in_place() {
        let out = resolve_text("보험급여에 관하여는 제11조의 규정을 준용한다.");
        assert_eq!(out.resolved.len(), 1);
        let edge = &out.resolved[0];
        assert_eq!(edge.source_article_id, "L1/제7조");
        assert_eq!(edge.target_article_id, "L1/제11조");
        assert_eq!(edge.reference_type, ReferenceType::Application);
        assert!(!edge.cross_law);
    }

    #[test]
    fn test_cross_law_citation_descends_to_the_clause() {
        let out = resolve_text("「의료법」 제27조제1항에 따라 자격을 확인한다.");
        let edge = &out.resolved[0];
        assert_eq!(edge.target_article_id, "L2/제27조/제1항");
        assert!(edge.cross_law);
    }

    #[test]
    fn test_missing_clause_falls_back_to_the_article() {
        let out = resolve_text("「의료법」 제27조제3항에 따라 조치한다.");
        assert_eq!(out.resolved[0].target_article_id, "L2/제27조");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_unknown_law_goes_to_the_side_report() {
        let out = resolve_text("「약사법」 제1조에 따른다.");
        assert!(out.resolved.is_empty());
        assert_eq!(out.unresolved.len(), 1);
        let miss = &out.unresolved[0];
        assert_eq!(miss.target_law.as_deref(), Some("약사법"));
        assert_eq!(miss.reason, "law not loaded");
    }

    #[test]
    fn test_missing_article_goes_to_the_side_report() {
        let out = resolve_text("「의료법」 제99조에 따른다.");
        assert!(out.resolved.is_empty());
        let miss = &out.unresolved[0];
        assert_eq!(miss.article_number.as_deref(), Some("제99조"));
        assert_eq!(miss.reason, "article not found");
    }

    #[test]
    fn test_self_mention_makes_no_edge() {
        let (laws, mut articles) = fixture();
        articles[1].full_text = "이 경우 제11조의 기준에 따른다.".to_string();
        let index = ArticleIndex::build(&laws, &articles);
        let out = index.resolve_references(&articles);
        assert!(out.resolved.is_empty());
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn test_repeated_citation_collapses_to_one_edge() {
        let out = resolve_text("제11조에 따르며, 제11조에 따른 기준을 적용한다.");
        assert_eq!(out.resolved.len(), 1);
    }

    #[test]
    fn test_relative_mentions_make_no_edges() {
        let out = resolve_text("같은 조 제2항의 기준에 따른다.");
        assert!(out.resolved.is_empty());
        assert!(out.unresolved.is_empty());
    }
}
