//! The fully-assembled load: every node and edge record, validated as a
//! whole before a single write happens.

use std::collections::{HashMap, HashSet};

use extract::schema::{self, Article, Biomarker, Cancer, Disease, Drug, Law, Test};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use resolve::{
    CancerHasBiomarker, CancerType, HasBiomarker, IndicatedFor, IsA, ResolvedReference, Targets,
    TestedBy,
};
use tracing::debug;

use crate::error::GraphError;

#[derive(Debug, Default)]
pub struct GraphDataset {
    pub drugs: Vec<Drug>,
    pub diseases: Vec<Disease>,
    pub biomarkers: Vec<Biomarker>,
    pub tests: Vec<Test>,
    pub cancers: Vec<Cancer>,
    pub laws: Vec<Law>,
    pub articles: Vec<Article>,

    pub has_biomarker: Vec<HasBiomarker>,
    pub cancer_biomarkers: Vec<CancerHasBiomarker>,
    pub tested_by: Vec<TestedBy>,
    pub targets: Vec<Targets>,
    pub indicated_for: Vec<IndicatedFor>,
    pub cancer_types: Vec<CancerType>,
    pub is_a: Vec<IsA>,
    pub references: Vec<ResolvedReference>,
}

impl GraphDataset {
    /// Checks every structural invariant. Any violation aborts the load
    /// before the first write.
    pub fn validate(&self) -> Result<(), GraphError> {
        let drugs = unique_keys("Drug", self.drugs.iter().map(|d| d.atc_code.as_str()))?;
        let diseases = unique_keys("Disease", self.diseases.iter().map(|d| d.kcd_code.as_str()))?;
        let biomarkers = unique_keys(
            "Biomarker",
            self.biomarkers.iter().map(|b| b.biomarker_id.as_str()),
        )?;
        let tests = unique_keys("Test", self.tests.iter().map(|t| t.test_id.as_str()))?;
        let cancers = unique_keys("Cancer", self.cancers.iter().map(|c| c.cancer_id.as_str()))?;
        let laws = unique_keys("Law", self.laws.iter().map(|l| l.law_id.as_str()))?;
        let articles = unique_keys("Article", self.articles.iter().map(|a| a.article_id.as_str()))?;

        self.check_cancer_codes()?;
        self.check_article_tree(&laws)?;
        self.check_disease_tree()?;

        for e in &self.has_biomarker {
            require(&diseases, &e.kcd_code, "HAS_BIOMARKER", "Disease")?;
            require(&biomarkers, &e.biomarker_id, "HAS_BIOMARKER", "Biomarker")?;
        }
        for e in &self.cancer_biomarkers {
            require(&cancers, &e.cancer_id, "HAS_BIOMARKER", "Cancer")?;
            require(&biomarkers, &e.biomarker_id, "HAS_BIOMARKER", "Biomarker")?;
        }
        for e in &self.tested_by {
            require(&biomarkers, &e.biomarker_id, "TESTED_BY", "Biomarker")?;
            require(&tests, &e.test_id, "TESTED_BY", "Test")?;
        }
        for e in &self.targets {
            require(&drugs, &e.atc_code, "TARGETS", "Drug")?;
            require(&biomarkers, &e.biomarker_id, "TARGETS", "Biomarker")?;
        }
        for e in &self.indicated_for {
            require(&drugs, &e.atc_code, "INDICATED_FOR", "Drug")?;
            require(&cancers, &e.cancer_id, "INDICATED_FOR", "Cancer")?;
        }
        for e in &self.cancer_types {
            require(&diseases, &e.kcd_code, "CANCER_TYPE", "Disease")?;
            require(&cancers, &e.cancer_id, "CANCER_TYPE", "Cancer")?;
        }
        for e in &self.is_a {
            require(&diseases, &e.child_kcd_code, "IS_A", "Disease")?;
            require(&diseases, &e.parent_kcd_code, "IS_A", "Disease")?;
        }
        for e in &self.references {
            require(&articles, &e.source_article_id, "REFERS_TO", "Article")?;
            require(&articles, &e.target_article_id, "REFERS_TO", "Article")?;
        }

        debug!("dataset validated");
        Ok(())
    }

    /// `is_cancer` must agree with the code itself.
    fn check_cancer_codes(&self) -> Result<(), GraphError> {
        for disease in &self.diseases {
            if disease.is_cancer != schema::is_cancer_code(&disease.kcd_code) {
                return Err(GraphError::SchemaViolation(format!(
                    "disease {} has is_cancer={} but the code says otherwise",
                    disease.kcd_code, disease.is_cancer
                )));
            }
        }
        Ok(())
    }

    /// Every non-root article has exactly one loaded parent one level up,
    /// and the parent structure is acyclic.
    fn check_article_tree(&self, laws: &HashSet<&str>) -> Result<(), GraphError> {
        let depths: HashMap<&str, u8> = self
            .articles
            .iter()
            .map(|a| (a.article_id.as_str(), a.depth))
            .collect();
        let mut tree: DiGraphMap<&str, ()> = DiGraphMap::new();

        for article in &self.articles {
            if !laws.contains(article.law_id.as_str()) {
                return Err(GraphError::SchemaViolation(format!(
                    "article {} belongs to unloaded law {}",
                    article.article_id, article.law_id
                )));
            }
            match (&article.parent_article_id, article.depth) {
                (None, 0) => {}
                (None, d) => {
                    return Err(GraphError::SchemaViolation(format!(
                        "article {} has depth {d} but no parent",
                        article.article_id
                    )));
                }
                (Some(parent), d) => {
                    let Some(parent_depth) = depths.get(parent.as_str()) else {
                        return Err(GraphError::SchemaViolation(format!(
                            "article {} has unloaded parent {parent}",
                            article.article_id
                        )));
                    };
                    if parent_depth + 1 != d {
                        return Err(GraphError::SchemaViolation(format!(
                            "article {} at depth {d} under parent at depth {parent_depth}",
                            article.article_id
                        )));
                    }
                    tree.add_edge(parent.as_str(), article.article_id.as_str(), ());
                }
            }
        }

        if is_cyclic_directed(&tree) {
            return Err(GraphError::SchemaViolation(
                "article hierarchy contains a cycle".to_string(),
            ));
        }
        Ok(())
    }

    /// IS_A is a forest: one parent per disease, no cycles.
    fn check_disease_tree(&self) -> Result<(), GraphError> {
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut tree: DiGraphMap<&str, ()> = DiGraphMap::new();

        for edge in &self.is_a {
            let child = edge.child_kcd_code.as_str();
            let parent = edge.parent_kcd_code.as_str();
            if let Some(existing) = parents.insert(child, parent) {
                if existing != parent {
                    return Err(GraphError::SchemaViolation(format!(
                        "disease {child} has two parents: {existing} and {parent}"
                    )));
                }
            }
            tree.add_edge(child, parent, ());
        }

        if is_cyclic_directed(&tree) {
            return Err(GraphError::SchemaViolation(
                "disease hierarchy contains a cycle".to_string(),
            ));
        }
        Ok(())
    }

    /// Input-row counts per relationship type, for verification.
    pub fn relationship_row_counts(&self) -> Vec<(&'static str, usize)> {
        let has_child = self.articles.iter().filter(|a| a.depth > 0).count();
        let same_law = self.references.iter().filter(|r| !r.cross_law).count();
        let cross_law = self.references.iter().filter(|r| r.cross_law).count();
        vec![
            ("HAS_BIOMARKER", self.has_biomarker.len() + self.cancer_biomarkers.len()),
            ("TESTED_BY", self.tested_by.len()),
            ("TARGETS", self.targets.len()),
            ("INDICATED_FOR", self.indicated_for.len()),
            ("CANCER_TYPE", self.cancer_types.len()),
            ("IS_A", self.is_a.len()),
            ("HAS_CHILD", has_child),
            ("REFERS_TO", same_law),
            ("CROSS_LAW_REFERS_TO", cross_law),
        ]
    }
}

fn unique_keys<'a>(
    label: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, GraphError> {
    let mut set = HashSet::new();
    for id in ids {
        if !set.insert(id) {
            return Err(GraphError::SchemaViolation(format!(
                "duplicate {label} key: {id}"
            )));
        }
    }
    Ok(set)
}

fn require(
    set: &HashSet<&str>,
    id: &str,
    relationship: &str,
    label: &str,
) -> Result<(), GraphError> {
    if set.contains(id) {
        Ok(())
    } else {
        Err(GraphError::SchemaViolation(format!(
            "{relationship} references missing {label} {id}"
        )))
    }
}
