//! Entity and structure extraction for the oncology knowledge graph.
//!
//! Turns source tables and statute text into typed records: biomarker
//! mentions from drug descriptions, the 조/항/호/목 hierarchy of law
//! articles, and the references articles make to one another.

pub mod article;
pub mod biomarker;
pub mod normalizer;
pub mod reference;
pub mod schema;
pub mod vocabulary;

pub use article::ArticleParser;
pub use biomarker::BiomarkerMatcher;
pub use normalizer::{normalize_code, normalize_name, stable_id};
pub use reference::{ArticleReference, ReferenceExtractor, ReferenceKind, ReferenceType};
pub use schema::{
    Article, Biomarker, BiomarkerType, Cancer, Disease, DiseaseClass, Drug, Law, LawType, Test,
};
pub use vocabulary::{
    biomarkers, cancer_kcd_table, find_by_loinc, find_by_name, find_by_snomed,
    gene_test_keywords, is_excluded, BiomarkerDef,
};
