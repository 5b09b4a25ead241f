//! Conversion of node and edge records into Bolt parameter rows.
//!
//! Node rows are flat maps keyed by property name. Edge rows carry
//! `from`, `to` and a nested `props` map so one UNWIND statement shape
//! serves every relationship type.

use neo4rs::{BoltList, BoltMap, BoltNull, BoltType};

use extract::schema::{Article, Biomarker, Cancer, Disease, Drug, Law, Test};
use resolve::{
    CancerHasBiomarker, CancerType, HasBiomarker, IndicatedFor, IsA, ResolvedReference, Targets,
    TestedBy,
};

fn map(entries: Vec<(&str, BoltType)>) -> BoltType {
    let mut out = BoltMap::new();
    for (key, value) in entries {
        out.put(key.into(), value);
    }
    BoltType::Map(out)
}

fn string(value: &str) -> BoltType {
    BoltType::from(value.to_string())
}

fn opt(value: Option<&str>) -> BoltType {
    match value {
        Some(v) => string(v),
        None => BoltType::Null(BoltNull),
    }
}

fn int(value: i64) -> BoltType {
    BoltType::from(value)
}

fn list(items: &[String]) -> BoltType {
    let mut out = BoltList::new();
    for item in items {
        out.push(string(item));
    }
    BoltType::List(out)
}

fn edge(from: &str, to: &str, props: Vec<(&str, BoltType)>) -> BoltType {
    map(vec![("from", string(from)), ("to", string(to)), ("props", map(props))])
}

pub(crate) fn drug_rows(drugs: &[Drug]) -> Vec<BoltType> {
    drugs
        .iter()
        .map(|d| {
            map(vec![
                ("atc_code", string(&d.atc_code)),
                ("ingredient_ko", string(&d.ingredient_ko)),
                ("ingredient_en", string(&d.ingredient_en)),
                ("mechanism_of_action", string(&d.mechanism_of_action)),
                ("atc_level1", string(&d.atc_level1)),
                ("atc_level2", string(&d.atc_level2)),
                ("atc_level3", string(&d.atc_level3)),
            ])
        })
        .collect()
}

pub(crate) fn disease_rows(diseases: &[Disease]) -> Vec<BoltType> {
    diseases
        .iter()
        .map(|d| {
            map(vec![
                ("kcd_code", string(&d.kcd_code)),
                ("name_kr", string(&d.name_kr)),
                ("name_en", string(&d.name_en)),
                ("is_cancer", BoltType::from(d.is_cancer)),
                ("is_lowest", BoltType::from(d.is_lowest)),
                ("classification", string(d.classification.as_str())),
            ])
        })
        .collect()
}

pub(crate) fn biomarker_rows(biomarkers: &[Biomarker]) -> Vec<BoltType> {
    biomarkers
        .iter()
        .map(|b| {
            map(vec![
                ("biomarker_id", string(&b.biomarker_id)),
                ("name_en", string(&b.name_en)),
                ("name_ko", string(&b.name_ko)),
                ("type", string(b.biomarker_type.as_str())),
                ("gene", string(&b.gene)),
                ("kcd_codes", list(&b.kcd_codes)),
            ])
        })
        .collect()
}

pub(crate) fn test_rows(tests: &[Test]) -> Vec<BoltType> {
    tests
        .iter()
        .map(|t| {
            map(vec![
                ("test_id", string(&t.test_id)),
                ("edi_code", string(&t.edi_code)),
                ("name_ko", string(&t.name_ko)),
                ("loinc_code", opt(t.loinc_code.as_deref())),
                ("snomed_ct_id", opt(t.snomed_ct_id.as_deref())),
                ("biomarker_name", opt(t.biomarker_name.as_deref())),
            ])
        })
        .collect()
}

pub(crate) fn cancer_rows(cancers: &[Cancer]) -> Vec<BoltType> {
    cancers
        .iter()
        .map(|c| {
            map(vec![
                ("cancer_id", string(&c.cancer_id)),
                ("name_kr", string(&c.name_kr)),
                ("cancer_seq", int(i64::from(c.cancer_seq))),
                ("tags", list(&c.tags)),
            ])
        })
        .collect()
}

pub(crate) fn law_rows(laws: &[Law]) -> Vec<BoltType> {
    laws.iter()
        .map(|l| {
            map(vec![
                ("law_id", string(&l.law_id)),
                ("law_name", string(&l.law_name)),
                ("law_type", string(l.law_type.as_str())),
            ])
        })
        .collect()
}

pub(crate) fn article_rows(articles: &[Article]) -> Vec<BoltType> {
    articles
        .iter()
        .map(|a| {
            map(vec![
                ("article_id", string(&a.article_id)),
                ("law_id", string(&a.law_id)),
                ("article_number", string(&a.article_number)),
                ("article_title", opt(a.article_title.as_deref())),
                ("depth", int(i64::from(a.depth))),
                ("clause_number", opt_int(a.clause_number)),
                ("subclause_number", opt_int(a.subclause_number)),
                ("item_number", opt(a.item_number.as_deref())),
                ("full_text", string(&a.full_text)),
            ])
        })
        .collect()
}

fn opt_int(value: Option<u32>) -> BoltType {
    match value {
        Some(v) => int(i64::from(v)),
        None => BoltType::Null(BoltNull),
    }
}

pub(crate) fn has_biomarker_rows(edges: &[HasBiomarker]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| {
            edge(
                &e.kcd_code,
                &e.biomarker_id,
                vec![("mapping_method", string(&e.mapping_method))],
            )
        })
        .collect()
}

pub(crate) fn cancer_biomarker_rows(edges: &[CancerHasBiomarker]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| {
            edge(
                &e.cancer_id,
                &e.biomarker_id,
                vec![("mapping_method", string(&e.mapping_method))],
            )
        })
        .collect()
}

pub(crate) fn tested_by_rows(edges: &[TestedBy]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| {
            edge(
                &e.biomarker_id,
                &e.test_id,
                vec![("match_type", string(e.match_type.as_str()))],
            )
        })
        .collect()
}

pub(crate) fn targets_rows(edges: &[Targets]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| edge(&e.atc_code, &e.biomarker_id, Vec::new()))
        .collect()
}

pub(crate) fn indicated_for_rows(edges: &[IndicatedFor]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| edge(&e.atc_code, &e.cancer_id, Vec::new()))
        .collect()
}

pub(crate) fn cancer_type_rows(edges: &[CancerType]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| {
            edge(
                &e.kcd_code,
                &e.cancer_id,
                vec![
                    ("confidence", BoltType::from(e.confidence)),
                    ("match_type", string(e.match_type.as_str())),
                ],
            )
        })
        .collect()
}

pub(crate) fn is_a_rows(edges: &[IsA]) -> Vec<BoltType> {
    edges
        .iter()
        .map(|e| edge(&e.child_kcd_code, &e.parent_kcd_code, Vec::new()))
        .collect()
}

/// HAS_CHILD rows come straight off the parsed hierarchy.
pub(crate) fn has_child_rows(articles: &[Article]) -> Vec<BoltType> {
    articles
        .iter()
        .filter_map(|a| {
            a.parent_article_id
                .as_deref()
                .map(|parent| edge(parent, &a.article_id, Vec::new()))
        })
        .collect()
}

pub(crate) fn reference_rows(edges: &[ResolvedReference], cross_law: bool) -> Vec<BoltType> {
    edges
        .iter()
        .filter(|e| e.cross_law == cross_law)
        .map(|e| {
            edge(
                &e.source_article_id,
                &e.target_article_id,
                vec![("reference_type", string(e.reference_type.as_str()))],
            )
        })
        .collect()
}
