//! Readers for the tabular files the acquisition stage produced.
//!
//! Each reader maps one CSV onto schema entities. Identity keys that no
//! source column supplies (`test_id`, `cancer_id`) are derived here with
//! the same stable-id scheme the resolvers use.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use extract::normalizer::stable_id;
use extract::schema::{Cancer, Disease, DiseaseClass, Drug, Law, Test};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// The sink writes a UTF-8 BOM for spreadsheet tools; strip it so the
/// first header name matches its struct field.
fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    let mut reader = csv::Reader::from_reader(data);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Columns: `atc_code, ingredient_ko, ingredient_en, mechanism_of_action,
/// atc_level1, atc_level2, atc_level3`.
pub fn read_drugs(path: &Path) -> anyhow::Result<Vec<Drug>> {
    let drugs: Vec<Drug> = read_rows(path)?;
    info!(count = drugs.len(), "drug table loaded");
    Ok(drugs)
}

#[derive(Debug, Deserialize)]
struct DiseaseRow {
    kcd_code: String,
    name_kr: String,
    name_en: String,
    is_lowest: bool,
    classification: DiseaseClass,
}

/// Columns: `kcd_code, name_kr, name_en, is_lowest, classification`.
/// `is_cancer` is recomputed from the code, never read from the table.
pub fn read_diseases(path: &Path) -> anyhow::Result<Vec<Disease>> {
    let rows: Vec<DiseaseRow> = read_rows(path)?;
    let diseases: Vec<Disease> = rows
        .into_iter()
        .map(|r| Disease::new(r.kcd_code, r.name_kr, r.name_en, r.is_lowest, r.classification))
        .collect();
    info!(count = diseases.len(), "disease table loaded");
    Ok(diseases)
}

#[derive(Debug, Deserialize)]
struct TestRow {
    edi_code: String,
    name_ko: String,
    #[serde(default)]
    loinc_code: Option<String>,
    #[serde(default)]
    snomed_ct_id: Option<String>,
}

/// Columns: `edi_code, name_ko, loinc_code, snomed_ct_id`. Blank code
/// cells become `None`; `biomarker_name` is filled by the resolver.
pub fn read_tests(path: &Path) -> anyhow::Result<Vec<Test>> {
    let rows: Vec<TestRow> = read_rows(path)?;
    let tests: Vec<Test> = rows
        .into_iter()
        .map(|r| Test {
            test_id: stable_id(&["test", &r.edi_code]),
            edi_code: r.edi_code,
            name_ko: r.name_ko,
            loinc_code: none_if_blank(r.loinc_code),
            snomed_ct_id: none_if_blank(r.snomed_ct_id),
            biomarker_name: None,
        })
        .collect();
    info!(count = tests.len(), "test table loaded");
    Ok(tests)
}

#[derive(Debug, Deserialize)]
struct CancerRow {
    cancer_seq: u32,
    name_kr: String,
    #[serde(default)]
    tags: String,
}

/// Columns: `cancer_seq, name_kr, tags`. `tags` is one `;`-joined cell.
pub fn read_cancers(path: &Path) -> anyhow::Result<Vec<Cancer>> {
    let rows: Vec<CancerRow> = read_rows(path)?;
    let cancers: Vec<Cancer> = rows
        .into_iter()
        .map(|r| Cancer {
            cancer_id: stable_id(&["cancer", &r.cancer_seq.to_string()]),
            name_kr: r.name_kr,
            cancer_seq: r.cancer_seq,
            tags: r
                .tags
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        })
        .collect();
    info!(count = cancers.len(), "cancer table loaded");
    Ok(cancers)
}

/// Columns: `law_id, law_name, law_type` with `law_type` one of
/// 법률, 시행령, 시행규칙.
pub fn read_laws(path: &Path) -> anyhow::Result<Vec<Law>> {
    let laws: Vec<Law> = read_rows(path)?;
    info!(count = laws.len(), "law table loaded");
    Ok(laws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_table(dir: &Path, name: &str, bom: bool, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        if bom {
            file.write_all(UTF8_BOM).unwrap();
        }
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_bom_is_stripped_before_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "drugs.csv",
            true,
            "atc_code,ingredient_ko,ingredient_en,mechanism_of_action,atc_level1,atc_level2,atc_level3\n\
             L01XC03,트라스투주맙,Trastuzumab,anti-HER2 antibody,L,L01,Monoclonal antibodies\n",
        );
        let drugs = read_drugs(&path).unwrap();
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].atc_code, "L01XC03");
        assert_eq!(drugs[0].ingredient_ko, "트라스투주맙");
    }

    #[test]
    fn test_disease_cancer_flag_is_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "diseases.csv",
            false,
            "kcd_code,name_kr,name_en,is_lowest,classification\n\
             C50.1,유방 중앙부의 악성 신생물,Malignant neoplasm of central portion of breast,true,세\n\
             J45,천식,Asthma,false,소\n",
        );
        let diseases = read_diseases(&path).unwrap();
        assert!(diseases[0].is_cancer);
        assert!(!diseases[1].is_cancer);
        assert_eq!(diseases[0].classification, DiseaseClass::Detail);
    }

    #[test]
    fn test_blank_test_codes_become_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "tests.csv",
            false,
            "edi_code,name_ko,loinc_code,snomed_ct_id\n\
             B5831,HER2 유전자검사,48675-3,\n\
             C1234,일반 혈액검사,,\n",
        );
        let tests = read_tests(&path).unwrap();
        assert_eq!(tests[0].loinc_code.as_deref(), Some("48675-3"));
        assert_eq!(tests[0].snomed_ct_id, None);
        assert_eq!(tests[1].loinc_code, None);
        assert!(tests[0].biomarker_name.is_none());
    }

    #[test]
    fn test_same_edi_code_derives_same_test_id() {
        let dir = tempfile::tempdir().unwrap();
        let body = "edi_code,name_ko,loinc_code,snomed_ct_id\nB5831,HER2 유전자검사,,\n";
        let first = read_tests(&write_table(dir.path(), "a.csv", false, body)).unwrap();
        let second = read_tests(&write_table(dir.path(), "b.csv", true, body)).unwrap();
        assert_eq!(first[0].test_id, second[0].test_id);
    }

    #[test]
    fn test_cancer_tags_split_on_semicolon() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "cancers.csv",
            false,
            "cancer_seq,name_kr,tags\n12,유방암,트라스투주맙; 퍼투주맙 ;\n7,췌장암,\n",
        );
        let cancers = read_cancers(&path).unwrap();
        assert_eq!(cancers[0].tags, vec!["트라스투주맙", "퍼투주맙"]);
        assert!(cancers[1].tags.is_empty());
        assert_ne!(cancers[0].cancer_id, cancers[1].cancer_id);
    }

    #[test]
    fn test_law_type_reads_korean_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "laws.csv",
            false,
            "law_id,law_name,law_type\nL-001,국민건강보험법,법률\nL-002,국민건강보험법 시행령,시행령\n",
        );
        let laws = read_laws(&path).unwrap();
        assert_eq!(laws[0].law_type.as_str(), "법률");
        assert_eq!(laws[1].law_type.as_str(), "시행령");
    }

    #[test]
    fn test_malformed_row_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "cancers.csv",
            false,
            "cancer_seq,name_kr,tags\nnot-a-number,유방암,\n",
        );
        assert!(read_cancers(&path).is_err());
    }
}
