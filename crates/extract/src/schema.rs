use serde::{Deserialize, Serialize};

/// KCD classification levels, chapter down to the finest billing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiseaseClass {
    #[serde(rename = "대")]
    Major,
    #[serde(rename = "중")]
    Middle,
    #[serde(rename = "소")]
    Minor,
    #[serde(rename = "세")]
    Detail,
}

impl DiseaseClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiseaseClass::Major => "대",
            DiseaseClass::Middle => "중",
            DiseaseClass::Minor => "소",
            DiseaseClass::Detail => "세",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomarkerType {
    Protein,
    Mutation,
    FusionGene,
    Enzyme,
}

impl BiomarkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiomarkerType::Protein => "protein",
            BiomarkerType::Mutation => "mutation",
            BiomarkerType::FusionGene => "fusion_gene",
            BiomarkerType::Enzyme => "enzyme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LawType {
    #[serde(rename = "법률")]
    Statute,
    #[serde(rename = "시행령")]
    EnforcementDecree,
    #[serde(rename = "시행규칙")]
    EnforcementRule,
}

impl LawType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LawType::Statute => "법률",
            LawType::EnforcementDecree => "시행령",
            LawType::EnforcementRule => "시행규칙",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drug {
    pub atc_code: String,
    pub ingredient_ko: String,
    pub ingredient_en: String,
    pub mechanism_of_action: String,
    pub atc_level1: String,
    pub atc_level2: String,
    pub atc_level3: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disease {
    pub kcd_code: String,
    pub name_kr: String,
    pub name_en: String,
    pub is_cancer: bool,
    /// True when no finer code exists under this one.
    pub is_lowest: bool,
    pub classification: DiseaseClass,
}

impl Disease {
    /// `is_cancer` is derived from the code, never trusted from the input
    /// table.
    pub fn new(
        kcd_code: impl Into<String>,
        name_kr: impl Into<String>,
        name_en: impl Into<String>,
        is_lowest: bool,
        classification: DiseaseClass,
    ) -> Self {
        let kcd_code = kcd_code.into();
        let is_cancer = is_cancer_code(&kcd_code);
        Self {
            kcd_code,
            name_kr: name_kr.into(),
            name_en: name_en.into(),
            is_cancer,
            is_lowest,
            classification,
        }
    }
}

/// Neoplasm codes: the whole C chapter, plus D00–D48 (in situ and
/// uncertain-behavior neoplasms).
pub fn is_cancer_code(kcd_code: &str) -> bool {
    let code = kcd_code.trim().to_ascii_uppercase();
    let mut chars = code.chars();
    match chars.next() {
        Some('C') => true,
        Some('D') => {
            let digits: String = chars.take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return false;
            }
            digits.parse::<u32>().map(|n| n <= 48).unwrap_or(false)
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Biomarker {
    pub biomarker_id: String,
    pub name_en: String,
    pub name_ko: String,
    #[serde(rename = "type")]
    pub biomarker_type: BiomarkerType,
    pub gene: String,
    /// Curated disease codes this marker is clinically tied to.
    pub kcd_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub test_id: String,
    pub edi_code: String,
    pub name_ko: String,
    pub loinc_code: Option<String>,
    pub snomed_ct_id: Option<String>,
    /// Filled by the resolver; `None` when no cascade step matched.
    pub biomarker_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancer {
    pub cancer_id: String,
    pub name_kr: String,
    pub cancer_seq: u32,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Law {
    pub law_id: String,
    pub law_name: String,
    pub law_type: LawType,
}

/// One node of the 조/항/호/목 hierarchy. `depth` is always
/// `parent.depth + 1`; only a 조 has no parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub article_id: String,
    pub law_id: String,
    /// The 조 this node belongs to, e.g. `제3조` or `제12조의2`.
    pub article_number: String,
    pub article_title: Option<String>,
    pub depth: u8,
    pub clause_number: Option<u32>,
    pub subclause_number: Option<u32>,
    pub item_number: Option<String>,
    pub full_text: String,
    pub parent_article_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kcd_cancer_rule() {
        assert!(is_cancer_code("C50.1"));
        assert!(is_cancer_code("C00"));
        assert!(is_cancer_code("D00"));
        assert!(is_cancer_code("D48.9"));
        assert!(!is_cancer_code("D49"));
        assert!(!is_cancer_code("D50"));
        assert!(!is_cancer_code("M06.9"));
        assert!(!is_cancer_code(""));
    }

    #[test]
    fn test_disease_constructor_derives_is_cancer() {
        let d = Disease::new(
            "C50.1",
            "유방 중앙부의 악성 신생물",
            "Malignant neoplasm of central portion of breast",
            true,
            DiseaseClass::Detail,
        );
        assert!(d.is_cancer);

        let d = Disease::new(
            "E11",
            "2형 당뇨병",
            "Type 2 diabetes mellitus",
            false,
            DiseaseClass::Minor,
        );
        assert!(!d.is_cancer);
    }

    #[test]
    fn test_classification_serializes_to_korean() {
        assert_eq!(serde_json::to_string(&DiseaseClass::Major).unwrap(), "\"대\"");
        let back: DiseaseClass = serde_json::from_str("\"세\"").unwrap();
        assert_eq!(back, DiseaseClass::Detail);
    }

    #[test]
    fn test_law_type_serializes_to_korean() {
        assert_eq!(
            serde_json::to_string(&LawType::EnforcementDecree).unwrap(),
            "\"시행령\""
        );
    }
}
