//! Curated oncology vocabulary: the biomarkers the extractor recognizes,
//! their clinical code mappings, and the token lists that keep keyword
//! matching honest. This data is the authority the resolver cascades over;
//! string heuristics never override it.

use crate::schema::BiomarkerType;

/// One curated biomarker with every surface form and code the pipeline
/// matches on.
#[derive(Debug, Clone, Copy)]
pub struct BiomarkerDef {
    pub name: &'static str,
    pub gene: &'static str,
    pub kind: BiomarkerType,
    /// Korean surface forms, matched by substring on raw text.
    pub korean_forms: &'static [&'static str],
    pub loinc_codes: &'static [&'static str],
    pub snomed_ids: &'static [&'static str],
    /// Disease codes whose patients this marker is tested in.
    pub kcd_codes: &'static [&'static str],
}

impl BiomarkerDef {
    /// Stable node id; every edge record pointing at this marker uses it.
    pub fn entity_id(&self) -> String {
        let normalized = crate::normalizer::normalize_name(self.name);
        crate::normalizer::stable_id(&["biomarker", &normalized])
    }
}

static BIOMARKERS: &[BiomarkerDef] = &[
    BiomarkerDef {
        name: "EGFR",
        gene: "EGFR",
        kind: BiomarkerType::Protein,
        korean_forms: &["상피세포성장인자수용체", "상피세포 성장인자 수용체"],
        loinc_codes: &["21667-1", "62862-8"],
        snomed_ids: &["445271007"],
        kcd_codes: &["C34"],
    },
    BiomarkerDef {
        name: "HER2",
        gene: "ERBB2",
        kind: BiomarkerType::Protein,
        korean_forms: &["사람상피세포성장인자수용체2", "인간표피성장인자수용체2"],
        loinc_codes: &["48675-3", "18474-7"],
        snomed_ids: &["423748002"],
        kcd_codes: &["C50", "C16"],
    },
    BiomarkerDef {
        name: "ALK",
        gene: "ALK",
        kind: BiomarkerType::FusionGene,
        korean_forms: &["역형성림프종인산화효소"],
        loinc_codes: &["77028-0"],
        snomed_ids: &["445407005"],
        kcd_codes: &["C34"],
    },
    BiomarkerDef {
        name: "ROS1",
        gene: "ROS1",
        kind: BiomarkerType::FusionGene,
        korean_forms: &[],
        loinc_codes: &["93141-0"],
        snomed_ids: &[],
        kcd_codes: &["C34"],
    },
    BiomarkerDef {
        name: "BRAF",
        gene: "BRAF",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["21717-4"],
        snomed_ids: &["416941005"],
        kcd_codes: &["C43", "C18", "C73"],
    },
    BiomarkerDef {
        name: "KRAS",
        gene: "KRAS",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["21702-6"],
        snomed_ids: &["409874007"],
        kcd_codes: &["C18", "C19", "C20", "C25", "C34"],
    },
    BiomarkerDef {
        name: "NRAS",
        gene: "NRAS",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["21719-0"],
        snomed_ids: &[],
        kcd_codes: &["C18", "C43"],
    },
    BiomarkerDef {
        name: "BRCA1",
        gene: "BRCA1",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["21639-0", "38530-2"],
        snomed_ids: &["412734009"],
        kcd_codes: &["C50", "C56"],
    },
    BiomarkerDef {
        name: "BRCA2",
        gene: "BRCA2",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["21640-8"],
        snomed_ids: &["412738007"],
        kcd_codes: &["C50", "C56", "C61"],
    },
    BiomarkerDef {
        name: "PD-1",
        gene: "PDCD1",
        kind: BiomarkerType::Protein,
        korean_forms: &["예정세포사단백질1"],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C34", "C43"],
    },
    BiomarkerDef {
        name: "PD-L1",
        gene: "CD274",
        kind: BiomarkerType::Protein,
        korean_forms: &["예정세포사리간드1"],
        loinc_codes: &["83052-1"],
        snomed_ids: &["420954001"],
        kcd_codes: &["C34", "C16", "C67"],
    },
    BiomarkerDef {
        name: "CD20",
        gene: "MS4A1",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &["17788-1"],
        snomed_ids: &[],
        kcd_codes: &["C82", "C83", "C85", "C91"],
    },
    BiomarkerDef {
        name: "CD19",
        gene: "CD19",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &["8117-4"],
        snomed_ids: &[],
        kcd_codes: &["C83", "C91"],
    },
    BiomarkerDef {
        name: "CD30",
        gene: "TNFRSF8",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &["10882-9"],
        snomed_ids: &[],
        kcd_codes: &["C81", "C84"],
    },
    BiomarkerDef {
        name: "CD33",
        gene: "CD33",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C92"],
    },
    BiomarkerDef {
        name: "CD38",
        gene: "CD38",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &["17705-5"],
        snomed_ids: &[],
        kcd_codes: &["C90"],
    },
    BiomarkerDef {
        name: "ER",
        gene: "ESR1",
        kind: BiomarkerType::Protein,
        korean_forms: &["에스트로겐 수용체", "에스트로겐수용체"],
        loinc_codes: &["16112-5"],
        snomed_ids: &["416053008"],
        kcd_codes: &["C50"],
    },
    BiomarkerDef {
        name: "PR",
        gene: "PGR",
        kind: BiomarkerType::Protein,
        korean_forms: &["프로게스테론 수용체", "프로게스테론수용체"],
        loinc_codes: &["16113-3"],
        snomed_ids: &["416561008"],
        kcd_codes: &["C50"],
    },
    BiomarkerDef {
        name: "AR",
        gene: "AR",
        kind: BiomarkerType::Protein,
        korean_forms: &["안드로겐 수용체", "안드로겐수용체"],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C61"],
    },
    BiomarkerDef {
        name: "VEGF",
        gene: "VEGFA",
        kind: BiomarkerType::Protein,
        korean_forms: &["혈관내피성장인자"],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C18", "C64"],
    },
    BiomarkerDef {
        name: "VEGFR2",
        gene: "KDR",
        kind: BiomarkerType::Protein,
        korean_forms: &["혈관내피성장인자수용체2"],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C16", "C22"],
    },
    BiomarkerDef {
        name: "MET",
        gene: "MET",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["62864-4"],
        snomed_ids: &[],
        kcd_codes: &["C34"],
    },
    BiomarkerDef {
        name: "RET",
        gene: "RET",
        kind: BiomarkerType::FusionGene,
        korean_forms: &[],
        loinc_codes: &["21728-1"],
        snomed_ids: &[],
        kcd_codes: &["C34", "C73"],
    },
    BiomarkerDef {
        name: "NTRK1",
        gene: "NTRK1",
        kind: BiomarkerType::FusionGene,
        korean_forms: &[],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C34", "C18"],
    },
    BiomarkerDef {
        name: "PIK3CA",
        gene: "PIK3CA",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["94393-6"],
        snomed_ids: &[],
        kcd_codes: &["C50"],
    },
    BiomarkerDef {
        name: "IDH1",
        gene: "IDH1",
        kind: BiomarkerType::Enzyme,
        korean_forms: &[],
        loinc_codes: &["94409-0"],
        snomed_ids: &[],
        kcd_codes: &["C71", "C92"],
    },
    BiomarkerDef {
        name: "IDH2",
        gene: "IDH2",
        kind: BiomarkerType::Enzyme,
        korean_forms: &[],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C71", "C92"],
    },
    BiomarkerDef {
        name: "JAK2",
        gene: "JAK2",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["29769-7"],
        snomed_ids: &["405823003"],
        kcd_codes: &["D45", "D47"],
    },
    BiomarkerDef {
        name: "BCR-ABL1",
        gene: "ABL1",
        kind: BiomarkerType::FusionGene,
        korean_forms: &["필라델피아염색체"],
        loinc_codes: &["21860-2"],
        snomed_ids: &["426217000"],
        kcd_codes: &["C91", "C92"],
    },
    BiomarkerDef {
        name: "FLT3",
        gene: "FLT3",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["49021-9"],
        snomed_ids: &[],
        kcd_codes: &["C92"],
    },
    BiomarkerDef {
        name: "KIT",
        gene: "KIT",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &["56493-1"],
        snomed_ids: &[],
        kcd_codes: &["C49", "C16"],
    },
    BiomarkerDef {
        name: "FGFR2",
        gene: "FGFR2",
        kind: BiomarkerType::FusionGene,
        korean_forms: &[],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C22", "C67"],
    },
    BiomarkerDef {
        name: "FGFR3",
        gene: "FGFR3",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &[],
        snomed_ids: &[],
        kcd_codes: &["C67"],
    },
    BiomarkerDef {
        name: "TP53",
        gene: "TP53",
        kind: BiomarkerType::Mutation,
        korean_forms: &[],
        loinc_codes: &["21668-9"],
        snomed_ids: &[],
        kcd_codes: &["C91"],
    },
    BiomarkerDef {
        name: "MLH1",
        gene: "MLH1",
        kind: BiomarkerType::Protein,
        korean_forms: &[],
        loinc_codes: &["21756-2"],
        snomed_ids: &[],
        kcd_codes: &["C18", "C54"],
    },
];

/// Tokens that look like markers in lab-test names but are not: units,
/// vitamins, and generic chemistry panels.
static EXCLUDED_TOKENS: &[&str] = &[
    "MG", "ML", "IU", "KG", "DL", "PH", "HB", "CA", "NA", "CL",
    "VITAMIN", "비타민", "ALBUMIN", "알부민", "GLUCOSE", "포도당",
    "CHOLESTEROL", "콜레스테롤", "CREATININE",
];

/// Test-name keywords that mark a row as a gene-level assay. Keyword
/// biomarker matching is only allowed on rows carrying one of these.
static GENE_TEST_KEYWORDS: &[&str] = &[
    "유전자검사",
    "유전자 검사",
    "유전자돌연변이",
    "염색체검사",
    "분자병리",
    "중합효소연쇄반응",
    "제자리부합",
    "FISH",
    "PCR",
    "NGS",
];

/// Curated cancer-name to KCD-category mapping.
#[derive(Debug, Clone, Copy)]
pub struct CancerKcdEntry {
    pub name_kr: &'static str,
    pub kcd_codes: &'static [&'static str],
}

static CANCER_KCD_TABLE: &[CancerKcdEntry] = &[
    CancerKcdEntry { name_kr: "유방암", kcd_codes: &["C50"] },
    CancerKcdEntry { name_kr: "위암", kcd_codes: &["C16"] },
    CancerKcdEntry { name_kr: "폐암", kcd_codes: &["C34"] },
    CancerKcdEntry { name_kr: "대장암", kcd_codes: &["C18", "C19", "C20"] },
    CancerKcdEntry { name_kr: "간암", kcd_codes: &["C22"] },
    CancerKcdEntry { name_kr: "췌장암", kcd_codes: &["C25"] },
    CancerKcdEntry { name_kr: "식도암", kcd_codes: &["C15"] },
    CancerKcdEntry { name_kr: "갑상선암", kcd_codes: &["C73"] },
    CancerKcdEntry { name_kr: "전립선암", kcd_codes: &["C61"] },
    CancerKcdEntry { name_kr: "난소암", kcd_codes: &["C56"] },
    CancerKcdEntry { name_kr: "자궁경부암", kcd_codes: &["C53"] },
    CancerKcdEntry { name_kr: "신장암", kcd_codes: &["C64"] },
    CancerKcdEntry { name_kr: "방광암", kcd_codes: &["C67"] },
    CancerKcdEntry { name_kr: "흑색종", kcd_codes: &["C43"] },
    CancerKcdEntry { name_kr: "뇌종양", kcd_codes: &["C71"] },
    CancerKcdEntry { name_kr: "백혈병", kcd_codes: &["C91", "C92", "C95"] },
    CancerKcdEntry { name_kr: "악성림프종", kcd_codes: &["C82", "C83", "C84", "C85"] },
    CancerKcdEntry { name_kr: "다발골수종", kcd_codes: &["C90"] },
];

pub fn biomarkers() -> &'static [BiomarkerDef] {
    BIOMARKERS
}

pub fn cancer_kcd_table() -> &'static [CancerKcdEntry] {
    CANCER_KCD_TABLE
}

pub fn gene_test_keywords() -> &'static [&'static str] {
    GENE_TEST_KEYWORDS
}

pub fn is_excluded(token: &str) -> bool {
    let token = token.trim().to_uppercase();
    EXCLUDED_TOKENS.iter().any(|t| *t == token)
}

pub fn find_by_name(name: &str) -> Option<&'static BiomarkerDef> {
    let name = name.trim().to_uppercase();
    BIOMARKERS.iter().find(|def| def.name == name)
}

pub fn find_by_loinc(code: &str) -> Option<&'static BiomarkerDef> {
    let code = crate::normalizer::normalize_code(code);
    BIOMARKERS
        .iter()
        .find(|def| def.loinc_codes.iter().any(|c| *c == code))
}

pub fn find_by_snomed(code: &str) -> Option<&'static BiomarkerDef> {
    let code = crate::normalizer::normalize_code(code);
    BIOMARKERS
        .iter()
        .find(|def| def.snomed_ids.iter().any(|c| *c == code))
}
