use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Graphemes of context inspected on each side of a reference when
/// classifying it.
const CONTEXT_WINDOW: usize = 50;

// Shared tail of a statutory citation: 조 with optional 항/호/목 chain.
const CITATION: &str =
    r"제(\d+)조(?:의(\d+))?(?:\s*제(\d+)항)?(?:\s*제(\d+)호)?(?:\s*([가나다라마바사아자차카타파하])목)?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    SameLaw,
    CrossLaw,
    Relative,
    Pronoun,
}

/// Legal function of a reference, read off its surrounding text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceType {
    #[serde(rename = "준용")]
    Application,
    #[serde(rename = "위임")]
    Delegation,
    #[serde(rename = "예외")]
    Exception,
    #[serde(rename = "정의")]
    Definition,
    #[serde(rename = "상대참조")]
    RelativeRef,
    #[serde(rename = "일반참조")]
    General,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Application => "준용",
            ReferenceType::Delegation => "위임",
            ReferenceType::Exception => "예외",
            ReferenceType::Definition => "정의",
            ReferenceType::RelativeRef => "상대참조",
            ReferenceType::General => "일반참조",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleReference {
    /// Matched surface text.
    pub raw: String,
    /// Byte offset in the source text.
    pub position: usize,
    pub kind: ReferenceKind,
    pub reference_type: ReferenceType,
    /// Law named inside 「」 for cross-law references.
    pub target_law: Option<String>,
    pub article_number: Option<String>,
    pub clause_number: Option<u32>,
    pub subclause_number: Option<u32>,
    pub item_number: Option<String>,
}

/// Finds every statutory reference in article text and classifies it.
pub struct ReferenceExtractor {
    same_law_re: Regex,
    cross_law_re: Regex,
    relative_re: Regex,
    pronoun_re: Regex,
}

impl ReferenceExtractor {
    pub fn new() -> Self {
        Self {
            same_law_re: Regex::new(CITATION).unwrap(),
            cross_law_re: Regex::new(&format!(r"「([^」]+)」\s*{CITATION}")).unwrap(),
            relative_re: Regex::new(r"같은\s*(법|조|항|호|목)").unwrap(),
            pronoun_re: Regex::new(r"(이|그|동)\s*(법|영|규칙|조)").unwrap(),
        }
    }

    pub fn extract(&self, text: &str) -> Vec<ArticleReference> {
        let mut references = Vec::new();
        let mut cross_spans: Vec<(usize, usize)> = Vec::new();

        for caps in self.cross_law_re.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            cross_spans.push((whole.start(), whole.end()));
            references.push(self.build(
                text,
                whole,
                ReferenceKind::CrossLaw,
                Some(caps[1].trim().to_string()),
                citation_fields(&caps, 2),
            ));
        }

        for caps in self.same_law_re.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            if inside(&cross_spans, whole.start()) {
                continue;
            }
            references.push(self.build(
                text,
                whole,
                ReferenceKind::SameLaw,
                None,
                citation_fields(&caps, 1),
            ));
        }

        for caps in self.relative_re.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            references.push(self.build(text, whole, ReferenceKind::Relative, None, Citation::default()));
        }

        for caps in self.pronoun_re.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            references.push(self.build(text, whole, ReferenceKind::Pronoun, None, Citation::default()));
        }

        references.sort_by_key(|r| r.position);
        references
    }

    fn build(
        &self,
        text: &str,
        whole: regex::Match,
        kind: ReferenceKind,
        target_law: Option<String>,
        citation: Citation,
    ) -> ArticleReference {
        let window = context_window(text, whole.start(), whole.end());
        ArticleReference {
            raw: whole.as_str().to_string(),
            position: whole.start(),
            kind,
            reference_type: classify(window, kind),
            target_law,
            article_number: citation.article_number,
            clause_number: citation.clause_number,
            subclause_number: citation.subclause_number,
            item_number: citation.item_number,
        }
    }
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct Citation {
    article_number: Option<String>,
    clause_number: Option<u32>,
    subclause_number: Option<u32>,
    item_number: Option<String>,
}

/// Reads the citation groups out of a match; `base` is the index of the
/// article-number group (the cross-law pattern shifts them by one).
fn citation_fields(caps: &regex::Captures, base: usize) -> Citation {
    let article_number = caps.get(base).map(|m| match caps.get(base + 1) {
        Some(branch) => format!("제{}조의{}", m.as_str(), branch.as_str()),
        None => format!("제{}조", m.as_str()),
    });
    Citation {
        article_number,
        clause_number: caps.get(base + 2).and_then(|m| m.as_str().parse().ok()),
        subclause_number: caps.get(base + 3).and_then(|m| m.as_str().parse().ok()),
        item_number: caps.get(base + 4).map(|m| m.as_str().to_string()),
    }
}

fn inside(spans: &[(usize, usize)], pos: usize) -> bool {
    spans.iter().any(|(s, e)| pos >= *s && pos < *e)
}

/// ±`CONTEXT_WINDOW` graphemes around the match. Grapheme boundaries keep
/// the slice valid regardless of the surrounding script.
fn context_window(text: &str, start: usize, end: usize) -> &str {
    let before: Vec<usize> = text[..start].grapheme_indices(true).map(|(i, _)| i).collect();
    let from = if before.len() > CONTEXT_WINDOW {
        before[before.len() - CONTEXT_WINDOW]
    } else {
        0
    };
    let after: Vec<usize> = text[end..].grapheme_indices(true).map(|(i, _)| i).collect();
    let to = if after.len() > CONTEXT_WINDOW {
        end + after[CONTEXT_WINDOW]
    } else {
        text.len()
    };
    &text[from..to]
}

fn classify(window: &str, kind: ReferenceKind) -> ReferenceType {
    if window.contains("준용") {
        return ReferenceType::Application;
    }
    if window.contains("위임") || window.contains("정하는 바에 따") {
        return ReferenceType::Delegation;
    }
    if window.contains("불구하고") || window.contains("적용하지 아니") || window.contains("제외") {
        return ReferenceType::Exception;
    }
    if window.contains("말한다") || window.contains("뜻은") || window.contains("정의") {
        return ReferenceType::Definition;
    }
    match kind {
        ReferenceKind::Relative => ReferenceType::RelativeRef,
        _ => ReferenceType::General,
    }
}
