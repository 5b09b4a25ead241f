use regex::Regex;
use tracing::{debug, warn};

use crate::schema::Article;

// ① is U+2460; the enclosed numerals run contiguously through ⑮.
const CLAUSE_NUMERAL_BASE: u32 = 0x2460;

#[derive(Debug)]
enum RawKind {
    Article { number: String, title: Option<String> },
    Clause(u32),
    Subclause(u32),
    Item(String),
}

impl RawKind {
    fn rank(&self) -> u8 {
        match self {
            RawKind::Article { .. } => 0,
            RawKind::Clause(_) => 1,
            RawKind::Subclause(_) => 2,
            RawKind::Item(_) => 3,
        }
    }
}

#[derive(Debug)]
struct RawMarker {
    start: usize,
    kind: RawKind,
}

/// Single-pass parser for the 조/항/호/목 hierarchy of Korean statute
/// text. Body text between markers accrues to the most recent marker;
/// ids are the law id followed by the hierarchy path, so the same input
/// always yields the same ids.
pub struct ArticleParser {
    article_re: Regex,
    clause_re: Regex,
    subclause_re: Regex,
    item_re: Regex,
}

impl ArticleParser {
    pub fn new() -> Self {
        Self {
            // 조 headers sit at line starts; mid-sentence 제N조 mentions
            // are references, not headers.
            article_re: Regex::new(r"(?m)^[ \t]*(제(\d+)조(?:의(\d+))?(?:\s*\(([^)]+)\))?)")
                .unwrap(),
            clause_re: Regex::new(r"([①-⑮])").unwrap(),
            subclause_re: Regex::new(r"(?m)(?:^|[ \t])(\d{1,3})\.(?:\s|$)").unwrap(),
            item_re: Regex::new(r"(?m)(?:^|[ \t])([가나다라마바사아자차카타파하])\.(?:\s|$)")
                .unwrap(),
        }
    }

    pub fn parse(&self, law_id: &str, text: &str) -> Vec<Article> {
        let markers = self.collect_markers(text);
        let mut records: Vec<Article> = Vec::new();
        let mut stack: Vec<(u8, u8, usize)> = Vec::new();
        let mut current_number: Option<String> = None;

        for (i, marker) in markers.iter().enumerate() {
            let body_end = markers.get(i + 1).map(|m| m.start).unwrap_or(text.len());
            let full_text = text[marker.start..body_end].trim().to_string();

            let rank = marker.kind.rank();
            while stack.last().is_some_and(|(r, _, _)| *r >= rank) {
                stack.pop();
            }

            match &marker.kind {
                RawKind::Article { number, title } => {
                    current_number = Some(number.clone());
                    records.push(Article {
                        article_id: format!("{law_id}/{number}"),
                        law_id: law_id.to_string(),
                        article_number: number.clone(),
                        article_title: title.clone(),
                        depth: 0,
                        clause_number: None,
                        subclause_number: None,
                        item_number: None,
                        full_text,
                        parent_article_id: None,
                    });
                    stack.push((0, 0, records.len() - 1));
                }
                child => {
                    let Some(&(_, parent_depth, parent_idx)) = stack.last() else {
                        warn!(law_id, "hierarchy marker before any 조, skipping");
                        continue;
                    };
                    let parent_id = records[parent_idx].article_id.clone();
                    let depth = parent_depth + 1;
                    let (suffix, clause, subclause, item) = match child {
                        RawKind::Clause(n) => (format!("제{n}항"), Some(*n), None, None),
                        RawKind::Subclause(n) => (format!("제{n}호"), None, Some(*n), None),
                        RawKind::Item(c) => (format!("{c}목"), None, None, Some(c.clone())),
                        RawKind::Article { .. } => unreachable!("rank 0 handled above"),
                    };
                    records.push(Article {
                        article_id: format!("{parent_id}/{suffix}"),
                        law_id: law_id.to_string(),
                        article_number: current_number.clone().unwrap_or_default(),
                        article_title: None,
                        depth,
                        clause_number: clause,
                        subclause_number: subclause,
                        item_number: item,
                        full_text,
                        parent_article_id: Some(parent_id),
                    });
                    stack.push((rank, depth, records.len() - 1));
                }
            }
        }

        debug!(law_id, articles = records.len(), "statute parsed");
        records
    }

    fn collect_markers(&self, text: &str) -> Vec<RawMarker> {
        let mut markers = Vec::new();
        let mut header_spans = Vec::new();

        for caps in self.article_re.captures_iter(text) {
            let marker = caps.get(1).unwrap();
            let number = match caps.get(3) {
                Some(branch) => format!("제{}조의{}", &caps[2], branch.as_str()),
                None => format!("제{}조", &caps[2]),
            };
            let title = caps.get(4).map(|m| m.as_str().trim().to_string());
            header_spans.push((marker.start(), marker.end()));
            markers.push(RawMarker {
                start: marker.start(),
                kind: RawKind::Article { number, title },
            });
        }
        let inside_header =
            |pos: usize| header_spans.iter().any(|(s, e)| pos >= *s && pos < *e);

        for caps in self.clause_re.captures_iter(text) {
            let m = caps.get(1).unwrap();
            if inside_header(m.start()) {
                continue;
            }
            let numeral = m.as_str().chars().next().unwrap();
            let value = numeral as u32 - CLAUSE_NUMERAL_BASE + 1;
            markers.push(RawMarker {
                start: m.start(),
                kind: RawKind::Clause(value),
            });
        }

        for caps in self.subclause_re.captures_iter(text) {
            let m = caps.get(1).unwrap();
            if inside_header(m.start()) {
                continue;
            }
            let value = m.as_str().parse().unwrap_or(0);
            markers.push(RawMarker {
                start: m.start(),
                kind: RawKind::Subclause(value),
            });
        }

        for caps in self.item_re.captures_iter(text) {
            let m = caps.get(1).unwrap();
            if inside_header(m.start()) {
                continue;
            }
            markers.push(RawMarker {
                start: m.start(),
                kind: RawKind::Item(m.as_str().to_string()),
            });
        }

        markers.sort_by_key(|m| m.start);
        markers
    }
}

impl Default for ArticleParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_clause_subclause_depths() {
        let parser = ArticleParser::new();
        let text = "제3조(정의) ① 이 법에서 사용하는 용어의 뜻은 다음과 같다. \
                    1. \"수급권자\"란 생계급여 수급자를 말한다.";
        let articles = parser.parse("basic-living-act", text);
        assert_eq!(articles.len(), 3);

        let jo = &articles[0];
        assert_eq!(jo.depth, 0);
        assert_eq!(jo.article_number, "제3조");
        assert_eq!(jo.article_title.as_deref(), Some("정의"));
        assert_eq!(jo.article_id, "basic-living-act/제3조");
        assert!(jo.parent_article_id.is_none());

        let hang = &articles[1];
        assert_eq!(hang.depth, 1);
        assert_eq!(hang.clause_number, Some(1));
        assert_eq!(hang.article_id, "basic-living-act/제3조/제1항");
        assert_eq!(hang.parent_article_id.as_deref(), Some("basic-living-act/제3조"));

        let ho = &articles[2];
        assert_eq!(ho.depth, 2);
        assert_eq!(ho.subclause_number, Some(1));
        assert_eq!(
            ho.parent_article_id.as_deref(),
            Some("basic-living-act/제3조/제1항")
        );
        assert!(ho.full_text.contains("수급권자"));
    }

    #[test]
    fn test_branch_numbered_article_header() {
        let parser = ArticleParser::new();
        let articles = parser.parse("law", "제5조의2(특례) 요양급여의 특례를 정한다.");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].article_number, "제5조의2");
        assert_eq!(articles[0].article_title.as_deref(), Some("특례"));
        assert_eq!(articles[0].article_id, "law/제5조의2");
    }

    #[test]
    fn test_items_nest_under_subclauses() {
        let parser = ArticleParser::new();
        let text = "제4조(급여) ① 급여는 다음과 같다. 1. 진찰 가. 초진 나. 재진";
        let articles = parser.parse("law", text);
        let kinds: Vec<u8> = articles.iter().map(|a| a.depth).collect();
        assert_eq!(kinds, vec![0, 1, 2, 3, 3]);
        assert_eq!(articles[3].item_number.as_deref(), Some("가"));
        assert_eq!(articles[4].item_number.as_deref(), Some("나"));
        assert_eq!(articles[3].parent_article_id, articles[4].parent_article_id);
        assert_eq!(
            articles[4].parent_article_id.as_deref(),
            Some("law/제4조/제1항/제1호")
        );
    }

    #[test]
    fn test_sibling_clauses_share_a_parent() {
        let parser = ArticleParser::new();
        let text = "제2조(가입) ① 누구든지 가입할 수 있다. ② 탈퇴는 신고로 한다.";
        let articles = parser.parse("law", text);
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[1].clause_number, Some(1));
        assert_eq!(articles[2].clause_number, Some(2));
        assert_eq!(articles[1].parent_article_id, articles[2].parent_article_id);
        assert!(articles[1].full_text.contains("가입할 수 있다"));
        assert!(!articles[1].full_text.contains("탈퇴"));
    }

    #[test]
    fn test_new_article_resets_the_hierarchy() {
        let parser = ArticleParser::new();
        let text = "제1조(목적) 이 법은 복지를 목적으로 한다.\n제2조(정의) ① 용어를 정의한다.";
        let articles = parser.parse("law", text);
        assert_eq!(articles.len(), 3);
        assert!(articles[1].parent_article_id.is_none());
        assert_eq!(articles[2].parent_article_id.as_deref(), Some("law/제2조"));
        assert_eq!(articles[2].article_number, "제2조");
    }

    #[test]
    fn test_mid_sentence_article_mention_is_not_a_header() {
        let parser = ArticleParser::new();
        let text = "제7조(준용) 보험급여에 관하여는 제11조의 규정을 준용한다.";
        let articles = parser.parse("law", text);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].article_number, "제7조");
    }

    #[test]
    fn test_orphan_markers_are_skipped() {
        let parser = ArticleParser::new();
        let articles = parser.parse("law", "① 떠도는 항은 기록되지 않는다.");
        assert!(articles.is_empty());
    }
}
