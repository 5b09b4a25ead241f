use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// How a board exposes its page boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaginationMode {
    /// Page number is a query parameter on the list URL.
    Query { param: String },
    /// Page changes only through a JS handler; `{page}` is substituted.
    Onclick { js_template: String },
}

/// How a row leads to its detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailMode {
    Link,
    Onclick,
}

/// One column of the output table, read from the detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelector {
    pub column: String,
    pub selector: String,
    #[serde(default)]
    pub attr: Option<String>,
}

/// Declarative description of one government board. A single generic
/// source implementation walks any board this shape can describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub base_url: String,
    pub list_url: String,
    pub pagination: PaginationMode,
    pub columns: Vec<String>,
    pub primary_key: String,
    pub row_selector: String,
    pub key_selector: String,
    #[serde(default)]
    pub key_attr: Option<String>,
    /// Anchor within a row that leads to the detail view.
    #[serde(default = "default_detail_selector")]
    pub detail_selector: String,
    pub detail: DetailMode,
    pub fields: Vec<FieldSelector>,
    #[serde(default)]
    pub attachment_selector: Option<String>,
    pub last_page_selector: String,
    #[serde(default)]
    pub last_page_attr: Option<String>,
}

fn default_detail_selector() -> String {
    "a".to_string()
}

/// Loads the source definitions file (a JSON array of boards).
pub fn load_sources(path: &Path) -> anyhow::Result<Vec<SourceConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source definitions from {}", path.display()))?;
    let sources: Vec<SourceConfig> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse source definitions in {}", path.display()))?;
    for source in &sources {
        anyhow::ensure!(
            source.columns.contains(&source.primary_key),
            "source '{}' lists primary key '{}' outside its columns",
            source.name,
            source.primary_key
        );
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"[{
            "name": "hira-notices",
            "base_url": "https://www.example-portal.go.kr",
            "list_url": "https://www.example-portal.go.kr/board/list.do",
            "pagination": { "mode": "query", "param": "pageIndex" },
            "columns": ["notice_no", "title", "department", "posted_at"],
            "primary_key": "notice_no",
            "row_selector": "table.board tbody tr",
            "key_selector": "td.num",
            "detail": "link",
            "fields": [
                { "column": "title", "selector": "div.view h3" },
                { "column": "department", "selector": "span.dept" },
                { "column": "posted_at", "selector": "span.date" }
            ],
            "attachment_selector": "ul.file-list a",
            "last_page_selector": "a.page-last",
            "last_page_attr": "href"
        }]"#
    }

    #[test]
    fn test_source_config_parses_from_json() {
        let sources: Vec<SourceConfig> = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(sources.len(), 1);
        let source = &sources[0];
        assert_eq!(source.name, "hira-notices");
        assert!(matches!(
            source.pagination,
            PaginationMode::Query { ref param } if param == "pageIndex"
        ));
        assert_eq!(source.detail, DetailMode::Link);
        assert_eq!(source.fields.len(), 3);
        assert!(source.key_attr.is_none());
        assert_eq!(source.detail_selector, "a");
    }

    #[test]
    fn test_onclick_pagination_parses() {
        let raw = r#"{ "mode": "onclick", "js_template": "goPage({page})" }"#;
        let mode: PaginationMode = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            mode,
            PaginationMode::Onclick { ref js_template } if js_template == "goPage({page})"
        ));
    }

    #[test]
    fn test_load_rejects_primary_key_outside_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        let broken = sample_json().replace(r#"["notice_no", "#, "[");
        std::fs::write(&path, broken).unwrap();
        let err = load_sources(&path).unwrap_err();
        assert!(err.to_string().contains("primary key"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.json");
        std::fs::write(&path, sample_json()).unwrap();
        let sources = load_sources(&path).unwrap();
        assert_eq!(sources[0].columns.len(), 4);
    }
}
