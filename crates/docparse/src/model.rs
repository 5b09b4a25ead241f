use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Markdown,
    Text,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Text => "text",
        }
    }

    /// Separator inserted between chunk contents when merging.
    pub fn separator(self) -> &'static str {
        match self {
            OutputFormat::Html => "\n\n<hr>\n\n",
            OutputFormat::Markdown => "\n\n---\n\n",
            OutputFormat::Text => "\n\n",
        }
    }
}

/// OCR policy forwarded to the parser service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    /// Provider decides based on native text presence.
    Auto,
    /// Run OCR regardless of native text.
    Force,
}

impl OcrMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OcrMode::Auto => "auto",
            OcrMode::Force => "force",
        }
    }
}

/// Per-format content of one parse response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FormatContent {
    pub fn get(&self, format: OutputFormat) -> Option<&str> {
        match format {
            OutputFormat::Html => self.html.as_deref(),
            OutputFormat::Markdown => self.markdown.as_deref(),
            OutputFormat::Text => self.text.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One layout element of a parsed page. `page` is local to the uploaded
/// file, so for chunked parses it is chunk-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub category: String,
    pub page: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Point>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub pages: u32,
}

/// Deserialized 200 response of the parser service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResult {
    pub content: FormatContent,
    #[serde(default)]
    pub elements: Vec<Element>,
    pub usage: Usage,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsingMethod {
    Direct,
    Chunked,
}

/// Provenance of one chunk in a merged document. The global page of an
/// element from this chunk is `start_page + local_page - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub index: usize,
    pub start_page: u32,
    pub end_page: u32,
    pub parsed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_billed: Option<u32>,
}

/// Merged parse output written to the parsed-JSON file.
///
/// `content` holds the primary requested format joined across chunks;
/// `elements` are concatenated in chunk order with chunk-local pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub source_file: String,
    pub total_pages: u32,
    pub chunks_parsed: usize,
    pub chunks_failed: usize,
    pub content: String,
    pub elements: Vec<Element>,
    pub parsing_method: ParsingMethod,
    pub parsed_at: DateTime<Utc>,
    pub chunks_metadata: Vec<ChunkMeta>,
}

impl ParsedDocument {
    /// A nonzero `chunks_failed` means the content is missing exactly the
    /// failed page ranges.
    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_formats_serialize_lowercase() {
        let formats = vec![OutputFormat::Html, OutputFormat::Text];
        let json = serde_json::to_string(&formats).unwrap();
        assert_eq!(json, r#"["html","text"]"#);
    }

    #[test]
    fn test_parsed_result_accepts_partial_content() {
        let json = r#"{
            "content": {"html": "<p>hi</p>"},
            "elements": [{"category": "paragraph", "page": 1, "text": "hi"}],
            "usage": {"pages": 1},
            "model": "document-parse"
        }"#;
        let result: ParsedResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.content.get(OutputFormat::Html), Some("<p>hi</p>"));
        assert_eq!(result.content.get(OutputFormat::Markdown), None);
        assert_eq!(result.elements.len(), 1);
        assert_eq!(result.usage.pages, 1);
    }

    #[test]
    fn test_parsed_document_round_trips() {
        let doc = ParsedDocument {
            source_file: "notice.pdf".into(),
            total_pages: 3,
            chunks_parsed: 1,
            chunks_failed: 0,
            content: "<p>body</p>".into(),
            elements: vec![],
            parsing_method: ParsingMethod::Direct,
            parsed_at: Utc::now(),
            chunks_metadata: vec![ChunkMeta {
                index: 0,
                start_page: 1,
                end_page: 3,
                parsed: true,
                pages_billed: Some(3),
            }],
        };
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: ParsedDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source_file, doc.source_file);
        assert_eq!(back.parsing_method, ParsingMethod::Direct);
        assert!(back.is_complete());
        assert!(json.contains(r#""parsing_method": "direct""#));
    }
}
