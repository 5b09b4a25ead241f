use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::client::{MAX_UPLOAD_BYTES, ParserClient};
use crate::error::DocParseError;
use crate::model::{
    ChunkMeta, OcrMode, OutputFormat, ParsedDocument, ParsedResult, ParsingMethod,
};
use crate::pdf;

#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Pages per chunk. The provider caps uploads at 100 pages, so this
    /// must stay at or below that.
    pub chunk_size: u32,
    pub rate_limit_delay: Duration,
    pub max_retries: u32,
    pub keep_scratch_on_failure: bool,
    pub ocr: OcrMode,
    pub output_formats: Vec<OutputFormat>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self::tables()
    }
}

impl SplitConfig {
    /// Table-heavy documents: 50-page chunks, HTML plus plain text.
    pub fn tables() -> Self {
        Self {
            chunk_size: 50,
            rate_limit_delay: Duration::from_secs(1),
            max_retries: 2,
            keep_scratch_on_failure: true,
            ocr: OcrMode::Auto,
            output_formats: vec![OutputFormat::Html, OutputFormat::Text],
        }
    }

    /// Text-only documents: 100-page chunks, plain text.
    pub fn text() -> Self {
        Self {
            chunk_size: 100,
            output_formats: vec![OutputFormat::Text],
            ..Self::tables()
        }
    }

    /// Format whose merged string lands in `ParsedDocument::content`:
    /// html over markdown over text, among the requested ones.
    pub fn primary_format(&self) -> OutputFormat {
        for format in [OutputFormat::Html, OutputFormat::Markdown, OutputFormat::Text] {
            if self.output_formats.contains(&format) {
                return format;
            }
        }
        OutputFormat::Text
    }
}

struct ChunkOutcome {
    start: u32,
    end: u32,
    result: Option<ParsedResult>,
}

/// Splits documents that exceed the provider's upload limits into page
/// ranges, parses each range, and merges the results.
pub struct DocumentSplitter {
    client: ParserClient,
    config: SplitConfig,
}

impl DocumentSplitter {
    pub fn new(client: ParserClient, config: SplitConfig) -> Self {
        Self { client, config }
    }

    /// Parses one document. PDFs within limits and all non-PDFs go to the
    /// provider in a single call; oversized PDFs are chunked.
    pub async fn parse_document(&self, path: &Path) -> Result<ParsedDocument, DocParseError> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if !is_pdf {
            return self.parse_direct(path, None).await;
        }

        let total_pages = pdf::page_count(path)?;
        let size = std::fs::metadata(path)?.len();
        if total_pages <= self.config.chunk_size && size <= MAX_UPLOAD_BYTES {
            return self.parse_direct(path, Some(total_pages)).await;
        }

        self.parse_chunked(path, total_pages).await
    }

    async fn parse_direct(
        &self,
        path: &Path,
        probed_pages: Option<u32>,
    ) -> Result<ParsedDocument, DocParseError> {
        let result = self.call_with_retry(path, 0).await?;
        let total_pages = probed_pages.unwrap_or(result.usage.pages);
        let content = result
            .content
            .get(self.config.primary_format())
            .unwrap_or_default()
            .to_string();
        Ok(ParsedDocument {
            source_file: path.display().to_string(),
            total_pages,
            chunks_parsed: 1,
            chunks_failed: 0,
            content,
            elements: result.elements,
            parsing_method: ParsingMethod::Direct,
            parsed_at: Utc::now(),
            chunks_metadata: vec![ChunkMeta {
                index: 0,
                start_page: 1,
                end_page: total_pages,
                parsed: true,
                pages_billed: Some(result.usage.pages),
            }],
        })
    }

    async fn parse_chunked(
        &self,
        path: &Path,
        total_pages: u32,
    ) -> Result<ParsedDocument, DocParseError> {
        let ranges = partition_pages(total_pages, self.config.chunk_size);
        info!(
            file = %path.display(),
            total_pages,
            chunks = ranges.len(),
            "splitting oversized document"
        );

        let scratch = tempfile::Builder::new().prefix("docsplit-").tempdir()?;
        let source = pdf::load(path)?;

        let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(ranges.len());
        for (index, &(start, end)) in ranges.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.rate_limit_delay).await;
            }
            let chunk_path = scratch.path().join(format!("chunk_{index:03}.pdf"));
            let result = match pdf::write_page_range(&source, start, end, &chunk_path) {
                Ok(()) => match self.call_with_retry(&chunk_path, index).await {
                    Ok(parsed) => Some(parsed),
                    Err(e) => {
                        warn!(
                            chunk = index,
                            start_page = start,
                            end_page = end,
                            error = %e,
                            "chunk parse failed"
                        );
                        None
                    }
                },
                Err(e) => {
                    warn!(
                        chunk = index,
                        start_page = start,
                        end_page = end,
                        error = %e,
                        "chunk PDF write failed"
                    );
                    None
                }
            };
            outcomes.push(ChunkOutcome { start, end, result });
        }

        let failed = outcomes.iter().filter(|o| o.result.is_none()).count();
        if failed > 0 && self.config.keep_scratch_on_failure {
            let kept = scratch.into_path();
            warn!(scratch = %kept.display(), failed, "kept chunk scratch files for inspection");
        }

        Ok(merge_outcomes(
            path.display().to_string(),
            total_pages,
            self.config.primary_format(),
            outcomes,
        ))
    }

    /// Bounded backoff on transient failures: delay, then twice the delay.
    async fn call_with_retry(
        &self,
        path: &Path,
        chunk_index: usize,
    ) -> Result<ParsedResult, DocParseError> {
        let mut attempt = 0u32;
        loop {
            match self
                .client
                .parse(path, self.config.ocr, &self.config.output_formats)
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.rate_limit_delay * attempt;
                    warn!(
                        chunk = chunk_index,
                        attempt,
                        error = %e,
                        "parse attempt failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Contiguous 1-based inclusive page ranges of at most `chunk_size` pages.
/// The last range may be shorter.
pub fn partition_pages(total_pages: u32, chunk_size: u32) -> Vec<(u32, u32)> {
    if total_pages == 0 || chunk_size == 0 {
        return Vec::new();
    }
    let mut ranges = Vec::new();
    let mut start = 1u32;
    while start <= total_pages {
        let end = (start + chunk_size - 1).min(total_pages);
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

fn merge_outcomes(
    source_file: String,
    total_pages: u32,
    primary: OutputFormat,
    outcomes: Vec<ChunkOutcome>,
) -> ParsedDocument {
    let mut parts: Vec<String> = Vec::new();
    let mut elements = Vec::new();
    let mut chunks_metadata = Vec::with_capacity(outcomes.len());
    let mut chunks_parsed = 0usize;
    let mut chunks_failed = 0usize;

    for (index, outcome) in outcomes.into_iter().enumerate() {
        let parsed = outcome.result.is_some();
        let mut pages_billed = None;
        if let Some(result) = outcome.result {
            pages_billed = Some(result.usage.pages);
            if let Some(text) = result.content.get(primary) {
                parts.push(text.to_string());
            }
            // Element pages stay chunk-local; consumers recover the global
            // page as start_page + page - 1.
            elements.extend(result.elements);
            chunks_parsed += 1;
        } else {
            chunks_failed += 1;
        }
        chunks_metadata.push(ChunkMeta {
            index,
            start_page: outcome.start,
            end_page: outcome.end,
            parsed,
            pages_billed,
        });
    }

    ParsedDocument {
        source_file,
        total_pages,
        chunks_parsed,
        chunks_failed,
        content: parts.join(primary.separator()),
        elements,
        parsing_method: ParsingMethod::Chunked,
        parsed_at: Utc::now(),
        chunks_metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Element, FormatContent, Usage};

    fn chunk_result(html: &str, pages: u32) -> ParsedResult {
        let elements = (1..=pages)
            .map(|page| Element {
                category: "paragraph".to_string(),
                page,
                text: format!("page {page}"),
                coordinates: None,
            })
            .collect();
        ParsedResult {
            content: FormatContent {
                html: Some(html.to_string()),
                markdown: None,
                text: Some(format!("plain {html}")),
            },
            elements,
            usage: Usage { pages },
            model: "document-parse".to_string(),
        }
    }

    #[test]
    fn test_partition_with_remainder() {
        assert_eq!(
            partition_pages(120, 50),
            vec![(1, 50), (51, 100), (101, 120)]
        );
    }

    #[test]
    fn test_partition_exact_multiple() {
        assert_eq!(partition_pages(100, 50), vec![(1, 50), (51, 100)]);
    }

    #[test]
    fn test_partition_one_page_over() {
        assert_eq!(partition_pages(101, 50), vec![(1, 50), (51, 100), (101, 101)]);
    }

    #[test]
    fn test_partition_under_chunk_size() {
        assert_eq!(partition_pages(3, 50), vec![(1, 3)]);
    }

    #[test]
    fn test_merge_joins_with_html_separator() {
        let outcomes = vec![
            ChunkOutcome {
                start: 1,
                end: 50,
                result: Some(chunk_result("<p>first</p>", 50)),
            },
            ChunkOutcome {
                start: 51,
                end: 100,
                result: Some(chunk_result("<p>second</p>", 50)),
            },
        ];
        let doc = merge_outcomes("big.pdf".into(), 100, OutputFormat::Html, outcomes);

        assert_eq!(doc.content, "<p>first</p>\n\n<hr>\n\n<p>second</p>");
        assert_eq!(doc.chunks_parsed, 2);
        assert_eq!(doc.chunks_failed, 0);
        assert_eq!(doc.elements.len(), 100);
        // Pages are chunk-local; the metadata carries the offset.
        assert_eq!(doc.elements[50].page, 1);
        assert_eq!(doc.chunks_metadata[1].start_page, 51);
        assert_eq!(doc.parsing_method, ParsingMethod::Chunked);
    }

    #[test]
    fn test_merge_records_failed_chunk() {
        let outcomes = vec![
            ChunkOutcome {
                start: 1,
                end: 50,
                result: Some(chunk_result("<p>first</p>", 50)),
            },
            ChunkOutcome {
                start: 51,
                end: 100,
                result: None,
            },
            ChunkOutcome {
                start: 101,
                end: 120,
                result: Some(chunk_result("<p>tail</p>", 20)),
            },
        ];
        let doc = merge_outcomes("big.pdf".into(), 120, OutputFormat::Html, outcomes);

        assert_eq!(doc.chunks_parsed, 2);
        assert_eq!(doc.chunks_failed, 1);
        assert!(!doc.is_complete());
        assert_eq!(doc.content, "<p>first</p>\n\n<hr>\n\n<p>tail</p>");
        assert!(!doc.chunks_metadata[1].parsed);
        assert_eq!(doc.chunks_metadata[1].pages_billed, None);
        assert_eq!(doc.chunks_metadata[2].end_page, 120);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let build = || {
            let outcomes = vec![
                ChunkOutcome {
                    start: 1,
                    end: 50,
                    result: Some(chunk_result("<p>a</p>", 50)),
                },
                ChunkOutcome {
                    start: 51,
                    end: 70,
                    result: Some(chunk_result("<p>b</p>", 20)),
                },
            ];
            merge_outcomes("doc.pdf".into(), 70, OutputFormat::Html, outcomes)
        };
        let first = build();
        let second = build();
        assert_eq!(first.content, second.content);
        assert_eq!(first.elements.len(), second.elements.len());
        assert_eq!(first.chunks_metadata, second.chunks_metadata);
    }

    #[test]
    fn test_text_merge_uses_blank_line_separator() {
        let outcomes = vec![
            ChunkOutcome {
                start: 1,
                end: 2,
                result: Some(chunk_result("one", 2)),
            },
            ChunkOutcome {
                start: 3,
                end: 4,
                result: Some(chunk_result("two", 2)),
            },
        ];
        let doc = merge_outcomes("doc.pdf".into(), 4, OutputFormat::Text, outcomes);
        assert_eq!(doc.content, "plain one\n\nplain two");
    }

    #[test]
    fn test_primary_format_precedence() {
        let mut config = SplitConfig::tables();
        assert_eq!(config.primary_format(), OutputFormat::Html);

        config.output_formats = vec![OutputFormat::Text, OutputFormat::Markdown];
        assert_eq!(config.primary_format(), OutputFormat::Markdown);

        config.output_formats = vec![OutputFormat::Text];
        assert_eq!(config.primary_format(), OutputFormat::Text);
    }
}
