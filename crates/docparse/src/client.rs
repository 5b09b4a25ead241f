use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DocParseError;
use crate::model::{OcrMode, OutputFormat, ParsedResult};
use crate::pdf;

pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_UPLOAD_PAGES: u32 = 100;

const SUPPORTED_EXTENSIONS: [&str; 5] = ["pdf", "hwp", "hwpx", "docx", "xlsx"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: String::new(),
            timeout_secs: 300,
        }
    }
}

impl ParserConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            std::env::var("DOCPARSE_BASE_URL").context("DOCPARSE_BASE_URL is not set")?;
        let api_key = std::env::var("DOCPARSE_API_KEY").context("DOCPARSE_API_KEY is not set")?;
        Ok(Self {
            base_url,
            api_key,
            ..Self::default()
        })
    }
}

/// Client for the document digitization service. One upload per call;
/// retries belong to the caller.
#[derive(Clone)]
pub struct ParserClient {
    http: reqwest::Client,
    config: ParserConfig,
}

impl ParserClient {
    pub fn new(config: ParserConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    /// Uploads one document and returns the parsed result. Fails fast on
    /// the local upload predicates before any bytes leave the machine.
    pub async fn parse(
        &self,
        path: &Path,
        ocr: OcrMode,
        output_formats: &[OutputFormat],
    ) -> Result<ParsedResult, DocParseError> {
        check_upload_limits(path)?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let formats_json = serde_json::to_string(output_formats)?;

        let form = multipart::Form::new()
            .part(
                "document",
                multipart::Part::bytes(bytes).file_name(file_name.clone()),
            )
            .text("ocr", ocr.as_str())
            .text("output_formats", formats_json);

        let url = format!(
            "{}/document-digitization",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(file = %file_name, url = %url, "uploading document for parsing");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DocParseError::Transient {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DocParseError::RateLimited);
        }
        if status.is_server_error() {
            return Err(DocParseError::Transient {
                reason: format!("server returned {status}"),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DocParseError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| DocParseError::Transient {
            reason: e.to_string(),
        })?;
        let result: ParsedResult = serde_json::from_str(&body)?;
        Ok(result)
    }
}

/// Upload predicates: supported extension, byte limit, page limit for PDFs.
pub fn check_upload_limits(path: &Path) -> Result<(), DocParseError> {
    check_limits(path, MAX_UPLOAD_BYTES, MAX_UPLOAD_PAGES)
}

fn check_limits(path: &Path, max_bytes: u64, max_pages: u32) -> Result<(), DocParseError> {
    let Some(ext) = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    else {
        return Err(DocParseError::UnsupportedFormat(
            path.display().to_string(),
        ));
    };
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(DocParseError::UnsupportedFormat(ext));
    }

    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(DocParseError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }

    if ext == "pdf" {
        let pages = pdf::page_count(path)?;
        if pages > max_pages {
            return Err(DocParseError::TooManyPages {
                pages,
                limit: max_pages,
            });
        }
    }
    Ok(())
}
