use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fantoccini::Locator;
use fantoccini::elements::Element;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use crate::browser::BrowserHarness;
use crate::config::{DetailMode, FieldSelector, PaginationMode, SourceConfig};
use crate::error::ScrapeError;
use crate::onclick::{DownloadRequest, parse_handler};
use crate::source::{AttachmentRef, ItemDetail, ItemRef, PortalSource};

/// Walks any board a `SourceConfig` can describe: numbered list pages,
/// one detail view per row, attachments behind hrefs or JS handlers.
pub struct GenericBoardSource {
    config: SourceConfig,
    harness: BrowserHarness,
    list_page_url: Option<String>,
}

impl GenericBoardSource {
    pub fn new(config: SourceConfig, harness: BrowserHarness) -> Self {
        Self {
            config,
            harness,
            list_page_url: None,
        }
    }

    async fn read_item(&self, row: &Element) -> Result<Option<ItemRef>, ScrapeError> {
        let cell = match row.find(Locator::Css(&self.config.key_selector)).await {
            Ok(cell) => cell,
            Err(e) if e.is_no_such_element() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let key = match &self.config.key_attr {
            Some(attr) => cell.attr(attr).await?.unwrap_or_default(),
            None => cell.text().await?,
        };
        let key = key.trim().to_string();
        if key.is_empty() {
            return Ok(None);
        }

        let (href, onclick) = match row.find(Locator::Css(&self.config.detail_selector)).await {
            Ok(anchor) => (anchor.attr("href").await?, anchor.attr("onclick").await?),
            Err(e) if e.is_no_such_element() => (None, None),
            Err(e) => return Err(e.into()),
        };
        let mut item = ItemRef::new(key);
        item.payload = serde_json::json!({ "href": href, "onclick": onclick });
        Ok(Some(item))
    }

    async fn read_field(&self, field: &FieldSelector) -> Result<String, ScrapeError> {
        let value = match &field.attr {
            Some(attr) => self
                .harness
                .attr_of(&field.selector, attr)
                .await?
                .unwrap_or_default(),
            None => self.harness.text_of(&field.selector).await?,
        };
        Ok(value.trim().to_string())
    }

    async fn collect_attachments(&self) -> Result<Vec<AttachmentRef>, ScrapeError> {
        let Some(selector) = &self.config.attachment_selector else {
            return Ok(Vec::new());
        };
        let anchors = self.harness.query_all(selector).await?;
        let mut attachments = Vec::new();
        for anchor in &anchors {
            let label = anchor.text().await?.trim().to_string();
            let href = anchor.attr("href").await?;
            let onclick = anchor.attr("onclick").await?;
            if href.is_none() && onclick.is_none() {
                warn!(label, "attachment anchor carries no href or onclick, skipping");
                continue;
            }
            attachments.push(AttachmentRef {
                label,
                href,
                onclick,
            });
        }
        Ok(attachments)
    }

    /// Re-opens the last visited list page. Detail handlers that run as JS
    /// only work from the listing they were captured on.
    async fn return_to_list(&self) -> Result<(), ScrapeError> {
        match &self.list_page_url {
            Some(url) => self.harness.open(url).await,
            None => self.harness.open(&self.config.list_url).await,
        }
    }
}

#[async_trait]
impl PortalSource for GenericBoardSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn columns(&self) -> Vec<String> {
        self.config.columns.clone()
    }

    fn primary_key(&self) -> &str {
        &self.config.primary_key
    }

    async fn discover_last_page(&mut self) -> Result<u32, ScrapeError> {
        self.harness.open(&self.config.list_url).await?;
        self.list_page_url = Some(self.harness.current_url().await?);

        let raw = match &self.config.last_page_attr {
            Some(attr) => self
                .harness
                .attr_of(&self.config.last_page_selector, attr)
                .await
                .map(Option::unwrap_or_default),
            None => self.harness.text_of(&self.config.last_page_selector).await,
        };
        let raw = raw.map_err(|e| match e {
            ScrapeError::MissingElement { selector } => ScrapeError::Pagination {
                reason: format!("pagination control '{selector}' not found"),
            },
            other => other,
        })?;

        let param = match &self.config.pagination {
            PaginationMode::Query { param } => Some(param.as_str()),
            PaginationMode::Onclick { .. } => None,
        };
        extract_page_number(&raw, param).ok_or_else(|| ScrapeError::Pagination {
            reason: format!("no page number in '{}'", raw.trim()),
        })
    }

    async fn open_page(&mut self, page: u32) -> Result<Vec<ItemRef>, ScrapeError> {
        match &self.config.pagination {
            PaginationMode::Query { param } => {
                let url = page_url(&self.config.list_url, param, page)?;
                self.harness.open(url.as_str()).await?;
                self.list_page_url = Some(url.to_string());
            }
            PaginationMode::Onclick { js_template } => {
                self.harness.open(&self.config.list_url).await?;
                if page > 1 {
                    let js = js_template.replace("{page}", &page.to_string());
                    self.harness.invoke(&js).await?;
                    self.harness.wait_ready().await?;
                }
                self.list_page_url = Some(self.harness.current_url().await?);
            }
        }

        let rows = self.harness.query_all(&self.config.row_selector).await?;
        let mut items = Vec::new();
        for row in &rows {
            if let Some(item) = self.read_item(row).await? {
                items.push(item);
            }
        }
        debug!(page, rows = rows.len(), items = items.len(), "page listed");
        Ok(items)
    }

    async fn extract_detail(&mut self, item: &ItemRef) -> Result<ItemDetail, ScrapeError> {
        let href = item
            .payload
            .get("href")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let onclick = item
            .payload
            .get("onclick")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        match self.config.detail {
            DetailMode::Link => {
                if href.is_empty() || href == "#" || href.starts_with("javascript:") {
                    return Err(ScrapeError::Detail {
                        reason: format!("item '{}' has no usable detail link", item.key),
                    });
                }
                let url = Url::parse(&self.config.base_url)?.join(href)?;
                self.harness.open(url.as_str()).await?;
            }
            DetailMode::Onclick => {
                let handler = if !onclick.is_empty() {
                    onclick
                } else if href.starts_with("javascript:") {
                    href
                } else {
                    return Err(ScrapeError::Detail {
                        reason: format!("item '{}' has no detail handler", item.key),
                    });
                };
                self.return_to_list().await?;
                self.harness.invoke(handler).await?;
                self.harness.wait_ready().await?;
            }
        }

        let mut values = BTreeMap::new();
        for field in &self.config.fields {
            let value = self.read_field(field).await.map_err(|e| match e {
                ScrapeError::MissingElement { selector } => ScrapeError::Detail {
                    reason: format!("field '{}' missing at '{selector}'", field.column),
                },
                other => other,
            })?;
            values.insert(field.column.clone(), value);
        }
        let row = align_row(
            &self.config.columns,
            &self.config.primary_key,
            &item.key,
            &values,
        );

        let attachments = self.collect_attachments().await?;
        Ok(ItemDetail { row, attachments })
    }

    async fn download(
        &mut self,
        attachment: &AttachmentRef,
        dest_dir: &Path,
    ) -> Result<PathBuf, ScrapeError> {
        let request = resolve_request(&self.config.base_url, attachment)?;
        self.harness.expect_download(&request, dest_dir).await
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        self.harness.close().await
    }
}

/// Rebuilds the list URL with the page parameter set, replacing any value
/// already present.
fn page_url(list_url: &str, param: &str, page: u32) -> Result<Url, ScrapeError> {
    let mut url = Url::parse(list_url)?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut editor = url.query_pairs_mut();
        editor.clear();
        for (k, v) in &pairs {
            editor.append_pair(k, v);
        }
        editor.append_pair(param, &page.to_string());
    }
    Ok(url)
}

/// Pulls the page count out of whatever the pagination control exposes:
/// a bare number, a "1 / 27" label, or an href carrying the page param.
fn extract_page_number(raw: &str, param: Option<&str>) -> Option<u32> {
    if let Some(param) = param {
        let re = Regex::new(&format!(r"{}=(\d+)", regex::escape(param))).unwrap();
        if let Some(caps) = re.captures(raw) {
            if let Ok(n) = caps[1].parse() {
                return Some(n);
            }
        }
    }
    let digits = Regex::new(r"\d+").unwrap();
    digits
        .find_iter(raw)
        .last()
        .and_then(|m| m.as_str().parse().ok())
}

fn align_row(
    columns: &[String],
    primary_key: &str,
    key: &str,
    values: &BTreeMap<String, String>,
) -> Vec<String> {
    columns
        .iter()
        .map(|column| {
            if column == primary_key {
                key.to_string()
            } else {
                values.get(column).cloned().unwrap_or_default()
            }
        })
        .collect()
}

fn resolve_request(
    base_url: &str,
    attachment: &AttachmentRef,
) -> Result<DownloadRequest, ScrapeError> {
    if let Some(href) = attachment.href.as_deref() {
        let href = href.trim();
        if href.starts_with("javascript:") {
            return parse_handler(href, base_url);
        }
        if !href.is_empty() && href != "#" {
            let url = Url::parse(base_url)?.join(href)?;
            return Ok(DownloadRequest {
                url: url.to_string(),
                file_name: label_hint(&attachment.label),
            });
        }
    }
    if let Some(onclick) = attachment.onclick.as_deref() {
        return parse_handler(onclick, base_url);
    }
    Err(ScrapeError::Download {
        reason: format!("attachment '{}' has no usable target", attachment.label),
    })
}

/// Anchor text on these boards is usually the original file name, with an
/// optional trailing size note this strips off.
fn label_hint(label: &str) -> Option<String> {
    let re = Regex::new(r"\s*\([^)]*\)\s*$").unwrap();
    let label = re.replace(label.trim(), "").trim().to_string();
    if label.contains('.') && !label.ends_with('.') {
        Some(label)
    } else {
        None
    }
}
