use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ScrapeError;

/// One listed item, identified before its detail is fetched. `key` is the
/// natural unique id of the item (certificate number, article id, …).
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub key: String,
    /// Source-private navigation payload (detail href, onclick handler, …).
    pub payload: serde_json::Value,
}

impl ItemRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Extracted detail of one item: a sink row aligned to the source's
/// columns, plus the attachments found on the detail page.
#[derive(Debug, Clone)]
pub struct ItemDetail {
    pub row: Vec<String>,
    pub attachments: Vec<AttachmentRef>,
}

/// An attachment link as it appears on a detail page. Either `href` or
/// `onclick` carries the way to fetch it.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub label: String,
    pub href: Option<String>,
    pub onclick: Option<String>,
}

/// A paginated portal behind the acquisition pipeline. Implementations own
/// their navigation (browser session, selectors, URL templates); the
/// engine only sequences pages, items, state, and downloads.
#[async_trait]
pub trait PortalSource {
    fn name(&self) -> &str;

    /// Sink column headers, in row order.
    fn columns(&self) -> Vec<String>;

    /// Column used for the final deduplication pass.
    fn primary_key(&self) -> &str;

    /// Total page count read off the pagination UI.
    async fn discover_last_page(&mut self) -> Result<u32, ScrapeError>;

    /// Navigates to `page` (1-based) and lists its items in source order.
    async fn open_page(&mut self, page: u32) -> Result<Vec<ItemRef>, ScrapeError>;

    /// Fetches one item's detail row and attachment references.
    async fn extract_detail(&mut self, item: &ItemRef) -> Result<ItemDetail, ScrapeError>;

    /// Downloads one attachment into `dest_dir`, returning the saved path.
    async fn download(
        &mut self,
        attachment: &AttachmentRef,
        dest_dir: &Path,
    ) -> Result<PathBuf, ScrapeError>;

    async fn close(&mut self) -> Result<(), ScrapeError>;
}
