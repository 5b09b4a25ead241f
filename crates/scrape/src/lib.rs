//! Browser-driven acquisition of regulatory notices from government
//! portals: a WebDriver harness, declarative board definitions, and a
//! crash-resumable pipeline that lands rows in CSV and attachments on
//! disk.

pub mod board;
pub mod browser;
pub mod config;
pub mod error;
pub mod onclick;
pub mod pipeline;
pub mod source;

pub use board::GenericBoardSource;
pub use browser::{BrowserConfig, BrowserHarness};
pub use config::{DetailMode, FieldSelector, PaginationMode, SourceConfig, load_sources};
pub use error::ScrapeError;
pub use onclick::{DownloadRequest, parse_handler};
pub use pipeline::{
    AcquisitionPipeline, FailureBucket, PaginationFallback, PipelineConfig, RunReport,
};
pub use source::{AttachmentRef, ItemDetail, ItemRef, PortalSource};
