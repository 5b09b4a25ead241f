pub mod client;
pub mod error;
pub mod model;
pub mod pdf;
pub mod splitter;

pub use client::{MAX_UPLOAD_BYTES, MAX_UPLOAD_PAGES, ParserClient, ParserConfig};
pub use error::DocParseError;
pub use model::{
    ChunkMeta, Element, FormatContent, OcrMode, OutputFormat, ParsedDocument, ParsedResult,
    ParsingMethod, Usage,
};
pub use splitter::{DocumentSplitter, SplitConfig, partition_pages};
