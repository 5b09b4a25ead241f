use thiserror::Error;

/// Failures of the document parser client and the splitter around it.
#[derive(Debug, Error)]
pub enum DocParseError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("too many pages: {pages} (limit {limit})")]
    TooManyPages { pages: u32, limit: u32 },

    #[error("provider rate limited")]
    RateLimited,

    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transient provider error: {reason}")]
    Transient { reason: String },

    #[error("PDF read failed: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("JSON encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DocParseError {
    /// Retry-eligible failures. Rate limits count: the caller sleeps and
    /// tries again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited)
    }

    /// Upload predicate violations the splitter is supposed to prevent.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::FileTooLarge { .. } | Self::TooManyPages { .. }
        )
    }
}
