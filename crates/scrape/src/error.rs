use thiserror::Error;

/// Failures of the browser harness and the acquisition pipeline.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("timeout after {secs}s during {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("WebDriver session failed: {0}")]
    Session(#[from] fantoccini::error::NewSessionError),

    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("download failed: {reason}")]
    Download { reason: String },

    #[error("unsupported attachment handler: {0}")]
    UnsupportedHandler(String),

    #[error("pagination discovery failed: {reason}")]
    Pagination { reason: String },

    #[error("selector {selector} matched nothing")]
    MissingElement { selector: String },

    #[error("item detail incomplete: {reason}")]
    Detail { reason: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Store(#[from] store::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Per-item retry eligibility. These are logged, counted, and skipped;
    /// a later run picks the item up again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::WebDriver(_) | Self::Download { .. } | Self::Detail { .. }
        )
    }

    /// Errors that stop the whole run after flushing buffered state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Session(_)
                | Self::Pagination { .. }
                | Self::MissingElement { .. }
                | Self::Url(_)
                | Self::Store(_)
                | Self::Io(_)
        )
    }

    /// Bucket name for the per-kind failure counts of a run report.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Session(_) => "session",
            Self::WebDriver(_) => "webdriver",
            Self::Download { .. } => "download",
            Self::UnsupportedHandler(_) => "unsupported_handler",
            Self::Pagination { .. } => "pagination",
            Self::MissingElement { .. } => "missing_element",
            Self::Detail { .. } => "detail",
            Self::Url(_) => "url",
            Self::Store(_) => "store",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient_not_fatal() {
        let e = ScrapeError::Timeout {
            operation: "navigate".into(),
            secs: 30,
        };
        assert!(e.is_transient());
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_corrupt_store_is_fatal() {
        let e = ScrapeError::Store(store::StoreError::Corrupt {
            path: "checkpoint.json".into(),
            reason: "bad json".into(),
        });
        assert!(e.is_fatal());
        assert!(!e.is_transient());
    }

    #[test]
    fn test_unsupported_handler_is_per_item_but_not_retryable() {
        let e = ScrapeError::UnsupportedHandler("openPopup('x')".into());
        assert!(!e.is_transient());
        assert!(!e.is_fatal());
    }
}
