use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State file exists but cannot be parsed. Fatal: the operator decides
    /// whether to discard it, the store never reinitializes silently.
    #[error("corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("checkpoint encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown sink column: {0}")]
    UnknownColumn(String),

    #[error("row has {got} fields, sink expects {expected}")]
    ArityMismatch { expected: usize, got: usize },
}

impl StoreError {
    /// True for corruption that must stop the pipeline.
    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}
