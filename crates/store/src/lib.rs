pub mod checkpoint;
pub mod error;
pub mod sink;

pub use checkpoint::{CheckpointStore, SourceCursor};
pub use error::StoreError;
pub use sink::{SinkOptions, TabularSink};
