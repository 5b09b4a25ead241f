//! Graph integration: validates an assembled dataset and loads it into
//! Neo4j idempotently.

mod bolt;

pub mod config;
pub mod dataset;
pub mod error;
pub mod integrator;
pub mod verify;

pub use config::GraphConfig;
pub use dataset::GraphDataset;
pub use error::GraphError;
pub use integrator::GraphIntegrator;
pub use verify::{VerificationReport, NODE_LABELS, RELATIONSHIP_TYPES};
