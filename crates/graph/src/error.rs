use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph database error: {0}")]
    Db(#[from] neo4rs::Error),

    /// The dataset broke a structural invariant. Nothing was written.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("verification failed: {0}")]
    Verification(String),
}
