use serde::{Deserialize, Serialize};

/// Connection and batching settings for the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Rows per UNWIND batch.
    pub batch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            batch_size: 500,
        }
    }
}

impl GraphConfig {
    /// Reads `NEO4J_URI`, `NEO4J_USER` and `NEO4J_PASSWORD`, keeping the
    /// local defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            config.uri = uri;
        }
        if let Ok(user) = std::env::var("NEO4J_USER") {
            config.user = user;
        }
        if let Ok(password) = std::env::var("NEO4J_PASSWORD") {
            config.password = password;
        }
        config
    }
}
