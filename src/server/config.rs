use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default port a backend node listens on.
pub const DEFAULT_PORT: u16 = 5000;

/// Backend node configuration. Loadable from a JSON file or built from CLI
/// flags by the binary.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NodeConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl NodeConfig {
    pub async fn load(path: PathBuf) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(|err| Error::InvalidConfig {
            reason: err.to_string(),
        })
    }
}
