use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::prober::ProbeConfig;
use crate::cluster::ring::{Node, DEFAULT_VIRTUAL_POINTS};
use crate::error::{Error, Result};

/// Default port the routing front-end listens on.
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Default backend port list for the CLI.
pub const DEFAULT_BACKEND_PORTS: &str = "6000,6001,6002,6003";

/// Router configuration. Loadable from a JSON file or built from CLI flags
/// by the binary. Backends always live on `localhost`; only their ports are
/// configured.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RouterConfig {
    pub ports: Vec<u16>,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_virtual_points")]
    pub virtual_points: usize,
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_probe_interval_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_virtual_points() -> usize {
    DEFAULT_VIRTUAL_POINTS
}

impl RouterConfig {
    pub fn from_ports(ports: Vec<u16>) -> Self {
        Self {
            ports,
            listen_port: default_listen_port(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            virtual_points: default_virtual_points(),
        }
    }

    pub async fn load(path: PathBuf) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(|err| Error::InvalidConfig {
            reason: err.to_string(),
        })
    }

    /// Parses a comma-separated port list like `6000,6001,6002`.
    pub fn parse_ports(list: &str) -> Result<Vec<u16>> {
        list.split(',')
            .map(|port| {
                port.trim().parse::<u16>().map_err(|err| Error::InvalidConfig {
                    reason: format!("invalid port {:?}: {}", port, err),
                })
            })
            .collect()
    }

    /// Rejects configurations the ring cannot represent: an empty backend
    /// list, duplicate `(host, port)` identities, or a zero point count.
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "at least one backend port is required".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for port in self.ports.iter() {
            if !seen.insert(port) {
                return Err(Error::InvalidConfig {
                    reason: format!("duplicate backend port {}", port),
                });
            }
        }

        if self.virtual_points == 0 {
            return Err(Error::InvalidConfig {
                reason: "virtual_points must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.ports
            .iter()
            .map(|port| Node::new("localhost", *port))
            .collect()
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            interval: Duration::from_millis(self.probe_interval_ms),
            timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::RouterConfig;
    use crate::cluster::ring::Node;

    #[tokio::test]
    async fn deserialize_router_config() {
        let mut config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        config_path.push("conf/router.json");

        let config = RouterConfig::load(config_path).await.unwrap();

        assert_eq!(config.ports, vec![6000, 6001, 6002, 6003]);
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.probe_interval_ms, 5000);
        assert_eq!(config.probe_timeout_ms, 5000);
        assert_eq!(config.virtual_points, 100);
        config.validate().unwrap();
    }

    #[test]
    fn parse_ports_happy_path() {
        assert_eq!(
            RouterConfig::parse_ports("6000,6001, 6002").unwrap(),
            vec![6000, 6001, 6002]
        );
    }

    #[test]
    fn parse_ports_rejects_garbage() {
        assert!(RouterConfig::parse_ports("6000,not-a-port").is_err());
        assert!(RouterConfig::parse_ports("").is_err());
        assert!(RouterConfig::parse_ports("70000").is_err());
    }

    #[test]
    fn validate_rejects_duplicate_ports() {
        let config = RouterConfig::from_ports(vec![6000, 6001, 6000]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_port_list() {
        let config = RouterConfig::from_ports(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn nodes_are_localhost() {
        let config = RouterConfig::from_ports(vec![6000, 6001]);
        assert_eq!(
            config.nodes(),
            vec![Node::new("localhost", 6000), Node::new("localhost", 6001)]
        );
    }
}
