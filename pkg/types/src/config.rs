use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Client configuration file (YAML).
///
/// Every field is optional; command-line flags and environment variables
/// take precedence over values found here.
///
/// Example `config.yaml`:
/// ```yaml
/// cert: /etc/allocator/client.crt
/// key: /etc/allocator/client.key
/// ca-cert: /etc/allocator/ca.crt
/// namespace: default
/// hosts: [allocator.us-east.example.com, allocator.eu-west.example.com]
/// ping-servers: [ping.us-east.example.com, ping.eu-west.example.com]
/// labels:
///   agones.dev/fleet: simple-game-server
/// max-retries: 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfigFile {
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default, alias = "ca-cert")]
    pub ca_cert: Option<String>,
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    #[serde(default, alias = "ping-servers")]
    pub ping_servers: Option<Vec<String>>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub multicluster: Option<bool>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "patch-labels")]
    pub patch_labels: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "patch-annotations")]
    pub patch_annotations: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "max-retries")]
    pub max_retries: Option<u32>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
