use pkg_constants::network::DEFAULT_ENDPOINT_PORT;
use serde::{Deserialize, Serialize};

/// A candidate allocation endpoint, optionally paired with the address a
/// latency probe is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub endpoint: String,
    #[serde(default)]
    pub probe_target: Option<String>,
}

impl Candidate {
    /// A candidate that is never probed.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            probe_target: None,
        }
    }

    /// A candidate ranked by the latency of `probe_target`.
    /// An empty target is treated as no target at all.
    pub fn with_probe(endpoint: impl Into<String>, probe_target: impl Into<String>) -> Self {
        let target: String = probe_target.into();
        Self {
            endpoint: endpoint.into(),
            probe_target: (!target.is_empty()).then_some(target),
        }
    }
}

/// Append the default port to an endpoint that does not carry one.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains(':') {
        endpoint.to_string()
    } else {
        format!("{}:{}", endpoint, DEFAULT_ENDPOINT_PORT)
    }
}
