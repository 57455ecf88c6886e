use pkg_ping::ProbeError;
use pkg_pki::CredentialError;
use std::time::Duration;

/// Invalid or contradictory client configuration. Always fatal; reported
/// before any network activity.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("you must pass at least one host")]
    NoEndpoints,

    #[error("pass either a list of hosts or a host to ping-server mapping, not both")]
    ConflictingEndpoints,

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("protocol must be one of (udp|tcp), got {0:?}")]
    UnsupportedProtocol(String),
}

/// Errors from endpoint selection and allocation.
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no traces succeeded, could not find a valid server")]
    NoTracesSucceeded,

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("unknown error resolving hosts: fastest trace {0} matches no endpoint")]
    UnresolvedFastest(String),

    #[error("invalid allocator endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("could not connect to allocator {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("allocation on {endpoint} failed: {status}")]
    Rpc {
        endpoint: String,
        status: Box<tonic::Status>,
    },

    #[error("allocation on {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("allocation response from {endpoint} carried no ports")]
    EmptyPorts { endpoint: String },

    #[error("allocation response port {0} is out of range")]
    InvalidPort(i32),

    #[error("{source} - max-retries is zero")]
    RetriesDisabled { source: Box<AllocatorError> },

    #[error("max retries ({retries}) reached")]
    Exhausted {
        retries: u32,
        #[source]
        last: Box<AllocatorError>,
    },
}

/// Failure of a single load-test unit. Logged by the harness, never fatal
/// to sibling units.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("allocation failed: {0}")]
    Allocate(#[from] AllocatorError),

    #[error("game server session failed: {0}")]
    Session(#[from] std::io::Error),

    #[error("game server address {0} did not resolve")]
    Unresolvable(String),
}
