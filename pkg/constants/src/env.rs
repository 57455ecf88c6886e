//! Environment variables backing CLI flags.

pub const CLIENT_CERT: &str = "AGONES_CLIENT_CERT";
pub const CLIENT_KEY: &str = "AGONES_CLIENT_KEY";
pub const CA_CERT: &str = "AGONES_CA_CERT";
pub const HOSTS: &str = "AGONES_HOSTS";
pub const PING_SERVERS: &str = "AGONES_PING_SERVERS";
pub const NAMESPACE: &str = "AGONES_GS_NAMESPACE";
