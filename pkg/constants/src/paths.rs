//! Filesystem path constants.

/// Default config file path for the allocator client. A missing file is
/// not an error.
pub const DEFAULT_CLIENT_CONFIG: &str = "/etc/allocator-client/config.yaml";
