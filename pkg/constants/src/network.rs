//! Network-related constants.

use std::time::Duration;

/// Port assumed for an allocation endpoint given without one.
pub const DEFAULT_ENDPOINT_PORT: u16 = 443;

/// Scheme prefixed to probe targets given as a bare host.
pub const DEFAULT_PROBE_SCHEME: &str = "http://";

/// Upper bound for a single latency probe (DNS + connect + body).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// gRPC connect timeout towards an allocation endpoint.
pub const ALLOCATOR_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-attempt deadline for one allocation call.
pub const ALLOCATION_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
