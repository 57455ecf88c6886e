//! Allocation retry/backoff constants.

use std::time::Duration;

/// First backoff delay after a failed allocation.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Growth factor applied to the backoff delay after each retry.
pub const BACKOFF_MULTIPLIER: f32 = 1.5;

/// Backoff delays never grow past this value.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Default number of retries for `allocate` and `load-test`.
pub const DEFAULT_MAX_RETRIES: u32 = 10;
