//! HTTP latency probing.
//!
//! A [`Trace`] is one timed GET against a probe target. The allocator
//! client uses traces to rank candidate endpoints; the `ping-test`
//! subcommand prints them as JSON.

mod error;
mod trace;

pub use error::ProbeError;
pub use trace::{HttpProber, Prober, Trace, fastest_trace, normalize_target};
