//! Allocation client core: endpoint selection, mutually-authenticated
//! allocation with retry and failover, and the synthetic load harness.

pub mod client;
pub mod error;
pub mod load;
pub mod retry;
pub mod selector;
pub mod service;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientBuilder};
pub use error::{AllocatorError, ConfigError, LoadError};
pub use load::{LoadSummary, Protocol, run_load};
pub use retry::{Exhaustion, RetryMachine, RetryPolicy, RetryState};
pub use selector::{EndpointSelector, Selection};
pub use service::{AllocationRequestSpec, AllocationService, GrpcAllocationService};
