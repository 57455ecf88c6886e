//! Shared data types for the allocator client.

pub mod allocation;
pub mod config;
pub mod endpoint;
