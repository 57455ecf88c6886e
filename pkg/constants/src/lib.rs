//! Centralized constants for the allocator client.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod env;
pub mod load;
pub mod network;
pub mod paths;
pub mod retry;
