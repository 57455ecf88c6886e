//! Protobuf types and gRPC client for the game-server allocation service.
//!
//! The code under [`allocation`] is pre-generated from the service's
//! `allocation.proto` and committed so the build does not need `protoc`.

#![allow(clippy::all)]

/// Generated protobuf messages and the `AllocationService` client.
pub mod allocation;
