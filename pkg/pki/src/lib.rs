//! Client-side TLS material for mutually-authenticated gRPC.

mod credentials;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use credentials::{ClientCredentials, CredentialError};
