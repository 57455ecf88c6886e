//! Test doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use pkg_ping::{ProbeError, Prober, Trace, normalize_target};
use pkg_proto::allocation::allocation_response::GameServerStatusPort;
use pkg_proto::allocation::{AllocationRequest, AllocationResponse};
use pkg_pki::testing::issue_test_material;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::AllocatorError;
use crate::service::AllocationService;

/// Prober answering from a fixed table; unknown targets are unreachable.
#[derive(Default)]
pub struct FakeProber {
    latencies: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reachable(mut self, target: &str, latency: Duration) -> Self {
        self.latencies.insert(target.to_string(), latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, target: &str) -> Result<Trace, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.latencies.get(target) {
            Some(latency) => Ok(Trace {
                host: normalize_target(target),
                response_time: *latency,
                ..Default::default()
            }),
            None => Err(ProbeError::InvalidTarget {
                target: target.to_string(),
                reason: "no such host".to_string(),
            }),
        }
    }
}

/// Scripted allocation service that records every call.
pub struct MockService {
    fail_first: usize,
    hang: bool,
    response: AllocationResponse,
    calls: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
    requests: Mutex<Vec<AllocationRequest>>,
}

impl MockService {
    /// Succeeds on every call with `address:port`.
    pub fn allocating(address: &str, port: i32) -> Self {
        Self {
            fail_first: 0,
            hang: false,
            response: AllocationResponse {
                game_server_name: "simple-game-server-x7k2p".to_string(),
                ports: vec![GameServerStatusPort {
                    name: "default".to_string(),
                    port,
                }],
                address: address.to_string(),
                node_name: "node-1".to_string(),
            },
            calls: AtomicUsize::new(0),
            endpoints: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call.
    pub fn failing() -> Self {
        Self::allocating("10.0.0.1", 7000).failing_first(usize::MAX)
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Never answers.
    pub fn hanging() -> Self {
        let mut svc = Self::allocating("10.0.0.1", 7000);
        svc.hang = true;
        svc
    }

    pub fn with_response(mut self, response: AllocationResponse) -> Self {
        self.response = response;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<AllocationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AllocationService for MockService {
    async fn allocate(
        &self,
        endpoint: &str,
        request: AllocationRequest,
    ) -> Result<AllocationResponse, AllocatorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        self.requests.lock().unwrap().push(request);

        if self.hang {
            std::future::pending::<()>().await;
        }
        if n < self.fail_first {
            return Err(AllocatorError::Rpc {
                endpoint: endpoint.to_string(),
                status: Box::new(tonic::Status::unavailable("no ready game servers")),
            });
        }
        Ok(self.response.clone())
    }
}

/// Throwaway CA and client identity.
/// Returns `(cert_pem, key_pem, ca_pem)`, the order the builder takes them.
pub fn test_credentials() -> (String, String, String) {
    let (ca, cert, key) = issue_test_material();
    (cert, key, ca)
}
