use pkg_constants::network::ALLOCATOR_CONNECT_TIMEOUT;
use pkg_ping::{HttpProber, Prober};
use pkg_pki::ClientCredentials;
use pkg_proto::allocation::AllocationResponse;
use pkg_types::allocation::{Allocation, MetaPatch};
use pkg_types::endpoint::{Candidate, normalize_endpoint};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, trace};

use crate::error::{AllocatorError, ConfigError};
use crate::retry::{Exhaustion, RetryMachine, RetryPolicy, RetryState};
use crate::selector::EndpointSelector;
use crate::service::{AllocationRequestSpec, AllocationService, GrpcAllocationService};

/// Builder for [`Client`].
///
/// Exactly one of [`with_hosts`](Self::with_hosts) or
/// [`with_probe_targets`](Self::with_probe_targets) must be supplied.
pub struct ClientBuilder {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Vec<u8>,
    hosts: Vec<String>,
    probed: Vec<Candidate>,
    request: AllocationRequestSpec,
    retry: RetryPolicy,
    connect_timeout: Duration,
    prober: Option<Arc<dyn Prober>>,
    service: Option<Arc<dyn AllocationService>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            cert_pem: Vec::new(),
            key_pem: Vec::new(),
            ca_pem: Vec::new(),
            hosts: Vec::new(),
            probed: Vec::new(),
            request: AllocationRequestSpec::default(),
            retry: RetryPolicy::default(),
            connect_timeout: ALLOCATOR_CONNECT_TIMEOUT,
            prober: None,
            service: None,
        }
    }

    /// PEM client certificate, private key and CA bundle.
    pub fn with_credentials(
        mut self,
        cert_pem: impl Into<Vec<u8>>,
        key_pem: impl Into<Vec<u8>>,
        ca_pem: impl Into<Vec<u8>>,
    ) -> Self {
        self.cert_pem = cert_pem.into();
        self.key_pem = key_pem.into();
        self.ca_pem = ca_pem.into();
        self
    }

    /// Candidate endpoints used as-is, without latency probing.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Candidate endpoints paired with the probe target ranking them.
    pub fn with_probe_targets<I, E, T>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (E, T)>,
        E: Into<String>,
        T: Into<String>,
    {
        self.probed = pairs
            .into_iter()
            .map(|(endpoint, target)| Candidate::with_probe(endpoint, target))
            .collect();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.request.namespace = namespace.into();
        self
    }

    pub fn with_multicluster(mut self, enabled: bool) -> Self {
        self.request.multicluster = enabled;
        self
    }

    pub fn with_match_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.request.match_labels = labels;
        self
    }

    pub fn with_meta_patch(mut self, patch: MetaPatch) -> Self {
        self.request.meta_patch = Some(patch);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replace the HTTP prober used for endpoint selection.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Replace the gRPC allocation transport.
    pub fn with_service(mut self, service: Arc<dyn AllocationService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Validate the configuration, then resolve the active endpoint.
    ///
    /// Configuration errors are reported before any probe is sent.
    pub async fn build(self) -> Result<Client, AllocatorError> {
        let credentials = ClientCredentials::new(self.cert_pem, self.key_pem, self.ca_pem)
            .map_err(ConfigError::from)?;

        let candidates: Vec<Candidate> = match (self.hosts.is_empty(), self.probed.is_empty()) {
            (true, true) => return Err(ConfigError::NoEndpoints.into()),
            (false, false) => return Err(ConfigError::ConflictingEndpoints.into()),
            (false, true) => self.hosts.into_iter().map(Candidate::new).collect(),
            (true, false) => self.probed,
        };

        let prober: Arc<dyn Prober> = match self.prober {
            Some(prober) => prober,
            None => Arc::new(HttpProber::default()),
        };
        let selection = EndpointSelector::new(prober).select(candidates).await?;
        info!("client endpoint is set to {}", selection.active);

        let service: Arc<dyn AllocationService> = match self.service {
            Some(service) => service,
            None => Arc::new(GrpcAllocationService::new(&credentials, self.connect_timeout)),
        };

        Ok(Client {
            service,
            request: self.request,
            candidates: selection.eligible,
            active: RwLock::new(selection.active),
            retry: self.retry,
        })
    }
}

/// Allocation client bound to one set of candidate endpoints.
///
/// Safe to share across tasks: the active endpoint is the only mutable
/// state and only [`failover`](Self::failover) writes it.
pub struct Client {
    service: Arc<dyn AllocationService>,
    request: AllocationRequestSpec,
    candidates: Vec<Candidate>,
    active: RwLock<String>,
    retry: RetryPolicy,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The endpoint the next attempt will use.
    pub async fn endpoint(&self) -> String {
        self.active.read().await.clone()
    }

    /// Candidates still eligible after selection.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// One allocation attempt against the active endpoint.
    pub async fn allocate(&self) -> Result<Allocation, AllocatorError> {
        let endpoint = self.endpoint().await;
        self.allocate_on(&endpoint).await
    }

    #[instrument(level = "trace", skip(self))]
    async fn allocate_on(&self, endpoint: &str) -> Result<Allocation, AllocatorError> {
        let timeout = self.retry.attempt_timeout;
        let call = self.service.allocate(endpoint, self.request.to_proto());
        let response = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| AllocatorError::Timeout {
                endpoint: endpoint.to_string(),
                timeout,
            })??;
        to_allocation(endpoint, response)
    }

    /// Allocate, retrying with exponential backoff and failing over to
    /// another candidate after each failure.
    pub async fn allocate_with_retry(&self) -> Result<Allocation, AllocatorError> {
        let mut machine = RetryMachine::new(&self.retry);

        loop {
            let endpoint = self.endpoint().await;
            let err = match self.allocate_on(&endpoint).await {
                Ok(allocation) => {
                    machine.succeed();
                    return Ok(allocation);
                }
                Err(err) => err,
            };
            debug!("{}", err);

            match machine.fail() {
                RetryState::Retrying { retry, delay } => {
                    debug!(
                        "retrying in {:.3}s - {} retries left",
                        delay.as_secs_f64(),
                        self.retry.max_retries - retry
                    );
                    self.failover(&endpoint).await;
                    tokio::time::sleep(delay).await;
                    machine.resume();
                }
                RetryState::Exhausted(Exhaustion::Disabled) => {
                    return Err(AllocatorError::RetriesDisabled {
                        source: Box::new(err),
                    });
                }
                RetryState::Exhausted(Exhaustion::Limit { retries }) => {
                    return Err(AllocatorError::Exhausted {
                        retries,
                        last: Box::new(err),
                    });
                }
                // `fail` only leaves Attempting for Retrying or Exhausted.
                RetryState::Attempting { .. } | RetryState::Succeeded => return Err(err),
            }
        }
    }

    /// Move off `failed` to the next eligible candidate.
    ///
    /// A no-op when another task already moved the active endpoint, or when
    /// there is nothing to fail over to. Returns the active endpoint.
    pub async fn failover(&self, failed: &str) -> String {
        let mut active = self.active.write().await;
        if active.as_str() != failed || self.candidates.len() < 2 {
            return active.clone();
        }

        let len = self.candidates.len();
        let start = self
            .candidates
            .iter()
            .position(|c| normalize_endpoint(&c.endpoint) == failed)
            .map_or(0, |p| p + 1);
        let next = (0..len)
            .map(|i| normalize_endpoint(&self.candidates[(start + i) % len].endpoint))
            .find(|ep| ep != failed);

        if let Some(next) = next {
            debug!("trying a different allocator this time: {}", next);
            *active = next;
        }
        active.clone()
    }
}

fn to_allocation(endpoint: &str, response: AllocationResponse) -> Result<Allocation, AllocatorError> {
    let port = response
        .ports
        .first()
        .ok_or_else(|| AllocatorError::EmptyPorts {
            endpoint: endpoint.to_string(),
        })?
        .port;
    let port = u16::try_from(port).map_err(|_| AllocatorError::InvalidPort(port))?;
    trace!("allocated {}:{} via {}", response.address, port, endpoint);

    Ok(Allocation {
        address: response.address,
        port,
    })
}
