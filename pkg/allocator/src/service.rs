use async_trait::async_trait;
use pkg_pki::ClientCredentials;
use pkg_proto::allocation::allocation_service_client::AllocationServiceClient;
use pkg_proto::allocation::{
    AllocationRequest, AllocationResponse, LabelSelector, MetaPatch as ProtoMetaPatch,
    MultiClusterSetting,
};
use pkg_types::allocation::MetaPatch;
use std::collections::BTreeMap;
use std::time::Duration;
use tonic::transport::{ClientTlsConfig, Endpoint};
use tracing::trace;

use crate::error::AllocatorError;

/// What the client asks the allocation service for. Fixed for the life of
/// a [`Client`](crate::Client).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationRequestSpec {
    pub namespace: String,
    pub multicluster: bool,
    pub match_labels: BTreeMap<String, String>,
    pub meta_patch: Option<MetaPatch>,
}

impl AllocationRequestSpec {
    pub fn to_proto(&self) -> AllocationRequest {
        AllocationRequest {
            namespace: self.namespace.clone(),
            multi_cluster_setting: Some(MultiClusterSetting {
                enabled: self.multicluster,
                policy_selector: None,
            }),
            required_game_server_selector: Some(LabelSelector {
                match_labels: self
                    .match_labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            }),
            meta_patch: self
                .meta_patch
                .as_ref()
                .filter(|p| !p.is_empty())
                .map(|p| ProtoMetaPatch {
                    labels: p.labels.clone().into_iter().collect(),
                    annotations: p.annotations.clone().into_iter().collect(),
                }),
            ..Default::default()
        }
    }
}

/// The remote `Allocate` call, seen from the client.
///
/// Implementations must not retry or fail over; that is the client's job.
#[async_trait]
pub trait AllocationService: Send + Sync {
    async fn allocate(
        &self,
        endpoint: &str,
        request: AllocationRequest,
    ) -> Result<AllocationResponse, AllocatorError>;
}

/// [`AllocationService`] over gRPC with mutual TLS. Each call dials the
/// endpoint afresh and drops the channel afterwards.
pub struct GrpcAllocationService {
    tls: ClientTlsConfig,
    connect_timeout: Duration,
}

impl GrpcAllocationService {
    pub fn new(credentials: &ClientCredentials, connect_timeout: Duration) -> Self {
        Self {
            tls: credentials.tls_config(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl AllocationService for GrpcAllocationService {
    async fn allocate(
        &self,
        endpoint: &str,
        request: AllocationRequest,
    ) -> Result<AllocationResponse, AllocatorError> {
        let channel = Endpoint::from_shared(format!("https://{}", endpoint))
            .and_then(|ep| ep.tls_config(self.tls.clone()))
            .map_err(|source| AllocatorError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                source,
            })?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|source| AllocatorError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let mut client = AllocationServiceClient::new(channel);
        let response = client
            .allocate(request)
            .await
            .map_err(|status| AllocatorError::Rpc {
                endpoint: endpoint.to_string(),
                status: Box::new(status),
            })?
            .into_inner();
        trace!("response: {:?}", response);

        Ok(response)
    }
}
