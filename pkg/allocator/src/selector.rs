use futures_util::future::join_all;
use pkg_ping::{ProbeError, Prober, Trace, fastest_trace, normalize_target};
use pkg_types::endpoint::{Candidate, normalize_endpoint};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AllocatorError, ConfigError};

/// Outcome of endpoint selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Normalized (`host:port`) endpoint to allocate against.
    pub active: String,
    /// Candidates that survived probing, in input order. Failover picks
    /// from these.
    pub eligible: Vec<Candidate>,
}

/// Picks the allocation endpoint whose probe target answers fastest.
pub struct EndpointSelector {
    prober: Arc<dyn Prober>,
}

impl EndpointSelector {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Select the active endpoint among `candidates`.
    ///
    /// Without any probe target the first candidate wins. Otherwise every
    /// distinct probe target is probed once, concurrently; candidates whose
    /// probe failed are pruned, and the owner of the fastest trace becomes
    /// active. Candidates without a probe target stay eligible but are never
    /// chosen by latency.
    pub async fn select(&self, candidates: Vec<Candidate>) -> Result<Selection, AllocatorError> {
        let first = candidates.first().ok_or(ConfigError::NoEndpoints)?;

        if candidates.iter().all(|c| c.probe_target.is_none()) {
            let active = normalize_endpoint(&first.endpoint);
            debug!("no probe targets given, using first endpoint {}", active);
            return Ok(Selection {
                active,
                eligible: candidates,
            });
        }

        let mut seen = HashSet::new();
        let targets: Vec<&str> = candidates
            .iter()
            .filter_map(|c| c.probe_target.as_deref())
            .filter(|t| seen.insert(*t))
            .collect();

        for c in &candidates {
            debug!(
                "checking ping for server: {} ping: {}",
                c.endpoint,
                c.probe_target.as_deref().unwrap_or("")
            );
        }
        let results: Vec<(&str, Result<Trace, ProbeError>)> =
            join_all(targets.iter().map(|t| async move { (*t, self.prober.probe(t).await) }))
                .await;

        let mut failed = HashSet::new();
        let mut traces = Vec::new();
        for (target, result) in results {
            match result {
                Ok(trace) => traces.push(trace),
                Err(e) => {
                    debug!("trace failed on {} - {}", target, e);
                    failed.insert(target.to_string());
                }
            }
        }

        // Unreachable candidates are dropped, not retried.
        let eligible: Vec<Candidate> = candidates
            .iter()
            .filter(|c| {
                c.probe_target
                    .as_ref()
                    .is_none_or(|t| !failed.contains(t))
            })
            .cloned()
            .collect();

        if traces.is_empty() {
            return Err(AllocatorError::NoTracesSucceeded);
        }

        let fastest = fastest_trace(&traces)?;
        let owner = eligible
            .iter()
            .find(|c| {
                c.probe_target
                    .as_deref()
                    .is_some_and(|t| normalize_target(t) == fastest.host)
            })
            .ok_or_else(|| AllocatorError::UnresolvedFastest(fastest.host.clone()))?;

        let active = normalize_endpoint(&owner.endpoint);
        info!(
            "setting fastest endpoint to {} ({:?} via {})",
            active, fastest.response_time, fastest.host
        );
        Ok(Selection { active, eligible })
    }
}
