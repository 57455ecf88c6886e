use async_trait::async_trait;
use pkg_constants::network::{DEFAULT_PROBE_SCHEME, PROBE_TIMEOUT};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::Service;
use tracing::{debug, trace};

use crate::error::ProbeError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one latency probe.
///
/// Serialized with the field names printed by `ping-test`; durations are
/// integer nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub host: String,
    #[serde(with = "nanos")]
    pub dns_lookup_time: Duration,
    pub response: String,
    #[serde(with = "nanos")]
    pub response_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_nanos")]
    pub round_trip_time: Option<Duration>,
}

/// Instants recorded while a single request is in flight.
#[derive(Debug, Default)]
struct Phases {
    dns_start: OnceLock<Instant>,
    dns_end: OnceLock<Instant>,
    connector_start: OnceLock<Instant>,
}

impl Phases {
    /// When the TCP connect began.
    ///
    /// reqwest resolves inside its connector, so once a lookup happened the
    /// socket is opened at `dns_end`. IP literal hosts skip the lookup and
    /// connect as soon as the connector is called.
    fn connect_start(&self, request_start: Instant) -> Instant {
        self.dns_end
            .get()
            .or_else(|| self.connector_start.get())
            .copied()
            .unwrap_or(request_start)
    }

    fn dns_lookup_time(&self) -> Duration {
        match (self.dns_start.get(), self.dns_end.get()) {
            (Some(start), Some(end)) => end.duration_since(*start),
            _ => Duration::ZERO,
        }
    }
}

/// Connector wrapper that stamps when reqwest starts opening a connection.
#[derive(Clone)]
struct TimedConnect<S> {
    inner: S,
    phases: Arc<Phases>,
}

impl<S, R> Service<R> for TimedConnect<S>
where
    S: Service<R>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let _ = self.phases.connector_start.set(Instant::now());
        self.inner.call(req)
    }
}

/// DNS resolver that stamps the start and end of the lookup.
struct TimedResolver {
    phases: Arc<Phases>,
}

impl Resolve for TimedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let phases = self.phases.clone();
        Box::pin(async move {
            let host = name.as_str().to_string();
            let _ = phases.dns_start.set(Instant::now());
            trace!("dns start for {}", host);
            let resolved = tokio::net::lookup_host((host.as_str(), 0)).await;
            let _ = phases.dns_end.set(Instant::now());
            trace!("dns done for {}", host);

            let addrs: Vec<SocketAddr> = resolved?.collect();
            Ok::<Addrs, BoxError>(Box::new(addrs.into_iter()))
        })
    }
}

/// Prefix the default scheme onto a bare host.
pub fn normalize_target(target: &str) -> String {
    if target.contains("://") {
        target.to_string()
    } else {
        trace!(
            "host {} does not contain valid scheme - assuming {}",
            target, DEFAULT_PROBE_SCHEME
        );
        format!("{}{}", DEFAULT_PROBE_SCHEME, target)
    }
}

impl Trace {
    /// Run one timed GET against `target`.
    ///
    /// `response_time` spans from the start of the TCP connect to the
    /// arrival of the response head.
    pub async fn run(target: &str) -> Result<Trace, ProbeError> {
        Self::run_with_timeout(target, PROBE_TIMEOUT).await
    }

    pub async fn run_with_timeout(target: &str, timeout: Duration) -> Result<Trace, ProbeError> {
        let host = normalize_target(target);
        let url = reqwest::Url::parse(&host).map_err(|e| ProbeError::InvalidTarget {
            target: host.clone(),
            reason: e.to_string(),
        })?;

        debug!("starting trace on host: {}", host);

        let phases = Arc::new(Phases::default());
        let client = reqwest::Client::builder()
            .dns_resolver(Arc::new(TimedResolver {
                phases: phases.clone(),
            }))
            .connector_layer(tower::layer::layer_fn({
                let phases = phases.clone();
                move |inner| TimedConnect {
                    inner,
                    phases: phases.clone(),
                }
            }))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|source| ProbeError::Request {
                target: host.clone(),
                source,
            })?;

        let request_start = Instant::now();
        let resp = client
            .get(url)
            .send()
            .await
            .map_err(|source| ProbeError::Request {
                target: host.clone(),
                source,
            })?;
        let first_byte = Instant::now();
        trace!("got first response byte from {} ({})", host, resp.status());

        let response = resp.text().await.map_err(|source| ProbeError::Request {
            target: host.clone(),
            source,
        })?;
        let done = Instant::now();

        let connect_start = phases.connect_start(request_start);

        Ok(Trace {
            host,
            dns_lookup_time: phases.dns_lookup_time(),
            response,
            response_time: first_byte.duration_since(connect_start),
            round_trip_time: Some(done.duration_since(request_start)),
        })
    }
}

/// Return the trace with the smallest response time.
/// Ties go to the trace seen first.
pub fn fastest_trace(traces: &[Trace]) -> Result<&Trace, ProbeError> {
    let (first, rest) = traces.split_first().ok_or(ProbeError::EmptyTraces)?;

    let mut fastest = first;
    for t in rest {
        trace!("{:?}", t);
        if t.response_time < fastest.response_time {
            fastest = t;
        }
    }
    Ok(fastest)
}

/// Something that can measure the latency of a probe target.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Result<Trace, ProbeError>;
}

/// [`Prober`] backed by [`Trace::run`].
#[derive(Debug, Clone)]
pub struct HttpProber {
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &str) -> Result<Trace, ProbeError> {
        Trace::run_with_timeout(target, self.timeout).await
    }
}

mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(d)?))
    }
}

mod opt_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => super::nanos::serialize(d, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn trace_with(host: &str, nanos: u64) -> Trace {
        Trace {
            host: host.to_string(),
            response_time: Duration::from_nanos(nanos),
            ..Default::default()
        }
    }

    /// Serve a single canned HTTP response on a random local port.
    async fn serve_once(body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 512];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let resp = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.unwrap();
        });
        addr
    }

    #[test]
    fn test_fastest_trace_single() {
        let traces = vec![trace_with("http://example.com", 0)];
        let got = fastest_trace(&traces).unwrap();
        assert_eq!(got.host, "http://example.com");
    }

    #[test]
    fn test_fastest_trace_empty() {
        let err = fastest_trace(&[]).unwrap_err();
        assert!(matches!(err, ProbeError::EmptyTraces));
        assert_eq!(err.to_string(), "cannot handle empty slice of traces");
    }

    #[test]
    fn test_fastest_trace_picks_minimum() {
        let traces = vec![trace_with("slower", 300), trace_with("faster", 100)];
        assert_eq!(fastest_trace(&traces).unwrap().host, "faster");
    }

    #[test]
    fn test_fastest_trace_tie_keeps_first() {
        let traces = vec![
            trace_with("a", 200),
            trace_with("b", 100),
            trace_with("c", 100),
        ];
        assert_eq!(fastest_trace(&traces).unwrap().host, "b");
    }

    #[test]
    fn test_connect_start_prefers_dns_end() {
        let request_start = Instant::now();
        let phases = Phases::default();
        assert_eq!(phases.connect_start(request_start), request_start);
        assert_eq!(phases.dns_lookup_time(), Duration::ZERO);

        let connector = request_start + Duration::from_millis(1);
        phases.connector_start.set(connector).unwrap();
        assert_eq!(phases.connect_start(request_start), connector);

        let dns_start = request_start + Duration::from_millis(2);
        let dns_end = request_start + Duration::from_millis(7);
        phases.dns_start.set(dns_start).unwrap();
        phases.dns_end.set(dns_end).unwrap();
        assert_eq!(phases.connect_start(request_start), dns_end);
        assert_eq!(phases.dns_lookup_time(), Duration::from_millis(5));
    }

    #[test]
    fn test_timed_connect_stamps_once() {
        #[derive(Clone)]
        struct Echo;

        impl Service<u8> for Echo {
            type Response = u8;
            type Error = std::convert::Infallible;
            type Future = std::future::Ready<Result<u8, Self::Error>>;

            fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: u8) -> Self::Future {
                std::future::ready(Ok(req))
            }
        }

        let phases = Arc::new(Phases::default());
        let mut svc = TimedConnect {
            inner: Echo,
            phases: phases.clone(),
        };
        let before = Instant::now();
        let _ = svc.call(1);
        let first = *phases.connector_start.get().unwrap();
        let _ = svc.call(2);
        assert!(first >= before);
        assert_eq!(phases.connector_start.get(), Some(&first));
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("google.com"), "http://google.com");
        assert_eq!(normalize_target("http://google.com"), "http://google.com");
        assert_eq!(
            normalize_target("https://ping.example.com/healthz"),
            "https://ping.example.com/healthz"
        );
    }

    #[test]
    fn test_trace_json_field_names() {
        let t = Trace {
            host: "http://ping.example.com".to_string(),
            dns_lookup_time: Duration::from_nanos(1500),
            response: "ok".to_string(),
            response_time: Duration::from_millis(2),
            round_trip_time: None,
        };
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["host"], "http://ping.example.com");
        assert_eq!(v["dnsLookupTime"], 1500);
        assert_eq!(v["response"], "ok");
        assert_eq!(v["responseTime"], 2_000_000);
        assert!(v.get("roundTripTime").is_none());

        let with_rtt = Trace {
            round_trip_time: Some(Duration::from_nanos(42)),
            ..t
        };
        let v = serde_json::to_value(&with_rtt).unwrap();
        assert_eq!(v["roundTripTime"], 42);
    }

    #[tokio::test]
    async fn test_run_against_local_server() {
        let addr = serve_once("pong").await;
        let trace = Trace::run(&addr.to_string()).await.unwrap();

        assert_eq!(trace.host, format!("http://{}", addr));
        assert_eq!(trace.response, "pong");
        // IP literal: no lookup happened.
        assert_eq!(trace.dns_lookup_time, Duration::ZERO);
        let rtt = trace.round_trip_time.unwrap();
        assert!(trace.response_time <= rtt);
    }

    #[tokio::test]
    async fn test_run_refused_connection() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Trace::run(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, ProbeError::Request { .. }));
    }

    #[tokio::test]
    async fn test_run_empty_target_is_invalid() {
        let err = Trace::run("").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn test_http_prober_delegates_to_trace() {
        let addr = serve_once("hello").await;
        let prober = HttpProber::new(Duration::from_secs(5));
        let trace = prober.probe(&addr.to_string()).await.unwrap();
        assert_eq!(trace.response, "hello");
    }
}
