//! Synthetic load: many concurrent allocate-then-play sessions.

use pkg_constants::load::{TCP_EXIT, TCP_HELLO, TCP_REPLY_TIMEOUT, UDP_EXIT};
use pkg_types::allocation::Allocation;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::client::Client;
use crate::error::{ConfigError, LoadError};

/// Transport used to talk to an allocated game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(ConfigError::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "udp"),
            Protocol::Tcp => write!(f, "tcp"),
        }
    }
}

/// Counters for one load run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub launched: usize,
    pub allocated: usize,
    pub completed: usize,
    pub failed: usize,
}

enum Outcome {
    Completed,
    /// Allocated, but the session broke.
    SessionFailed,
    NotAllocated,
}

/// Launch `count` sessions, `delay` apart, each holding its game server for
/// `duration`. Returns once every session has finished.
///
/// Only an unknown `protocol` is an error; per-session failures are logged
/// and counted.
pub async fn run_load(
    client: Arc<Client>,
    count: usize,
    delay: Duration,
    duration: Duration,
    protocol: &str,
) -> Result<LoadSummary, ConfigError> {
    let protocol: Protocol = protocol.parse()?;
    info!(
        "starting load test: {} sessions, {:?} apart, {:?} each over {}",
        count, delay, duration, protocol
    );

    let mut summary = LoadSummary::default();
    let mut units = JoinSet::new();
    for id in 0..count {
        if id > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let client = client.clone();
        let span = info_span!("unit", id);
        units.spawn(run_unit(client, id, duration, protocol).instrument(span));
        summary.launched += 1;
    }

    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(Outcome::Completed) => {
                summary.allocated += 1;
                summary.completed += 1;
            }
            Ok(Outcome::SessionFailed) => {
                summary.allocated += 1;
                summary.failed += 1;
            }
            Ok(Outcome::NotAllocated) => summary.failed += 1,
            Err(e) => {
                warn!("load unit panicked: {}", e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "load test finished: launched={} allocated={} completed={} failed={}",
        summary.launched, summary.allocated, summary.completed, summary.failed
    );
    Ok(summary)
}

async fn run_unit(client: Arc<Client>, id: usize, duration: Duration, protocol: Protocol) -> Outcome {
    let allocation = match client.allocate_with_retry().await {
        Ok(a) => a,
        Err(e) => {
            warn!("{}", LoadError::from(e));
            return Outcome::NotAllocated;
        }
    };
    info!("Got allocation {} {}", allocation.address, allocation.port);

    let session = match protocol {
        Protocol::Tcp => tcp_session(&allocation, duration).await,
        Protocol::Udp => udp_session(&allocation, id, duration).await,
    };
    match session {
        Ok(()) => Outcome::Completed,
        Err(e) => {
            warn!("{}", e);
            Outcome::SessionFailed
        }
    }
}

async fn resolve(allocation: &Allocation) -> Result<SocketAddr, LoadError> {
    let target = allocation.socket_addr();
    let resolved = tokio::net::lookup_host(target.as_str()).await?.next();
    resolved.ok_or(LoadError::Unresolvable(target))
}

async fn tcp_session(allocation: &Allocation, duration: Duration) -> Result<(), LoadError> {
    let addr = resolve(allocation).await?;
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(TCP_HELLO).await?;

    let (reader, mut writer) = stream.split();
    let mut reply = String::new();
    // The reply is informational; the session goes on without one.
    match tokio::time::timeout(TCP_REPLY_TIMEOUT, BufReader::new(reader).read_line(&mut reply)).await {
        Ok(Ok(n)) if n > 0 => info!("received: {}", reply.trim_end()),
        Ok(Ok(_)) => debug!("game server closed its side before replying"),
        Ok(Err(e)) => debug!("reading reply from {} failed: {}", addr, e),
        Err(_) => debug!("no reply from {} within {:?}", addr, TCP_REPLY_TIMEOUT),
    }

    tokio::time::sleep(duration).await;
    writer.write_all(TCP_EXIT).await?;
    writer.shutdown().await?;
    debug!("tcp session to {} closed", addr);
    Ok(())
}

async fn udp_session(allocation: &Allocation, id: usize, duration: Duration) -> Result<(), LoadError> {
    let addr = resolve(allocation).await?;
    let bind: SocketAddr = if addr.is_ipv4() {
        ([0u8; 4], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.connect(addr).await?;

    socket
        .send(format!("Hello from process {}!", id).as_bytes())
        .await?;
    tokio::time::sleep(duration).await;
    socket
        .send(format!("Goodbye from process {}.", id).as_bytes())
        .await?;
    socket.send(UDP_EXIT).await?;
    debug!("udp session to {} closed", addr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::{MockService, test_credentials};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    async fn client(service: Arc<MockService>) -> Arc<Client> {
        let (cert, key, ca) = test_credentials();
        let client = Client::builder()
            .with_credentials(cert, key, ca)
            .with_hosts(["alloc"])
            .with_namespace("default")
            .with_retry_policy(RetryPolicy::default().with_max_retries(0))
            .with_service(service)
            .build()
            .await
            .unwrap();
        Arc::new(client)
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        let err = "quic".parse::<Protocol>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "protocol must be one of (udp|tcp), got \"quic\""
        );
    }

    #[tokio::test]
    async fn test_unknown_protocol_launches_nothing() {
        let svc = Arc::new(MockService::allocating("127.0.0.1", 7000));
        let c = client(svc.clone()).await;

        let err = run_load(c, 5, Duration::ZERO, Duration::ZERO, "sctp")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedProtocol(_)));
        assert_eq!(svc.calls(), 0);
    }

    #[tokio::test]
    async fn test_udp_session_against_silent_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        let svc = Arc::new(MockService::allocating("127.0.0.1", port as i32));
        let c = client(svc).await;

        let summary = run_load(c, 1, Duration::ZERO, Duration::from_millis(10), "udp")
            .await
            .unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                launched: 1,
                allocated: 1,
                completed: 1,
                failed: 0
            }
        );

        let mut buf = [0u8; 64];
        let mut got = Vec::new();
        for _ in 0..3 {
            let n = server.recv(&mut buf).await.unwrap();
            got.push(String::from_utf8_lossy(&buf[..n]).to_string());
        }
        assert_eq!(
            got,
            vec!["Hello from process 0!", "Goodbye from process 0.", "EXIT"]
        );
    }

    #[tokio::test]
    async fn test_tcp_session_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = stream.into_split();
            let mut lines = BufReader::new(reader).lines();
            let hello = lines.next_line().await.unwrap();
            writer.write_all(b"ACK: HELLO\n").await.unwrap();
            let exit = lines.next_line().await.unwrap();
            (hello, exit)
        });

        let svc = Arc::new(MockService::allocating("127.0.0.1", port as i32));
        let c = client(svc).await;
        let summary = run_load(c, 1, Duration::ZERO, Duration::from_millis(10), "tcp")
            .await
            .unwrap();
        assert_eq!(summary.completed, 1);

        let (hello, exit) = server.await.unwrap();
        assert_eq!(hello.as_deref(), Some("HELLO"));
        assert_eq!(exit.as_deref(), Some("EXIT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tcp_session_without_reply_still_exits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Reads everything until the client closes, never writes.
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        let svc = Arc::new(MockService::allocating("127.0.0.1", port as i32));
        let c = client(svc).await;
        let summary = run_load(c, 1, Duration::ZERO, Duration::from_millis(10), "tcp")
            .await
            .unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                launched: 1,
                allocated: 1,
                completed: 1,
                failed: 0
            }
        );

        let received = server.await.unwrap();
        assert_eq!(received, b"HELLO\nEXIT\n");
    }

    #[tokio::test]
    async fn test_failed_allocations_are_counted() {
        let svc = Arc::new(MockService::failing());
        let c = client(svc.clone()).await;

        let summary = run_load(c, 3, Duration::ZERO, Duration::ZERO, "udp")
            .await
            .unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                launched: 3,
                allocated: 0,
                completed: 0,
                failed: 3
            }
        );
        assert_eq!(svc.calls(), 3);
    }

    #[tokio::test]
    async fn test_broken_session_does_not_stop_siblings() {
        // Nothing listens on the TCP port, so every session fails to connect.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let svc = Arc::new(MockService::allocating("127.0.0.1", port as i32));
        let c = client(svc.clone()).await;
        let summary = run_load(c, 2, Duration::ZERO, Duration::ZERO, "tcp")
            .await
            .unwrap();
        assert_eq!(summary.launched, 2);
        assert_eq!(summary.allocated, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(svc.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launches_are_staggered() {
        let svc = Arc::new(MockService::failing());
        let c = client(svc.clone()).await;

        let start = Instant::now();
        let summary = run_load(c, 3, Duration::from_secs(2), Duration::ZERO, "udp")
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(summary.launched, 3);
        // Two gaps; no sleep after the last launch.
        assert!(elapsed >= Duration::from_secs(4), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(6), "{:?}", elapsed);
    }
}
