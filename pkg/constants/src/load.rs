//! Load-test constants.

use std::time::Duration;

/// Default number of concurrent sessions in a load test.
pub const DEFAULT_COUNT: usize = 10;

/// Default seconds between two session launches.
pub const DEFAULT_DELAY_SECS: u64 = 2;

/// Default seconds each session is held open.
pub const DEFAULT_DURATION_SECS: u64 = 10;

/// Default transport used to talk to allocated game servers.
pub const DEFAULT_PROTOCOL: &str = "udp";

/// Greeting line sent over TCP.
pub const TCP_HELLO: &[u8] = b"HELLO\n";

/// Farewell line sent over TCP.
pub const TCP_EXIT: &[u8] = b"EXIT\n";

/// Sentinel datagram that tells a UDP game server to shut the session.
pub const UDP_EXIT: &[u8] = b"EXIT";

/// How long a TCP session waits for the game server's reply to `HELLO`.
pub const TCP_REPLY_TIMEOUT: Duration = Duration::from_secs(5);
