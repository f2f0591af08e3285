//! SNTP (RFC 4330) client probe.
//!
//! One request, one reply, one timeout. The reply only has to carry a
//! non-zero transmit timestamp; clock accuracy is not evaluated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

use super::{measure_time, Probe, ProbeOutcome};
use crate::catalog::Endpoint;
use crate::error::ProbeError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// NTP packets without extension fields are 48 bytes
pub const PACKET_LEN: usize = 48;

/// Seconds between the NTP era (1900) and the Unix epoch (1970)
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Length of one NTP era, 2^32 seconds
const ERA_SECONDS: i64 = 1 << 32;

const VERSION: u8 = 4;
const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const MODE_BROADCAST: u8 = 5;

/// Client request: LI = 0, VN = 4, mode = 3, everything else zero
pub fn client_request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = (VERSION << 3) | MODE_CLIENT;
    packet
}

/// Transmit timestamp of a reply, 32.32 fixed point seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTimestamp {
    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.fraction == 0
    }

    /// Wall-clock time, era chosen by the top bit of `seconds` (RFC 4330 §3):
    /// set means 1968-2036, clear means 2036-2104
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let seconds = self.seconds as i64;
        let unix_secs = if self.seconds & 0x8000_0000 != 0 {
            seconds - NTP_UNIX_OFFSET
        } else {
            seconds + ERA_SECONDS - NTP_UNIX_OFFSET
        };
        let nanos = ((self.fraction as u64 * 1_000_000_000) >> 32) as u32;
        DateTime::<Utc>::from_timestamp(unix_secs, nanos)
    }
}

/// Transmit timestamp of a server reply, `None` if the reply is not a usable
/// server response or the timestamp is zero
pub fn parse_reply(reply: &[u8]) -> Option<NtpTimestamp> {
    if reply.len() < PACKET_LEN {
        return None;
    }

    let mode = reply[0] & 0x07;
    if mode != MODE_SERVER && mode != MODE_BROADCAST {
        return None;
    }

    let timestamp = NtpTimestamp {
        seconds: u32::from_be_bytes([reply[40], reply[41], reply[42], reply[43]]),
        fraction: u32::from_be_bytes([reply[44], reply[45], reply[46], reply[47]]),
    };
    if timestamp.is_zero() {
        return None;
    }
    Some(timestamp)
}

async fn exchange(host: &str, port: u16) -> std::io::Result<Option<NtpTimestamp>> {
    let remote = lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;

    let bind_addr = if remote.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    // connected, so ICMP port-unreachable surfaces as an error
    socket.connect(remote).await?;
    socket.send(&client_request()).await?;

    let mut buf = [0u8; 512];
    let n = socket.recv(&mut buf).await?;
    Ok(parse_reply(&buf[..n]))
}

/// Query `host:port` once. Every failure, including a malformed reply,
/// yields an unreachable outcome instead of an error.
pub async fn probe_ntp(host: &str, port: u16, sync_timeout: Duration) -> ProbeOutcome {
    let (result, duration_ms) = measure_time(timeout(sync_timeout, exchange(host, port))).await;

    match result {
        Ok(Ok(Some(timestamp))) => {
            let detail = match timestamp.to_utc() {
                Some(time) => format!("server time {}", time.to_rfc3339()),
                None => format!("server time {}.{}", timestamp.seconds, timestamp.fraction),
            };
            debug!(host, port, duration_ms, %detail, "ntp exchange succeeded");
            ProbeOutcome::reachable(duration_ms).with_detail(detail)
        }
        Ok(Ok(None)) => {
            debug!(host, port, duration_ms, "ntp reply carried no usable time");
            ProbeOutcome::unreachable(duration_ms).with_detail("invalid NTP reply")
        }
        Ok(Err(e)) => {
            debug!(host, port, duration_ms, error = %e, "ntp exchange failed");
            ProbeOutcome::unreachable(duration_ms).with_detail(e.to_string())
        }
        Err(_) => {
            debug!(host, port, duration_ms, "ntp exchange timed out");
            ProbeOutcome::unreachable(duration_ms)
                .with_detail(format!("timed out after {}ms", sync_timeout.as_millis()))
        }
    }
}

/// NTP probe with a fixed exchange timeout
pub struct NtpProbe {
    timeout: Duration,
}

impl NtpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for NtpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Probe for NtpProbe {
    fn name(&self) -> &'static str {
        "ntp"
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome, ProbeError> {
        Ok(probe_ntp(endpoint.host(), endpoint.port, self.timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Protocol;
    use std::time::Instant;

    // 2024-01-01T00:00:00Z in NTP seconds
    const NTP_2024: u32 = 3_913_056_000;

    fn server_reply(mode: u8, seconds: u32) -> [u8; PACKET_LEN] {
        let mut reply = [0u8; PACKET_LEN];
        reply[0] = (VERSION << 3) | mode;
        reply[1] = 2; // stratum
        reply[40..44].copy_from_slice(&seconds.to_be_bytes());
        reply
    }

    /// Answer the first request with `reply`
    async fn spawn_server(reply: [u8; PACKET_LEN]) -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            if let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                assert_eq!(n, PACKET_LEN);
                assert_eq!(buf[0] & 0x07, MODE_CLIENT);
                let _ = socket.send_to(&reply, peer).await;
            }
        });

        port
    }

    #[test]
    fn test_client_request_header() {
        let packet = client_request();
        assert_eq!(packet[0], 0x23);
        assert!(packet[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_reply() {
        let timestamp = parse_reply(&server_reply(MODE_SERVER, NTP_2024)).unwrap();
        assert_eq!(
            timestamp.to_utc().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );

        assert!(parse_reply(&server_reply(MODE_SERVER, 0)).is_none());
        assert!(parse_reply(&server_reply(MODE_CLIENT, NTP_2024)).is_none());
        assert!(parse_reply(&[0x24; 12]).is_none());
        assert!(parse_reply(&server_reply(MODE_BROADCAST, NTP_2024)).is_some());
    }

    #[test]
    fn test_any_nonzero_timestamp_counts() {
        // seconds zero, fraction set
        let mut reply = server_reply(MODE_SERVER, 0);
        reply[44..48].copy_from_slice(&5u32.to_be_bytes());
        let timestamp = parse_reply(&reply).unwrap();
        assert_eq!(timestamp.fraction, 5);
        // 2036-02-07T06:28:16Z, start of era 1
        assert_eq!(timestamp.to_utc().unwrap().timestamp(), 2_085_978_496);

        let after_rollover = parse_reply(&server_reply(MODE_SERVER, 1000)).unwrap();
        assert_eq!(after_rollover.to_utc().unwrap().timestamp(), 2_085_978_496 + 1000);
    }

    #[tokio::test]
    async fn test_post_rollover_server_is_reachable() {
        let port = spawn_server(server_reply(MODE_SERVER, 1000)).await;
        let outcome = probe_ntp("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(outcome.reachable);
        assert!(outcome.detail.unwrap().contains("2036-02-07"));
    }

    #[tokio::test]
    async fn test_server_with_time_is_reachable() {
        let port = spawn_server(server_reply(MODE_SERVER, NTP_2024)).await;
        let outcome = probe_ntp("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(outcome.reachable);
        assert!(outcome.detail.unwrap().contains("2024-01-01"));
    }

    #[tokio::test]
    async fn test_zero_time_is_unreachable() {
        let port = spawn_server(server_reply(MODE_SERVER, 0)).await;
        let outcome = probe_ntp("127.0.0.1", port, Duration::from_secs(2)).await;
        assert!(!outcome.reachable);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let start = Instant::now();
        let outcome = probe_ntp("127.0.0.1", port, Duration::from_millis(300)).await;
        assert!(!outcome.reachable);
        assert!(start.elapsed() < Duration::from_secs(2));
        drop(socket);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        let outcome = probe_ntp("does-not-exist.invalid", 123, Duration::from_secs(2)).await;
        assert!(!outcome.reachable);
    }

    #[tokio::test]
    async fn test_probe_trait_never_errors() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        drop(socket);

        let probe = NtpProbe::new(Duration::from_millis(300));
        let endpoint = Endpoint::required("127.0.0.1", port, Protocol::Ntp);
        let outcome = probe.probe(&endpoint).await.unwrap();
        assert!(!outcome.reachable);
    }
}
