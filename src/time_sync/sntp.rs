//! SNTP client
//!
//! One request/response exchange with an NTP server over UDP.

use log::debug;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Duration, Instant};

/// SNTP port (UDP 123)
const SNTP_PORT: u16 = 123;

/// SNTP request timeout
const SNTP_TIMEOUT: Duration = Duration::from_secs(5);

/// NTP packet size without extensions
const NTP_PACKET_LEN: usize = 48;

/// NTP epoch offset (1900-01-01 to 1970-01-01 in seconds)
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Seconds in one NTP era (2^32)
const NTP_ERA_SECS: u64 = 1 << 32;

/// Largest stratum of a synchronised server; 16 means unsynchronised
const MAX_STRATUM: u8 = 15;

/// RTT/2 correction is clamped to this
const MAX_RTT_CORRECTION: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SntpError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("invalid response: {0}")]
    InvalidResponse(&'static str),
    #[error("server stratum {0} not usable")]
    InvalidStratum(u8),
}

/// Client request: LI=0, VN=3, Mode=3
pub fn build_request() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Extract the server transmit time from a response
///
/// `rtt` is the measured round trip; half of it is added to the result.
pub fn parse_response(response: &[u8], rtt: Duration) -> Result<OffsetDateTime, SntpError> {
    if response.len() < NTP_PACKET_LEN {
        return Err(SntpError::InvalidResponse("short packet"));
    }

    let mode = response[0] & 0x07;
    if mode != 4 {
        return Err(SntpError::InvalidResponse("not a server reply"));
    }

    let stratum = response[1];
    if stratum == 0 || stratum > MAX_STRATUM {
        return Err(SntpError::InvalidStratum(stratum));
    }

    // Transmit timestamp (bytes 40-47)
    let secs = u32::from_be_bytes([response[40], response[41], response[42], response[43]]) as u64;
    let frac = u32::from_be_bytes([response[44], response[45], response[46], response[47]]) as u64;
    if secs == 0 && frac == 0 {
        return Err(SntpError::InvalidResponse("empty transmit timestamp"));
    }

    // Values below the Unix offset belong to era 1 (from 2036-02-07)
    let secs = if secs >= NTP_UNIX_OFFSET {
        secs - NTP_UNIX_OFFSET
    } else {
        secs + NTP_ERA_SECS - NTP_UNIX_OFFSET
    };
    let nanos = (frac * 1_000_000_000) >> 32;

    let transmit = OffsetDateTime::from_unix_timestamp(secs as i64)
        .map_err(|_| SntpError::InvalidResponse("timestamp out of range"))?
        + time::Duration::nanoseconds(nanos as i64);

    Ok(transmit + (rtt / 2).min(MAX_RTT_CORRECTION))
}

/// Query `server` once
pub async fn query(server: &str) -> Result<OffsetDateTime, SntpError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect((server, SNTP_PORT)).await?;
    debug!("Sending SNTP request to {}", server);

    let sent = Instant::now();
    socket.send(&build_request()).await?;

    let mut response = [0u8; NTP_PACKET_LEN];
    let len = timeout(SNTP_TIMEOUT, socket.recv(&mut response))
        .await
        .map_err(|_| SntpError::Timeout(SNTP_TIMEOUT))??;

    parse_response(&response[..len], sent.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn response(stratum: u8, ntp_secs: u32, frac: u32) -> [u8; NTP_PACKET_LEN] {
        let mut packet = [0u8; NTP_PACKET_LEN];
        packet[0] = 0x1C; // LI=0, VN=3, Mode=4
        packet[1] = stratum;
        packet[40..44].copy_from_slice(&ntp_secs.to_be_bytes());
        packet[44..48].copy_from_slice(&frac.to_be_bytes());
        packet
    }

    #[test]
    fn request_is_a_client_packet() {
        let request = build_request();
        assert_eq!(request[0] & 0x07, 3);
        assert_eq!((request[0] >> 3) & 0x07, 3);
        assert!(request[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn transmit_time_is_converted_to_unix() {
        // 2024-01-01T00:00:00Z
        let ntp_secs = (1_704_067_200u64 + NTP_UNIX_OFFSET) as u32;
        let parsed = parse_response(&response(2, ntp_secs, 1 << 31), Duration::ZERO).unwrap();

        assert_eq!(parsed, datetime!(2024-01-01 00:00:00.5 UTC));
    }

    #[test]
    fn half_the_round_trip_is_added() {
        let ntp_secs = (1_704_067_200u64 + NTP_UNIX_OFFSET) as u32;
        let parsed =
            parse_response(&response(1, ntp_secs, 0), Duration::from_millis(300)).unwrap();

        assert_eq!(parsed, datetime!(2024-01-01 00:00:00.15 UTC));
    }

    #[test]
    fn second_era_timestamps_wrap() {
        let parsed = parse_response(&response(2, 10, 0), Duration::ZERO).unwrap();

        assert_eq!(parsed, datetime!(2036-02-07 06:28:26 UTC));
    }

    #[test]
    fn unsynchronised_servers_are_rejected() {
        let ntp_secs = (1_704_067_200u64 + NTP_UNIX_OFFSET) as u32;

        assert!(matches!(
            parse_response(&response(0, ntp_secs, 0), Duration::ZERO),
            Err(SntpError::InvalidStratum(0))
        ));
        assert!(matches!(
            parse_response(&response(16, ntp_secs, 0), Duration::ZERO),
            Err(SntpError::InvalidStratum(16))
        ));
    }

    #[test]
    fn malformed_packets_are_rejected() {
        assert!(matches!(
            parse_response(&[0x1C; 12], Duration::ZERO),
            Err(SntpError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(&build_request(), Duration::ZERO),
            Err(SntpError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(&response(2, 0, 0), Duration::ZERO),
            Err(SntpError::InvalidResponse(_))
        ));
    }
}
