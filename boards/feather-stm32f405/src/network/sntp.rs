//! SNTP client (RFC 4330 client mode)
//!
//! Produces `TimeSample`s for the time authority; it never touches the RTC
//! itself. Failures are logged and the caller simply tries again at the next
//! sync interval.

use clock_core::{Duration as ClockDuration, TimeSample};
use defmt::{error, info, warn, Debug2Format, Format};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_futures::select::{select, Either};
use rtic_monotonics::fugit::ExtU64;
use rtic_monotonics::Monotonic;

use crate::time::to_clock_instant;
use crate::Mono;

use super::client::NetworkClient;
use super::config::SntpConfig;
use super::error::NetworkError;

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;

/// Seconds from 1900-01-01 (NTP epoch) to 1970-01-01
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Server time with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub struct Timestamp {
    /// Unix timestamp in seconds since epoch (1970-01-01 00:00:00 UTC)
    pub unix_secs: u64,
    /// Microseconds component (0-999,999)
    pub micros: u32,
}

impl Timestamp {
    pub const fn new(unix_secs: u64, micros: u32) -> Self {
        Self { unix_secs, micros }
    }

    /// Convert from NTP timestamp (seconds since 1900-01-01)
    pub fn from_ntp(ntp_secs: u64, ntp_frac: u32) -> Self {
        let unix_secs = ntp_secs.saturating_sub(NTP_UNIX_OFFSET);
        // Fraction is in units of 2^-32 s
        let micros = ((ntp_frac as u64 * 1_000_000) >> 32) as u32;
        Self::new(unix_secs, micros)
    }

    /// Add `micros`, carrying into the seconds
    pub fn add_micros(self, micros: u64) -> Self {
        let total = self.micros as u64 + micros;
        Self::new(
            self.unix_secs.saturating_add(total / 1_000_000),
            (total % 1_000_000) as u32,
        )
    }
}

/// SNTP client for time synchronization
pub struct SntpClient {
    config: SntpConfig,
}

impl SntpClient {
    pub fn new(config: SntpConfig) -> Self {
        Self { config }
    }

    /// Try every server in order, with retries, until one answers sensibly
    async fn sync(&self, stack: &Stack<'static>) -> Result<TimeSample, NetworkError> {
        info!("Starting SNTP synchronization");
        for server in self.config.servers {
            for attempt in 0..self.config.retry_count {
                info!(
                    "Attempting SNTP sync with {} (attempt {})",
                    server,
                    attempt + 1
                );
                match self.sntp_request(stack, server).await {
                    Ok(sample) => return Ok(sample),
                    Err(e) => {
                        warn!("SNTP sync failed: {:?}, retrying...", e);
                        Mono::delay(2000_u64.millis()).await;
                    }
                }
            }
        }
        error!("All SNTP sync attempts failed");
        Err(NetworkError::AllServersFailed)
    }

    async fn sntp_request(
        &self,
        stack: &Stack<'static>,
        server: &str,
    ) -> Result<TimeSample, NetworkError> {
        let server_ip = stack
            .dns_query(server, DnsQueryType::A)
            .await
            .map_err(|_| NetworkError::DnsError)?
            .first()
            .copied()
            .ok_or(NetworkError::DnsError)?;

        let server_endpoint = IpEndpoint::new(server_ip, NTP_PORT);
        info!("Resolved {} to {}", server, Debug2Format(&server_endpoint));

        let mut rx_meta = [PacketMetadata::EMPTY; 2];
        let mut rx_buffer = [0u8; 64];
        let mut tx_meta = [PacketMetadata::EMPTY; 2];
        let mut tx_buffer = [0u8; 64];
        let mut socket = UdpSocket::new(
            *stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| NetworkError::SocketError)?;

        // LI=0, VN=3, Mode=3 (client)
        let mut request = [0u8; NTP_PACKET_LEN];
        request[0] = 0x1B;
        let transmit_time = Mono::now();
        socket
            .send_to(&request, server_endpoint)
            .await
            .map_err(|_| NetworkError::SocketError)?;

        let mut response = [0u8; NTP_PACKET_LEN];
        let timeout = Mono::delay(self.config.timeout_ms.millis());
        let (recv_len, from_addr) = match select(timeout, socket.recv_from(&mut response)).await {
            Either::First(_) => return Err(NetworkError::Timeout),
            Either::Second(result) => result.map_err(|_| NetworkError::SocketError)?,
        };
        let receive_time = Mono::now();

        if recv_len < NTP_PACKET_LEN || from_addr.endpoint.addr != server_ip {
            return Err(NetworkError::InvalidResponse);
        }

        let leap = response[0] >> 6;
        let mode = response[0] & 0x07;
        if mode != 4 || leap == 3 {
            warn!("Unusable NTP reply (mode {}, leap {})", mode, leap);
            return Err(NetworkError::InvalidResponse);
        }

        let stratum = response[1];
        if stratum == 0 || stratum > self.config.max_stratum {
            warn!(
                "Invalid stratum {} (max {})",
                stratum, self.config.max_stratum
            );
            return Err(NetworkError::ServerError);
        }

        let tx_secs =
            u32::from_be_bytes([response[40], response[41], response[42], response[43]]) as u64;
        let tx_frac = u32::from_be_bytes([response[44], response[45], response[46], response[47]]);
        if tx_secs == 0 {
            return Err(NetworkError::InvalidResponse);
        }

        let rtt_micros = receive_time
            .checked_duration_since(transmit_time)
            .map(|d| d.to_micros())
            .unwrap_or(0);
        let timestamp = Timestamp::from_ntp(tx_secs, tx_frac).add_micros(rtt_micros / 2);

        // Pin the whole second to the monotonic instant it started at
        let received = to_clock_instant(receive_time);
        let observed_at = received
            .checked_sub_duration(ClockDuration::millis(timestamp.micros as u64 / 1000))
            .unwrap_or(received);

        info!(
            "NTP time {}.{:06} UTC from stratum {} (RTT {} us)",
            timestamp.unix_secs, timestamp.micros, stratum, rtt_micros
        );
        Ok(TimeSample::network(timestamp.unix_secs, observed_at))
    }
}

impl NetworkClient for SntpClient {
    type Output = TimeSample;

    async fn run(&mut self, stack: &Stack<'static>) -> Result<Self::Output, NetworkError> {
        self.sync(stack).await
    }
}
