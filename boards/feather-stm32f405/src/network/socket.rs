#![deny(unsafe_code)]
//! Broker TCP connection
//!
//! `embedded-tls` runs over any embedded-io-async `Read + Write`. This wraps
//! the embassy-net socket carrying the MQTT session so that a broker which
//! goes quiet turns into an error instead of a read that never returns.

use defmt::{debug, warn, Debug2Format};
use embassy_net::tcp::{ConnectError, Error as TcpError, TcpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::Duration;
use embedded_io_async::{ErrorType, Read, Write};

use super::error::NetworkError;

/// Silence tolerated before the socket gives up, as the broker would
fn idle_timeout(keep_alive_secs: u16) -> Option<Duration> {
    match keep_alive_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs as u64 * 3 / 2)),
    }
}

/// TCP socket to the MQTT broker
pub struct BrokerSocket<'a> {
    socket: TcpSocket<'a>,
}

impl<'a> BrokerSocket<'a> {
    /// Open a socket on the caller's buffers
    ///
    /// With a non-zero `keep_alive_secs` the socket fails after one and a
    /// half keep-alive periods without traffic.
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8], keep_alive_secs: u16) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(idle_timeout(keep_alive_secs));
        Self { socket }
    }

    pub async fn connect(&mut self, endpoint: IpEndpoint) -> Result<(), NetworkError> {
        self.socket.connect(endpoint).await.map_err(|e| match e {
            ConnectError::TimedOut => {
                warn!("TCP connect to {} timed out", Debug2Format(&endpoint));
                NetworkError::Timeout
            }
            e => {
                warn!("TCP connect to {} failed: {:?}", Debug2Format(&endpoint), Debug2Format(&e));
                NetworkError::SocketError
            }
        })
    }
}

fn lost(e: TcpError) -> NetworkError {
    debug!("Broker socket: {:?}", Debug2Format(&e));
    NetworkError::SocketError
}

impl ErrorType for BrokerSocket<'_> {
    type Error = NetworkError;
}

impl Read for BrokerSocket<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(lost)
    }
}

impl Write for BrokerSocket<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(lost)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await.map_err(lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_timeout_follows_keep_alive() {
        assert_eq!(idle_timeout(60), Some(Duration::from_secs(90)));
        assert_eq!(idle_timeout(1), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_no_idle_timeout_without_keep_alive() {
        assert_eq!(idle_timeout(0), None);
    }
}
