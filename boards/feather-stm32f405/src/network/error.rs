//! Network error types

use defmt::Format;

/// TLS failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum TlsError {
    /// Handshake did not complete
    HandshakeFailed,
}

/// MQTT failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum MqttError {
    /// CONNECT was refused or never acknowledged
    ConnectionFailed,
    /// SUBSCRIBE could not be written
    SubscribeFailed,
    /// PUBLISH could not be written
    PublishFailed,
    /// Malformed topic, identifier or packet
    ProtocolError,
    /// Connection dropped while polling
    ConnectionLost,
}

/// Network client operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// DNS resolution failed
    DnsError,
    /// Socket bind/connect error
    SocketError,
    /// Request timeout
    Timeout,
    /// Invalid response from server
    InvalidResponse,
    /// Server error (e.g., unusable stratum for NTP)
    ServerError,
    /// All configured servers failed
    AllServersFailed,
    /// Ethernet controller did not come up
    HardwareInit,
    Tls(TlsError),
    Mqtt(MqttError),
}

impl core::fmt::Display for TlsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HandshakeFailed => write!(f, "TLS handshake failed"),
        }
    }
}

impl core::fmt::Display for MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "MQTT connection failed"),
            Self::SubscribeFailed => write!(f, "MQTT subscribe failed"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::ProtocolError => write!(f, "MQTT protocol error"),
            Self::ConnectionLost => write!(f, "MQTT connection lost"),
        }
    }
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DnsError => write!(f, "DNS resolution failed"),
            Self::SocketError => write!(f, "Socket error"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::ServerError => write!(f, "Server error"),
            Self::AllServersFailed => write!(f, "All servers failed"),
            Self::HardwareInit => write!(f, "Ethernet controller init failed"),
            Self::Tls(e) => write!(f, "{}", e),
            Self::Mqtt(e) => write!(f, "{}", e),
        }
    }
}

impl core::error::Error for TlsError {}
impl core::error::Error for MqttError {}
impl core::error::Error for NetworkError {}

impl From<TlsError> for NetworkError {
    fn from(e: TlsError) -> Self {
        Self::Tls(e)
    }
}

impl From<MqttError> for NetworkError {
    fn from(e: MqttError) -> Self {
        Self::Mqtt(e)
    }
}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError => embedded_io_async::ErrorKind::BrokenPipe,
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::InvalidResponse => embedded_io_async::ErrorKind::InvalidData,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}
