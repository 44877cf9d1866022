//! Network protocols for the clock
//!
//! - `sntp`: one-shot SNTP exchange producing a `TimeSample`
//! - `mqtt`: the MQTT-over-TLS control channel task
//! - `socket`: broker TCP connection with an idle timeout, carries TLS
//! - `manager`: DHCP wait and lease logging

pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod mqtt;
pub mod socket;
pub mod sntp;

pub use client::NetworkClient;
pub use config::{MqttConfig, NetworkConfig, SntpConfig};
pub use error::NetworkError;
pub use mqtt::MqttSession;
pub use sntp::SntpClient;
