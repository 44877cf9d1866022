//! Control-channel session management
//!
//! One logical MQTT session, driven by `SessionManager::tick` from the main
//! loop. Connecting is fire-and-forget: the transport is asked to connect and
//! the outcome is polled on later ticks, so a slow broker never stalls the
//! display refresh.
//!
//! ```text
//!              budget permits
//! Disconnected ──────────────► Connecting
//!      ▲   ▲                      │
//!      │   └── link down ─────────┤
//!      │                          │ link up, subscriptions issued
//!      │                          ▼
//!      └── link lost / write ─ Connected
//!          failure
//! ```

mod budget;
mod client_id;
mod manager;

pub use budget::ReconnectBudget;
pub use client_id::{ClientIdGenerator, CLIENT_ID_MAX_LEN, CLIENT_ID_PREFIX_MAX_LEN};
pub use manager::{SessionManager, SessionPublisher};

use hal_abstractions::{QoS, MAX_TOPIC_LEN};
use heapless::String;

use crate::config::ConfigError;
use crate::time::Duration;

/// Upper bound on the static subscription list
pub const MAX_SUBSCRIPTIONS: usize = 4;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A topic to (re)subscribe on every successful connect
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subscription {
    pub topic: String<MAX_TOPIC_LEN>,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic: &str, qos: QoS) -> Result<Self, ConfigError> {
        let mut t = String::new();
        t.push_str(topic).map_err(|_| ConfigError::TopicTooLong)?;
        Ok(Self { topic: t, qos })
    }
}

/// Session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Minimum time between two connection attempts
    pub min_reconnect_interval: Duration,
    /// Backoff ceiling after repeated failures
    pub max_reconnect_interval: Duration,
    /// Client identifier prefix, 1-14 ASCII alphanumerics or dashes
    pub client_id_prefix: &'static str,
    /// Inbound messages dispatched per tick while connected
    pub max_inbound_per_tick: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_reconnect_interval: Duration::secs(10),
            max_reconnect_interval: Duration::minutes(5),
            client_id_prefix: "ntpclock",
            max_inbound_per_tick: 4,
        }
    }
}
