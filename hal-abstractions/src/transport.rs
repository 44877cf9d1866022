//! Publish/subscribe transport capability
//!
//! Every method returns immediately. A connect request is fire-and-forget;
//! its outcome is observed later through [`Transport::link_status`].

use heapless::{String, Vec};

/// Maximum topic length carried through the transport
pub const MAX_TOPIC_LEN: usize = 64;

/// Maximum inbound payload length; longer payloads are dropped by the transport
pub const MAX_PAYLOAD_LEN: usize = 32;

/// MQTT quality of service level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// QoS 0
    AtMostOnce = 0,
    /// QoS 1
    AtLeastOnce = 1,
    /// QoS 2
    ExactlyOnce = 2,
}

impl QoS {
    /// Numeric QoS level as sent on the wire
    pub const fn level(self) -> u8 {
        self as u8
    }
}

/// State of the underlying connection as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// A connect request is in flight
    Pending,
    /// Connected to the broker
    Up,
    /// Not connected: never connected, attempt failed, or connection lost
    Down,
}

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InboundMessage {
    /// Topic the message was published on
    pub topic: String<MAX_TOPIC_LEN>,
    /// Raw payload bytes
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// Build a message, returning `None` if topic or payload do not fit
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        let mut t = String::new();
        t.push_str(topic).ok()?;
        let payload = Vec::from_slice(payload).ok()?;
        Some(Self { topic: t, payload })
    }
}

/// Best-effort publish/subscribe connection
pub trait Transport {
    /// Start connecting with `client_id`; the result shows up in `link_status`
    fn connect(&mut self, client_id: &str);

    /// Current connection state
    fn link_status(&mut self) -> LinkStatus;

    /// Whether the connection is up
    fn is_connected(&mut self) -> bool {
        self.link_status() == LinkStatus::Up
    }

    /// Request a subscription; `false` if the request could not be written
    fn subscribe(&mut self, topic: &str, qos: QoS) -> bool;

    /// Publish at QoS 0; `false` if the message could not be written
    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool;

    /// Take the next buffered inbound message, if any
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_levels() {
        assert_eq!(QoS::AtMostOnce.level(), 0);
        assert_eq!(QoS::AtLeastOnce.level(), 1);
        assert_eq!(QoS::ExactlyOnce.level(), 2);
    }

    #[test]
    fn test_inbound_message_limits() {
        let msg = InboundMessage::new("home/jroom/clock/brightness", b"7").unwrap();
        assert_eq!(msg.topic.as_str(), "home/jroom/clock/brightness");
        assert_eq!(msg.payload.as_slice(), b"7");

        let long_payload = [b'1'; MAX_PAYLOAD_LEN + 1];
        assert!(InboundMessage::new("t", &long_payload).is_none());
    }
}
