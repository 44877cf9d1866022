//! Non-blocking `Transport` over the MQTT task
//!
//! The clock task must never wait on the network, so the core's `Transport`
//! calls are turned into messages on bounded channels. The MQTT task owns
//! the TLS connection, executes the commands and reports the link state
//! through an atomic.

use core::sync::atomic::{AtomicU8, Ordering};

use clock_core::session::CLIENT_ID_MAX_LEN;
use defmt::{debug, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use hal_abstractions::{
    InboundMessage, LinkStatus, QoS, Transport, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN,
};
use heapless::{String, Vec};

/// Depth of each direction's queue
pub const QUEUE_DEPTH: usize = 8;

/// Work for the MQTT task
pub enum MqttCommand {
    /// (Re)connect with this client identifier
    Connect(String<CLIENT_ID_MAX_LEN>),
    Subscribe {
        topic: String<MAX_TOPIC_LEN>,
        qos: QoS,
    },
    Publish {
        topic: String<MAX_TOPIC_LEN>,
        payload: Vec<u8, MAX_PAYLOAD_LEN>,
        retained: bool,
    },
}

/// Link state shared between the clock task and the MQTT task
///
/// The clock task writes `Pending` when it asks for a session. The MQTT task
/// writes `Up` once the broker accepts it and `Down` only when a session
/// fails with no newer request queued, so a requested reconnect is never
/// reported as failed.
pub struct Link(AtomicU8);

impl Link {
    const PENDING: u8 = 0;
    const UP: u8 = 1;
    const DOWN: u8 = 2;

    pub const fn new() -> Self {
        Self(AtomicU8::new(Self::DOWN))
    }

    pub fn get(&self) -> LinkStatus {
        match self.0.load(Ordering::Acquire) {
            Self::PENDING => LinkStatus::Pending,
            Self::UP => LinkStatus::Up,
            _ => LinkStatus::Down,
        }
    }

    pub fn set(&self, status: LinkStatus) {
        let raw = match status {
            LinkStatus::Pending => Self::PENDING,
            LinkStatus::Up => Self::UP,
            LinkStatus::Down => Self::DOWN,
        };
        self.0.store(raw, Ordering::Release);
    }
}

/// Everything the two sides share
pub struct MqttBridge {
    pub commands: Channel<CriticalSectionRawMutex, MqttCommand, QUEUE_DEPTH>,
    pub inbound: Channel<CriticalSectionRawMutex, InboundMessage, QUEUE_DEPTH>,
    pub link: Link,
}

impl MqttBridge {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            inbound: Channel::new(),
            link: Link::new(),
        }
    }
}

/// The clock task's side of the bridge
pub struct ChannelTransport {
    bridge: &'static MqttBridge,
}

impl ChannelTransport {
    pub fn new(bridge: &'static MqttBridge) -> Self {
        Self { bridge }
    }

    fn send(&self, command: MqttCommand) -> bool {
        self.bridge.commands.try_send(command).is_ok()
    }
}

impl Transport for ChannelTransport {
    fn connect(&mut self, client_id: &str) {
        // Anything still queued belongs to the previous session
        while self.bridge.inbound.try_receive().is_ok() {}
        while self.bridge.commands.try_receive().is_ok() {}

        let mut id = String::new();
        if id.push_str(client_id).is_err() {
            warn!("Client ID too long: {}", client_id);
            self.bridge.link.set(LinkStatus::Down);
            return;
        }

        self.bridge.link.set(LinkStatus::Pending);
        if !self.send(MqttCommand::Connect(id)) {
            self.bridge.link.set(LinkStatus::Down);
        }
    }

    fn link_status(&mut self) -> LinkStatus {
        self.bridge.link.get()
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        let mut t = String::new();
        if t.push_str(topic).is_err() {
            return false;
        }
        self.send(MqttCommand::Subscribe { topic: t, qos })
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        let mut t = String::new();
        if t.push_str(topic).is_err() {
            return false;
        }
        let Ok(payload) = Vec::from_slice(payload) else {
            debug!("Payload too large for {}", topic);
            return false;
        };
        self.send(MqttCommand::Publish {
            topic: t,
            payload,
            retained,
        })
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.bridge.inbound.try_receive().ok()
    }
}
