//! Non-blocking session state machine

use hal_abstractions::{LinkStatus, Transport};
use heapless::{String, Vec};

use super::{
    ClientIdGenerator, ReconnectBudget, SessionConfig, SessionState, Subscription,
    CLIENT_ID_MAX_LEN, MAX_SUBSCRIPTIONS,
};
use crate::config::ConfigError;
use crate::dispatch::Publisher;
use crate::time::Instant;

/// Owner of the single control-channel session
///
/// `SessionState` is mutated only here (and by the `SessionPublisher` this
/// type hands out, which can only ever drop the session to `Disconnected`).
pub struct SessionManager {
    state: SessionState,
    budget: ReconnectBudget,
    subscriptions: Vec<Subscription, MAX_SUBSCRIPTIONS>,
    ids: ClientIdGenerator,
    client_id: String<CLIENT_ID_MAX_LEN>,
    max_inbound_per_tick: u8,
    connects: u32,
}

impl SessionManager {
    /// Create a manager in `Disconnected`
    ///
    /// `seed` feeds the client identifier nonce; pass something that differs
    /// between boots (hardware RNG output, for instance).
    pub fn new(
        config: &SessionConfig,
        subscriptions: Vec<Subscription, MAX_SUBSCRIPTIONS>,
        seed: u32,
    ) -> Result<Self, ConfigError> {
        if config.max_inbound_per_tick == 0 {
            return Err(ConfigError::InvalidInboundLimit);
        }
        if config.min_reconnect_interval.ticks() == 0 {
            return Err(ConfigError::InvalidReconnectInterval);
        }

        Ok(Self {
            state: SessionState::Disconnected,
            budget: ReconnectBudget::new(
                config.min_reconnect_interval,
                config.max_reconnect_interval,
            ),
            subscriptions,
            ids: ClientIdGenerator::new(config.client_id_prefix, seed)?,
            client_id: String::new(),
            max_inbound_per_tick: config.max_inbound_per_tick,
            connects: 0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn budget(&self) -> &ReconnectBudget {
        &self.budget
    }

    /// Identifier used for the most recent connection attempt
    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Successful connections since boot
    pub fn connect_count(&self) -> u32 {
        self.connects
    }

    /// Advance the state machine by one step
    ///
    /// Call once per scheduling cycle. Returns the state entered during this
    /// tick, if it changed.
    ///
    /// While connected, buffered inbound messages are handed to `on_message`
    /// in arrival order, at most `max_inbound_per_tick` per call; the rest
    /// wait for the next tick. Nothing is drained in the tick that completes
    /// the connection, so every subscription is issued before the first
    /// message is dispatched.
    pub fn tick<T, F>(
        &mut self,
        now: Instant,
        transport: &mut T,
        mut on_message: F,
    ) -> Option<SessionState>
    where
        T: Transport,
        F: FnMut(&str, &[u8], &mut SessionPublisher<'_, T>),
    {
        match self.state {
            SessionState::Disconnected => {
                if !self.budget.permits(now) {
                    return None;
                }
                self.client_id = self.ids.next_id();
                self.budget.record_attempt(now);
                info!("Connecting to broker as {}", self.client_id.as_str());
                transport.connect(&self.client_id);
                self.enter(SessionState::Connecting)
            }
            SessionState::Connecting => match transport.link_status() {
                LinkStatus::Pending => None,
                LinkStatus::Down => {
                    self.budget.record_failure();
                    warn!(
                        "Broker connection failed, next attempt in {} ms",
                        self.budget.interval().to_millis()
                    );
                    self.enter(SessionState::Disconnected)
                }
                LinkStatus::Up => {
                    for sub in self.subscriptions.iter() {
                        if !transport.subscribe(&sub.topic, sub.qos) {
                            warn!("Subscribe to {} failed", sub.topic.as_str());
                            self.budget.record_failure();
                            return self.enter(SessionState::Disconnected);
                        }
                        debug!("Subscribed to {} (QoS {})", sub.topic.as_str(), sub.qos.level());
                    }
                    self.budget.reset();
                    self.connects = self.connects.wrapping_add(1);
                    info!(
                        "Session established ({} subscriptions)",
                        self.subscriptions.len()
                    );
                    self.enter(SessionState::Connected)
                }
            },
            SessionState::Connected => {
                if !transport.is_connected() {
                    warn!("Broker connection lost");
                    return self.enter(SessionState::Disconnected);
                }
                for _ in 0..self.max_inbound_per_tick {
                    let Some(message) = transport.poll_inbound() else {
                        break;
                    };
                    debug!(
                        "Inbound on {} ({} bytes)",
                        message.topic.as_str(),
                        message.payload.len()
                    );
                    let mut publisher = SessionPublisher {
                        state: &mut self.state,
                        transport: &mut *transport,
                    };
                    on_message(message.topic.as_str(), &message.payload, &mut publisher);
                    if self.state != SessionState::Connected {
                        return Some(self.state);
                    }
                }
                None
            }
        }
    }

    /// Best-effort publish
    ///
    /// Only succeeds while connected. Otherwise the message is dropped
    /// without touching the transport; there is no store-and-forward.
    pub fn publish<T: Transport>(
        &mut self,
        transport: &mut T,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> bool {
        self.publisher(transport).publish(topic, payload, retained)
    }

    /// A `Publisher` bound to this session and `transport`
    pub fn publisher<'a, T: Transport>(&'a mut self, transport: &'a mut T) -> SessionPublisher<'a, T> {
        SessionPublisher {
            state: &mut self.state,
            transport,
        }
    }

    fn enter(&mut self, state: SessionState) -> Option<SessionState> {
        self.state = state;
        Some(state)
    }
}

/// Publishes through the session, honouring its connection state
pub struct SessionPublisher<'a, T> {
    state: &'a mut SessionState,
    transport: &'a mut T,
}

impl<T: Transport> Publisher for SessionPublisher<'_, T> {
    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        if *self.state != SessionState::Connected {
            debug!("Not connected, dropping publish to {}", topic);
            return false;
        }
        if self.transport.publish(topic, payload, retained) {
            true
        } else {
            warn!("Publish to {} failed, dropping session", topic);
            *self.state = SessionState::Disconnected;
            false
        }
    }
}
