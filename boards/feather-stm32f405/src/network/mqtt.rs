//! MQTT v5.0 control channel over TLS 1.3
//!
//! Executes the commands queued by `ChannelTransport` and forwards inbound
//! publications back to the clock task. One broker session at a time:
//!
//! 1. Wait for a `Connect` command
//! 2. DNS, TCP, TLS handshake, MQTT CONNECT
//! 3. Mark the link `Up`, then serve subscribe/publish commands, inbound
//!    publications and keep-alive pings until something fails
//! 4. On failure mark the link `Down` and go back to 1. A `Connect`
//!    arriving mid-session starts the next session straight away, leaving
//!    the link `Pending` as the clock task set it.
//!
//! Reconnect pacing is the session manager's job, not ours.
//!
//! # Memory
//!
//! - MQTT packet buffer: 2 KB, bump allocated per session
//! - TCP buffers: 2 x 4 KB on the task's stack
//! - TLS buffers: 34 KB static, see `tls_buffers`

#![allow(unsafe_code)] // TLS buffer access and unchecked topic names

use clock_core::session::CLIENT_ID_MAX_LEN;
use defmt::{debug, error, info, warn, Debug2Format};
use embassy_futures::select::{select3, Either3};
use embassy_net::{dns::DnsQueryType, IpEndpoint, Stack};
use embassy_time::{Duration, Timer};
use embedded_tls::{
    Aes128GcmSha256, CryptoProvider, NoVerify, TlsConfig, TlsConnection, TlsContext, TlsVerifier,
};
use hal_abstractions::{InboundMessage, LinkStatus};
use heapless::String;
use rust_mqtt::{
    buffer::BumpBuffer,
    client::{
        event::Event,
        options::{ConnectOptions, PublicationOptions, SubscriptionOptions, TopicReference},
        Client,
    },
    config::{KeepAlive, SessionExpiryInterval},
    types::{MqttString, QoS, TopicFilter, TopicName},
    Bytes,
};

use crate::tls_buffers;
use crate::transport::{MqttBridge, MqttCommand};

use super::config::MqttConfig;
use super::error::{MqttError, NetworkError, TlsError};
use super::socket::BrokerSocket;

/// MQTT packet buffer size
const MQTT_BUFFER_SIZE: usize = 2048;

/// TCP buffer size, each direction
const TCP_BUFFER_SIZE: usize = 4096;

type ClientId = String<CLIENT_ID_MAX_LEN>;

/// TLS crypto provider backed by the hardware RNG
struct HardwareRngProvider<'a, RNG> {
    rng: &'a mut RNG,
    // Broker certificates are not verified yet
    verifier: NoVerify,
}

impl<'a, RNG> HardwareRngProvider<'a, RNG> {
    fn new(rng: &'a mut RNG) -> Self {
        Self {
            rng,
            verifier: NoVerify,
        }
    }
}

impl<RNG> CryptoProvider for HardwareRngProvider<'_, RNG>
where
    RNG: rand_core::CryptoRngCore,
{
    type CipherSuite = Aes128GcmSha256;
    type Signature = &'static [u8];

    fn rng(&mut self) -> impl rand_core::CryptoRngCore {
        &mut *self.rng
    }

    fn verifier(
        &mut self,
    ) -> Result<&mut impl TlsVerifier<Self::CipherSuite>, embedded_tls::TlsError> {
        Ok(&mut self.verifier)
    }
}

/// How a session ended without an error
enum SessionEnd {
    /// The clock task asked for a new session under this identifier
    Reconnect(ClientId),
}

/// Broker side of the control channel
pub struct MqttSession {
    config: MqttConfig,
}

impl MqttSession {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }

    /// Serve `bridge` forever
    pub async fn run<RNG>(&mut self, stack: &Stack<'static>, rng: &mut RNG, bridge: &'static MqttBridge) -> !
    where
        RNG: rand_core::RngCore + rand_core::CryptoRng,
    {
        let mut requested: Option<ClientId> = None;
        loop {
            let client_id = match requested.take() {
                Some(id) => id,
                None => wait_for_connect(bridge).await,
            };

            match self.session(stack, rng, bridge, &client_id).await {
                // `ChannelTransport::connect` already marked the link Pending
                // for this attempt; Down here would fail it before it starts.
                Ok(SessionEnd::Reconnect(id)) => {
                    info!("Reconnect requested as {}", id.as_str());
                    requested = Some(id);
                }
                Err(e) => {
                    warn!("MQTT session ended: {}", e);
                    // The clock may have asked again while this one was failing
                    match bridge.commands.try_receive() {
                        Ok(MqttCommand::Connect(id)) => requested = Some(id),
                        _ => bridge.link.set(LinkStatus::Down),
                    }
                }
            }
        }
    }

    async fn session<RNG>(
        &mut self,
        stack: &Stack<'static>,
        rng: &mut RNG,
        bridge: &'static MqttBridge,
        client_id: &str,
    ) -> Result<SessionEnd, NetworkError>
    where
        RNG: rand_core::RngCore + rand_core::CryptoRng,
    {
        info!(
            "Connecting to MQTT broker at {}:{} as {}",
            self.config.broker_host, self.config.broker_port, client_id
        );

        let server_ip = stack
            .dns_query(self.config.broker_host, DnsQueryType::A)
            .await
            .map_err(|e| {
                error!("DNS query failed: {:?}", Debug2Format(&e));
                NetworkError::DnsError
            })?
            .first()
            .copied()
            .ok_or_else(|| {
                error!("DNS returned no results for {}", self.config.broker_host);
                NetworkError::DnsError
            })?;
        let endpoint = IpEndpoint::new(server_ip, self.config.broker_port);

        let mut rx_buffer = [0u8; TCP_BUFFER_SIZE];
        let mut tx_buffer = [0u8; TCP_BUFFER_SIZE];
        let mut socket = BrokerSocket::new(*stack, &mut rx_buffer, &mut tx_buffer, self.config.keep_alive_secs);
        socket.connect(endpoint).await?;
        debug!("TCP connection established to {}", Debug2Format(&endpoint));

        // SAFETY: this task is the only TLS user, and the connection is
        // dropped before the next session borrows the buffers again.
        let (read_buf, write_buf) = unsafe { tls_buffers::tls_buffers() };

        let tls_config = TlsConfig::new().with_server_name(self.config.broker_host);
        let mut tls_connection =
            TlsConnection::<BrokerSocket, Aes128GcmSha256>::new(socket, read_buf, write_buf);
        let tls_context = TlsContext::new(&tls_config, HardwareRngProvider::new(rng));
        tls_connection.open(tls_context).await.map_err(|e| {
            error!("TLS handshake failed: {:?}", Debug2Format(&e));
            TlsError::HandshakeFailed
        })?;
        debug!("TLS 1.3 handshake complete");

        let mut mqtt_buffer = [0u8; MQTT_BUFFER_SIZE];
        let mut buffer = BumpBuffer::new(&mut mqtt_buffer);
        let mut client = Client::<'_, _, _, 1, 1, 1, 0>::new(&mut buffer);

        let connect_opts = ConnectOptions {
            session_expiry_interval: SessionExpiryInterval::EndOnDisconnect,
            clean_start: self.config.clean_start,
            keep_alive: if self.config.keep_alive_secs == 0 {
                KeepAlive::Infinite
            } else {
                KeepAlive::Seconds(self.config.keep_alive_secs)
            },
            will: None,
            user_name: None,
            password: None,
        };
        let mqtt_client_id = MqttString::new(client_id.into()).map_err(|e| {
            error!("Invalid MQTT client ID: {:?}", Debug2Format(&e));
            MqttError::ProtocolError
        })?;
        client
            .connect(tls_connection, &connect_opts, Some(mqtt_client_id))
            .await
            .map_err(|e| {
                error!("MQTT connect failed: {:?}", Debug2Format(&e));
                MqttError::ConnectionFailed
            })?;

        info!("MQTT session established");
        bridge.link.set(LinkStatus::Up);

        // Ping at half the keep-alive so the broker never times us out
        let ping_every = match self.config.keep_alive_secs {
            0 => Duration::from_secs(u32::MAX as u64),
            secs => Duration::from_secs((secs as u64 / 2).max(1)),
        };

        loop {
            // TODO: `poll` is not cancel-safe; a command arriving mid-packet
            // drops the partial read and the next poll sees garbage. Split the
            // client into reader and writer halves once rust-mqtt allows it.
            match select3(bridge.commands.receive(), client.poll(), Timer::after(ping_every)).await {
                Either3::First(MqttCommand::Connect(id)) => return Ok(SessionEnd::Reconnect(id)),
                Either3::First(MqttCommand::Subscribe { topic, qos }) => {
                    // SAFETY: topics come from `ControlTopics`, which rejects
                    // wildcards and empty levels.
                    let filter = unsafe { TopicFilter::new_unchecked(mqtt_string(&topic)?) };
                    let options = SubscriptionOptions {
                        qos: to_mqtt_qos(qos),
                        // Our own status publications share the command topic
                        no_local: true,
                        ..Default::default()
                    };
                    client.subscribe(filter, options).await.map_err(|e| {
                        error!("Subscribe to {} failed: {:?}", topic.as_str(), Debug2Format(&e));
                        MqttError::SubscribeFailed
                    })?;
                    debug!("Subscribed to {}", topic.as_str());
                }
                Either3::First(MqttCommand::Publish {
                    topic,
                    payload,
                    retained,
                }) => {
                    // SAFETY: as for subscribe, status topics never hold wildcards
                    let name = unsafe { TopicName::new_unchecked(mqtt_string(&topic)?) };
                    let options = PublicationOptions {
                        retain: retained,
                        message_expiry_interval: None,
                        topic: TopicReference::Name(name),
                        qos: QoS::AtMostOnce,
                    };
                    client
                        .publish(&options, Bytes::from(payload.as_slice()))
                        .await
                        .map_err(|e| {
                            error!("Publish to {} failed: {:?}", topic.as_str(), Debug2Format(&e));
                            MqttError::PublishFailed
                        })?;
                    debug!("Published {} bytes to {}", payload.len(), topic.as_str());
                }
                Either3::Second(event) => {
                    let event = event.map_err(|e| {
                        warn!("MQTT connection lost: {:?}", Debug2Format(&e));
                        MqttError::ConnectionLost
                    })?;
                    if let Event::Publish(publication) = event {
                        forward(bridge, publication.topic.as_ref(), &publication.message);
                    }
                }
                Either3::Third(()) => {
                    client.ping().await.map_err(|e| {
                        warn!("Keep-alive ping failed: {:?}", Debug2Format(&e));
                        MqttError::ConnectionLost
                    })?;
                }
            }
        }
    }
}

/// Block until the clock task asks for a session
async fn wait_for_connect(bridge: &'static MqttBridge) -> ClientId {
    loop {
        match bridge.commands.receive().await {
            MqttCommand::Connect(id) => return id,
            MqttCommand::Subscribe { topic, .. } | MqttCommand::Publish { topic, .. } => {
                debug!("Not connected, dropping command for {}", topic.as_str());
            }
        }
    }
}

/// Queue an inbound publication for the clock task
fn forward(bridge: &MqttBridge, topic: &str, payload: &[u8]) {
    let Some(message) = InboundMessage::new(topic, payload) else {
        warn!("Dropping oversized message on {}", topic);
        return;
    };
    if bridge.inbound.try_send(message).is_err() {
        warn!("Inbound queue full, dropping message");
    }
}

fn mqtt_string(s: &str) -> Result<MqttString<'_>, NetworkError> {
    MqttString::new(s.into()).map_err(|e| {
        error!("Invalid MQTT string: {:?}", Debug2Format(&e));
        MqttError::ProtocolError.into()
    })
}

fn to_mqtt_qos(qos: hal_abstractions::QoS) -> QoS {
    match qos {
        hal_abstractions::QoS::AtMostOnce => QoS::AtMostOnce,
        hal_abstractions::QoS::AtLeastOnce => QoS::AtLeastOnce,
        hal_abstractions::QoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}
