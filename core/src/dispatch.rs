//! Inbound command dispatch
//!
//! Maps `(topic, payload)` pairs from the control channel onto settings
//! changes and reports the applied value back on the status topic. The topic
//! table is fixed at construction; today it has a single entry, brightness.

use core::fmt::Write;
use core::num::IntErrorKind;

use hal_abstractions::{DisplaySink, QoS, BRIGHTNESS_MAX, MAX_TOPIC_LEN};
use heapless::{String, Vec};

use crate::config::ConfigError;
use crate::session::{Subscription, MAX_SUBSCRIPTIONS};

/// Brightness applied until a command says otherwise
pub const DEFAULT_BRIGHTNESS: u8 = 7;

/// Outbound side of the control channel, as seen by the dispatcher
pub trait Publisher {
    /// Best-effort, at-most-once publish. Returns whether the message was
    /// handed to the transport.
    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        P::publish(self, topic, payload, retained)
    }
}

/// Display brightness, always within `0..=BRIGHTNESS_MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrightnessSetting(u8);

impl BrightnessSetting {
    /// Clamp `level` into range
    pub const fn new(level: u8) -> Self {
        if level > BRIGHTNESS_MAX {
            Self(BRIGHTNESS_MAX)
        } else {
            Self(level)
        }
    }

    /// Clamp a signed request into range; negative values become 0
    pub fn from_request(value: i32) -> Self {
        Self(value.clamp(0, BRIGHTNESS_MAX as i32) as u8)
    }

    pub const fn level(self) -> u8 {
        self.0
    }
}

impl Default for BrightnessSetting {
    fn default() -> Self {
        Self(DEFAULT_BRIGHTNESS)
    }
}

/// Control topics for one clock
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlTopics {
    /// Inbound brightness commands
    pub brightness_command: String<MAX_TOPIC_LEN>,
    /// Outbound brightness status
    pub brightness_status: String<MAX_TOPIC_LEN>,
}

impl ControlTopics {
    /// Topics under `home/<room>/clock/`
    ///
    /// Commands and status share `home/<room>/clock/brightness`, which is
    /// what the existing home-automation dashboards expect.
    pub fn for_room(room: &str) -> Result<Self, ConfigError> {
        if room.is_empty() || room.contains(['/', '+', '#']) {
            return Err(ConfigError::InvalidRoom);
        }
        let mut topic = String::new();
        write!(topic, "home/{}/clock/brightness", room).map_err(|_| ConfigError::TopicTooLong)?;

        Ok(Self {
            brightness_command: topic.clone(),
            brightness_status: topic,
        })
    }

    /// Whether our own status publications come back as commands
    pub fn status_echoes(&self) -> bool {
        self.brightness_command
            .as_str()
            .eq_ignore_ascii_case(self.brightness_status.as_str())
    }
}

/// What a single `dispatch` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// Topic not in the table
    Ignored,
    /// Payload was not a decimal integer; nothing changed
    Malformed,
    /// Brightness set to `level`
    Applied {
        level: u8,
        /// The requested value was outside 0-15
        clamped: bool,
        /// The status publish was handed to the transport
        reported: bool,
    },
    /// Our own status publication coming back, with echo suppression on
    Echo { level: u8 },
}

/// Owner of the brightness setting
pub struct CommandDispatcher {
    topics: ControlTopics,
    brightness: BrightnessSetting,
    retain_status: bool,
    suppress_echo: bool,
    /// Level we last published on a topic we also listen to
    pending_echo: Option<u8>,
}

impl CommandDispatcher {
    pub fn new(topics: ControlTopics, brightness: BrightnessSetting, retain_status: bool) -> Self {
        Self {
            topics,
            brightness,
            retain_status,
            suppress_echo: false,
            pending_echo: None,
        }
    }

    /// Treat the next command matching our last status publication as its echo
    ///
    /// Off by default: a broker honouring no-local never returns our own
    /// publications, so a matching command is a real request.
    pub fn with_echo_suppression(mut self, suppress: bool) -> Self {
        self.suppress_echo = suppress;
        self
    }

    pub fn brightness(&self) -> BrightnessSetting {
        self.brightness
    }

    pub fn topics(&self) -> &ControlTopics {
        &self.topics
    }

    /// Topics the session must subscribe to, QoS 0
    pub fn subscriptions(&self) -> Vec<Subscription, MAX_SUBSCRIPTIONS> {
        core::iter::once(Subscription {
            topic: self.topics.brightness_command.clone(),
            qos: QoS::AtMostOnce,
        })
        .collect()
    }

    /// Handle one inbound message
    ///
    /// Total: every input either changes nothing or sets the brightness
    /// exactly once.
    pub fn dispatch<D, P>(
        &mut self,
        topic: &str,
        payload: &[u8],
        display: &mut D,
        out: &mut P,
    ) -> DispatchOutcome
    where
        D: DisplaySink + ?Sized,
        P: Publisher + ?Sized,
    {
        if !topic.eq_ignore_ascii_case(&self.topics.brightness_command) {
            debug!("No handler for topic {}", topic);
            return DispatchOutcome::Ignored;
        }

        let Some(requested) = parse_level(payload) else {
            warn!("Discarding malformed brightness payload ({} bytes)", payload.len());
            return DispatchOutcome::Malformed;
        };
        let setting = BrightnessSetting::from_request(requested);
        let level = setting.level();

        if let Some(echoed) = self.pending_echo.take() {
            if echoed == level && level == self.brightness.level() {
                debug!("Ignoring echo of brightness {}", level);
                return DispatchOutcome::Echo { level };
            }
        }

        let clamped = requested != level as i32;
        if clamped {
            info!("Brightness request {} clamped to {}", requested, level);
        }
        self.brightness = setting;
        display.set_brightness(level);
        info!("Brightness set to {}", level);

        let reported = self.report(out);
        DispatchOutcome::Applied {
            level,
            clamped,
            reported,
        }
    }

    /// Publish the current brightness on the status topic
    pub fn announce<P: Publisher + ?Sized>(&mut self, out: &mut P) -> bool {
        self.report(out)
    }

    fn report<P: Publisher + ?Sized>(&mut self, out: &mut P) -> bool {
        let level = self.brightness.level();
        let mut payload: String<4> = String::new();
        // At most two digits
        let _ = write!(payload, "{}", level);

        let sent = out.publish(&self.topics.brightness_status, payload.as_bytes(), self.retain_status);
        if sent && self.suppress_echo && self.topics.status_echoes() {
            self.pending_echo = Some(level);
        }
        sent
    }
}

/// Parse an ASCII decimal integer, saturating numerals too large for `i32`
fn parse_level(payload: &[u8]) -> Option<i32> {
    let text = core::str::from_utf8(payload).ok()?.trim();
    match text.parse::<i32>() {
        Ok(value) => Some(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Some(i32::MAX),
            IntErrorKind::NegOverflow => Some(i32::MIN),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(b"7"), Some(7));
        assert_eq!(parse_level(b" 12\r\n"), Some(12));
        assert_eq!(parse_level(b"+3"), Some(3));
        assert_eq!(parse_level(b"-4"), Some(-4));
        assert_eq!(parse_level(b"99999999999999"), Some(i32::MAX));
        assert_eq!(parse_level(b"-99999999999999"), Some(i32::MIN));
        assert_eq!(parse_level(b"abc"), None);
        assert_eq!(parse_level(b"7.5"), None);
        assert_eq!(parse_level(b""), None);
        assert_eq!(parse_level(&[0xff, 0x37]), None);
    }

    #[test]
    fn test_brightness_clamps() {
        assert_eq!(BrightnessSetting::new(40).level(), 15);
        assert_eq!(BrightnessSetting::from_request(-1).level(), 0);
        assert_eq!(BrightnessSetting::from_request(i32::MAX).level(), 15);
        assert_eq!(BrightnessSetting::default().level(), 7);
    }

    #[test]
    fn test_topics_for_room() {
        let topics = ControlTopics::for_room("jroom").unwrap();
        assert_eq!(topics.brightness_command.as_str(), "home/jroom/clock/brightness");
        assert!(topics.status_echoes());
        assert_eq!(ControlTopics::for_room(""), Err(ConfigError::InvalidRoom));
        assert_eq!(ControlTopics::for_room("a/b"), Err(ConfigError::InvalidRoom));
        assert_eq!(ControlTopics::for_room("#"), Err(ConfigError::InvalidRoom));
        let long = "r".repeat(60);
        assert_eq!(ControlTopics::for_room(&long), Err(ConfigError::TopicTooLong));
    }
}
