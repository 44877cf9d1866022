//! Compile-time clock configuration

use crate::dispatch::ControlTopics;
use crate::face::FaceLayout;
use crate::session::{SessionConfig, CLIENT_ID_PREFIX_MAX_LEN};
use crate::time::{Duration, SyncPolicy, TimeZone};
use hal_abstractions::BRIGHTNESS_MAX;

/// Rejected configuration, reported once at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    InvalidClientIdPrefix,
    TopicTooLong,
    TooManySubscriptions,
    InvalidRoom,
    InvalidBrightness,
    InvalidInboundLimit,
    InvalidReconnectInterval,
    InvalidUtcOffset,
    InvalidSyncWindow,
    SyncIntervalOutOfRange,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidClientIdPrefix => write!(
                f,
                "client ID prefix must be 1-{} ASCII alphanumerics or dashes",
                CLIENT_ID_PREFIX_MAX_LEN
            ),
            Self::TopicTooLong => write!(f, "topic too long"),
            Self::TooManySubscriptions => write!(f, "too many subscriptions"),
            Self::InvalidRoom => write!(f, "room must be a non-empty topic level without wildcards"),
            Self::InvalidBrightness => write!(f, "brightness must be 0-{}", BRIGHTNESS_MAX),
            Self::InvalidInboundLimit => write!(f, "inbound limit must be at least 1"),
            Self::InvalidReconnectInterval => write!(f, "reconnect interval must be non-zero"),
            Self::InvalidUtcOffset => write!(f, "UTC offset must be within +/-14 hours"),
            Self::InvalidSyncWindow => write!(f, "sync policy window is empty"),
            Self::SyncIntervalOutOfRange => write!(f, "sync interval must be 6-24 hours"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Shortest accepted network time sync interval
pub const MIN_SYNC_INTERVAL: Duration = Duration::hours(6);
/// Longest accepted network time sync interval
pub const MAX_SYNC_INTERVAL: Duration = Duration::hours(24);

const MAX_UTC_OFFSET_MINUTES: i16 = 14 * 60;

/// Everything the clock needs to know before it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Topic level naming this clock, as in `home/<room>/clock/brightness`
    pub room: &'static str,
    pub twelve_hour: bool,
    pub zone: TimeZone,
    /// Brightness applied at start-up, before any command arrives
    pub default_brightness: u8,
    /// Publish brightness status with the retain flag set
    pub retain_status: bool,
    /// Swallow the broker's copy of our own status publication
    ///
    /// Only for brokers that ignore the no-local subscription option. With
    /// it set, a command repeating the level just announced is not
    /// acknowledged.
    pub suppress_echo: bool,
    /// How often the board asks the network for the time
    pub sync_interval: Duration,
    pub sync_policy: SyncPolicy,
    pub session: SessionConfig,
    pub face: FaceLayout,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            room: "jroom",
            twelve_hour: true,
            zone: TimeZone::pacific(),
            default_brightness: 7,
            retain_status: false,
            suppress_echo: false,
            sync_interval: MIN_SYNC_INTERVAL,
            sync_policy: SyncPolicy::default(),
            session: SessionConfig::default(),
            face: FaceLayout::default(),
        }
    }
}

impl ClockConfig {
    /// Check every field; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        ControlTopics::for_room(self.room)?;

        if self.default_brightness > BRIGHTNESS_MAX {
            return Err(ConfigError::InvalidBrightness);
        }
        if self.zone.utc_offset_minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES as u16 {
            return Err(ConfigError::InvalidUtcOffset);
        }
        if self.sync_interval < MIN_SYNC_INTERVAL || self.sync_interval > MAX_SYNC_INTERVAL {
            return Err(ConfigError::SyncIntervalOutOfRange);
        }
        if self.sync_policy.earliest_unix >= self.sync_policy.latest_unix {
            return Err(ConfigError::InvalidSyncWindow);
        }
        if self.session.max_inbound_per_tick == 0 {
            return Err(ConfigError::InvalidInboundLimit);
        }
        if self.session.min_reconnect_interval.ticks() == 0 {
            return Err(ConfigError::InvalidReconnectInterval);
        }
        let prefix = self.session.client_id_prefix;
        if prefix.is_empty()
            || prefix.len() > CLIENT_ID_PREFIX_MAX_LEN
            || !prefix.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(ConfigError::InvalidClientIdPrefix);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::DstRule;

    #[test]
    fn test_default_is_valid() {
        let config = ClockConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.zone.utc_offset_minutes, -480);
        assert_eq!(config.zone.dst, DstRule::UnitedStates);
        assert_eq!(config.sync_interval, Duration::hours(6));
    }

    #[test]
    fn test_sync_interval_bounds() {
        let mut config = ClockConfig::default();
        config.sync_interval = Duration::hours(24);
        assert_eq!(config.validate(), Ok(()));
        config.sync_interval = Duration::hours(25);
        assert_eq!(config.validate(), Err(ConfigError::SyncIntervalOutOfRange));
        config.sync_interval = Duration::minutes(30);
        assert_eq!(config.validate(), Err(ConfigError::SyncIntervalOutOfRange));
    }

    #[test]
    fn test_bad_fields_rejected() {
        let mut config = ClockConfig::default();
        config.default_brightness = 16;
        assert_eq!(config.validate(), Err(ConfigError::InvalidBrightness));

        let mut config = ClockConfig::default();
        config.room = "a/b";
        assert_eq!(config.validate(), Err(ConfigError::InvalidRoom));

        let mut config = ClockConfig::default();
        config.session.client_id_prefix = "bad prefix";
        assert_eq!(config.validate(), Err(ConfigError::InvalidClientIdPrefix));

        let mut config = ClockConfig::default();
        config.zone = TimeZone::fixed(15 * 60);
        assert_eq!(config.validate(), Err(ConfigError::InvalidUtcOffset));

        let mut config = ClockConfig::default();
        config.sync_policy.latest_unix = config.sync_policy.earliest_unix;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSyncWindow));
    }
}
