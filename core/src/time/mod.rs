//! Time authority
//!
//! Blends the battery-backed persistent clock (always available, drifts
//! slowly) with the network time source (authoritative, only periodically
//! available).
//!
//! ## Architecture
//! - The persistent clock stores UTC and is read on every `current_time` call
//! - Accepted SNTP samples are written back to the persistent clock so they
//!   survive reboots; if that write fails an in-memory correction is kept
//! - Samples outside the plausibility window are rejected and the previous
//!   baseline stays in effect
//! - Wall-clock fields are derived from UTC through the configured `TimeZone`
//!
//! Network fetch failures never reach this module: the authority is simply
//! not called and keeps serving persistent-clock time.

mod authority;
pub mod calendar;
mod format;
mod zone;

pub use authority::{SyncPolicy, SyncRecord, SyncRejection, TimeAuthority};
pub use format::{display_hour, to_display_format, DisplayFormat};
pub use zone::{DstRule, TimeZone};

use calendar::SECONDS_PER_DAY;

/// Monotonic timestamp with millisecond resolution
pub type Instant = fugit::TimerInstantU64<1000>;

/// Monotonic duration with millisecond resolution
pub type Duration = fugit::MillisDurationU64;

/// Where a sample's baseline came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSource {
    /// Battery-backed RTC only; no network sync accepted since boot
    Persistent,
    /// Network time source
    Network,
}

/// A point in time broken down into wall-clock fields
///
/// Fields are private so `hour < 24`, `minute < 60` and `second < 60` always
/// hold: every constructor derives them from `utc_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSample {
    utc_secs: u64,
    utc_offset_secs: i32,
    hour: u8,
    minute: u8,
    second: u8,
    source: TimeSource,
    observed_at: Instant,
}

impl TimeSample {
    /// Sample for `utc_secs` with wall-clock fields in `zone`
    pub fn new(utc_secs: u64, zone: &TimeZone, source: TimeSource, observed_at: Instant) -> Self {
        Self::with_offset(utc_secs, zone.offset_secs_at(utc_secs), source, observed_at)
    }

    /// Sample fetched from the network time source; wall-clock fields are UTC
    pub fn network(utc_secs: u64, observed_at: Instant) -> Self {
        Self::with_offset(utc_secs, 0, TimeSource::Network, observed_at)
    }

    fn with_offset(
        utc_secs: u64,
        utc_offset_secs: i32,
        source: TimeSource,
        observed_at: Instant,
    ) -> Self {
        let local = i64::try_from(utc_secs)
            .unwrap_or(i64::MAX)
            .saturating_add(utc_offset_secs as i64);
        let secs_today = local.rem_euclid(SECONDS_PER_DAY as i64) as u32;

        Self {
            utc_secs,
            utc_offset_secs,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
            source,
            observed_at,
        }
    }

    /// Hour of day, 0-23
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute, 0-59
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// Second, 0-59
    pub const fn second(&self) -> u8 {
        self.second
    }

    pub const fn source(&self) -> TimeSource {
        self.source
    }

    /// Monotonic time at which the sample was taken
    pub const fn observed_at(&self) -> Instant {
        self.observed_at
    }

    /// Seconds since the Unix epoch, independent of the time zone
    pub const fn utc_secs(&self) -> u64 {
        self.utc_secs
    }

    /// Offset applied to produce the wall-clock fields
    pub const fn utc_offset_secs(&self) -> i32 {
        self.utc_offset_secs
    }
}
