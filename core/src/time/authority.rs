//! Reconciliation between the persistent clock and network time

use hal_abstractions::PersistentClock;

use super::{Duration, Instant, TimeSample, TimeSource, TimeZone};

/// Plausibility filter for network samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncPolicy {
    /// Samples before this Unix time are rejected
    pub earliest_unix: u64,
    /// Samples at or after this Unix time are rejected
    pub latest_unix: u64,
    /// Largest accepted step away from the current estimate once a sync has
    /// been accepted; `None` disables the check
    pub max_jump: Option<Duration>,
    /// Consecutive out-of-bound steps rejected before the next one is trusted
    pub jump_override_after: u8,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            earliest_unix: 1_704_067_200, // 2024-01-01 00:00:00 UTC
            latest_unix: 4_102_444_800,   // 2100-01-01 00:00:00 UTC
            max_jump: Some(Duration::hours(24)),
            jump_override_after: 3,
        }
    }
}

/// Why a network sample was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncRejection {
    /// Outside the `[earliest_unix, latest_unix)` window
    OutOfRange { utc_secs: u64 },
    /// Observed before the last accepted sample
    Stale,
    /// Too far from the current estimate
    Jump { delta_secs: u64 },
}

impl core::fmt::Display for SyncRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfRange { utc_secs } => write!(f, "time {} outside plausible range", utc_secs),
            Self::Stale => write!(f, "sample older than last accepted sync"),
            Self::Jump { delta_secs } => write!(f, "clock step of {} s exceeds limit", delta_secs),
        }
    }
}

impl core::error::Error for SyncRejection {}

/// Record of the last accepted network sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncRecord {
    pub utc_secs: u64,
    pub observed_at: Instant,
    /// Whether the persistent clock accepted the new time
    pub rtc_updated: bool,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    utc_secs: u64,
    at: Instant,
}

/// Owner of "current time"
pub struct TimeAuthority<C> {
    clock: C,
    zone: TimeZone,
    policy: SyncPolicy,
    /// Seconds to add to the persistent clock reading; non-zero only while
    /// an accepted sample could not be written to the clock
    correction_secs: i64,
    /// Last known good estimate, used when the clock cannot be read
    anchor: Option<Anchor>,
    last_sync: Option<SyncRecord>,
    sync_count: u32,
    jump_rejections: u8,
}

impl<C: PersistentClock> TimeAuthority<C> {
    pub fn new(clock: C, zone: TimeZone, policy: SyncPolicy) -> Self {
        Self {
            clock,
            zone,
            policy,
            correction_secs: 0,
            anchor: None,
            last_sync: None,
            sync_count: 0,
            jump_rejections: 0,
        }
    }

    /// Best current estimate, recomputed on every call
    ///
    /// Never fails: with no sync ever accepted this is the persistent clock
    /// alone, and if the clock cannot be read the last good estimate is
    /// extrapolated with the monotonic clock.
    pub fn current_time(&mut self, now: Instant) -> TimeSample {
        let utc = self.estimate_utc(now);
        TimeSample::new(utc, &self.zone, self.source(), now)
    }

    /// Validate a network sample and adopt it as the new baseline
    ///
    /// The persistent clock is rewritten so the time survives a reboot.
    /// A rejected sample leaves the previous baseline in effect.
    pub fn accept_network_sync(&mut self, sample: TimeSample) -> Result<SyncRecord, SyncRejection> {
        let utc = sample.utc_secs();
        let at = sample.observed_at();

        if utc < self.policy.earliest_unix || utc >= self.policy.latest_unix {
            warn!("Rejecting network time {}: outside plausible range", utc);
            return Err(SyncRejection::OutOfRange { utc_secs: utc });
        }

        if let Some(last) = self.last_sync {
            if at < last.observed_at {
                warn!("Rejecting network time {}: older than last sync", utc);
                return Err(SyncRejection::Stale);
            }

            if let Some(max_jump) = self.policy.max_jump {
                let delta_secs = utc.abs_diff(self.estimate_utc(at));
                if delta_secs > max_jump.to_secs() {
                    self.jump_rejections = self.jump_rejections.saturating_add(1);
                    if self.jump_rejections <= self.policy.jump_override_after {
                        warn!(
                            "Rejecting network time {}: {} s step ({} consecutive)",
                            utc, delta_secs, self.jump_rejections
                        );
                        return Err(SyncRejection::Jump { delta_secs });
                    }
                    warn!(
                        "Accepting {} s step after {} consecutive rejections",
                        delta_secs, self.jump_rejections
                    );
                }
            }
        }
        self.jump_rejections = 0;

        let rtc_updated = match self.clock.write_unix(utc) {
            Ok(()) => {
                self.correction_secs = 0;
                true
            }
            Err(_) => {
                error!("Persistent clock write failed, keeping in-memory correction");
                if let Ok(raw) = self.clock.read_unix() {
                    self.correction_secs = utc as i64 - raw as i64;
                }
                false
            }
        };

        self.anchor = Some(Anchor { utc_secs: utc, at });
        let record = SyncRecord {
            utc_secs: utc,
            observed_at: at,
            rtc_updated,
        };
        self.last_sync = Some(record);
        self.sync_count = self.sync_count.wrapping_add(1);

        info!(
            "Network time accepted: {} UTC (sync #{}, rtc updated: {})",
            utc, self.sync_count, rtc_updated
        );
        Ok(record)
    }

    /// The last accepted sync, if any since boot
    pub fn last_sync(&self) -> Option<SyncRecord> {
        self.last_sync
    }

    /// Number of accepted syncs since boot
    pub fn sync_count(&self) -> u32 {
        self.sync_count
    }

    pub fn is_synced(&self) -> bool {
        self.last_sync.is_some()
    }

    pub fn zone(&self) -> &TimeZone {
        &self.zone
    }

    /// Current in-memory correction in seconds
    pub fn correction_secs(&self) -> i64 {
        self.correction_secs
    }

    /// Borrow the underlying persistent clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    fn source(&self) -> TimeSource {
        if self.last_sync.is_some() {
            TimeSource::Network
        } else {
            TimeSource::Persistent
        }
    }

    fn estimate_utc(&mut self, now: Instant) -> u64 {
        match self.clock.read_unix() {
            Ok(raw) => {
                let utc = raw.saturating_add_signed(self.correction_secs);
                self.anchor = Some(Anchor { utc_secs: utc, at: now });
                utc
            }
            Err(_) => {
                warn!("Persistent clock read failed, extrapolating");
                self.extrapolate(now)
            }
        }
    }

    fn extrapolate(&self, now: Instant) -> u64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = now
                    .checked_duration_since(anchor.at)
                    .map(|d| d.to_secs())
                    .unwrap_or(0);
                anchor.utc_secs.saturating_add(elapsed)
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RTC that holds still unless told otherwise
    struct StubClock {
        utc: u64,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl PersistentClock for StubClock {
        type Error = ();

        fn read_unix(&mut self) -> Result<u64, ()> {
            if self.fail_reads {
                Err(())
            } else {
                Ok(self.utc)
            }
        }

        fn write_unix(&mut self, unix_secs: u64) -> Result<(), ()> {
            if self.fail_writes {
                return Err(());
            }
            self.utc = unix_secs;
            Ok(())
        }
    }

    fn authority(utc: u64) -> TimeAuthority<StubClock> {
        let clock = StubClock {
            utc,
            fail_reads: false,
            fail_writes: false,
        };
        TimeAuthority::new(clock, TimeZone::UTC, SyncPolicy::default())
    }

    fn at(ms: u64) -> Instant {
        Instant::from_ticks(ms)
    }

    const JAN_2025: u64 = 1_735_689_600;

    #[test]
    fn test_persistent_only_before_sync() {
        let mut time = authority(JAN_2025 + 3_723);
        let sample = time.current_time(at(0));
        assert_eq!(sample.source(), TimeSource::Persistent);
        assert_eq!((sample.hour(), sample.minute(), sample.second()), (1, 2, 3));
        assert!(!time.is_synced());
    }

    #[test]
    fn test_accept_writes_clock() {
        let mut time = authority(0);
        let record = time
            .accept_network_sync(TimeSample::network(JAN_2025, at(10)))
            .unwrap();
        assert!(record.rtc_updated);
        assert_eq!(time.clock().utc, JAN_2025);
        assert_eq!(time.current_time(at(20)).source(), TimeSource::Network);
        assert_eq!(time.sync_count(), 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut time = authority(JAN_2025);
        let result = time.accept_network_sync(TimeSample::network(1_000, at(0)));
        assert_eq!(result, Err(SyncRejection::OutOfRange { utc_secs: 1_000 }));
        let result = time.accept_network_sync(TimeSample::network(5_000_000_000, at(0)));
        assert!(matches!(result, Err(SyncRejection::OutOfRange { .. })));
        assert_eq!(time.clock().utc, JAN_2025);
        assert!(!time.is_synced());
    }

    #[test]
    fn test_stale_sample_rejected() {
        let mut time = authority(0);
        time.accept_network_sync(TimeSample::network(JAN_2025, at(5_000)))
            .unwrap();
        let result = time.accept_network_sync(TimeSample::network(JAN_2025 + 1, at(4_000)));
        assert_eq!(result, Err(SyncRejection::Stale));
        assert_eq!(time.clock().utc, JAN_2025);
    }

    #[test]
    fn test_jump_rejected_then_overridden() {
        let mut time = authority(0);
        time.accept_network_sync(TimeSample::network(JAN_2025, at(0)))
            .unwrap();

        let far = JAN_2025 + 30 * 86_400;
        for i in 1..=3 {
            let result = time.accept_network_sync(TimeSample::network(far, at(i)));
            assert!(matches!(result, Err(SyncRejection::Jump { .. })));
            assert_eq!(time.clock().utc, JAN_2025);
        }
        // Trusted only after three consecutive rejections
        assert!(time.accept_network_sync(TimeSample::network(far, at(4))).is_ok());
        assert_eq!(time.clock().utc, far);
    }

    #[test]
    fn test_first_sync_may_jump() {
        // A fresh RTC reads 2000-01-01; the first sync is not step-limited
        let mut time = authority(946_684_800);
        assert!(time
            .accept_network_sync(TimeSample::network(JAN_2025, at(0)))
            .is_ok());
    }

    #[test]
    fn test_write_failure_keeps_correction() {
        let mut time = authority(JAN_2025);
        time.clock_mut().fail_writes = true;
        let record = time
            .accept_network_sync(TimeSample::network(JAN_2025 + 90, at(0)))
            .unwrap();
        assert!(!record.rtc_updated);
        assert_eq!(time.correction_secs(), 90);
        assert_eq!(time.current_time(at(100)).utc_secs(), JAN_2025 + 90);
    }

    #[test]
    fn test_read_failure_extrapolates() {
        let mut time = authority(JAN_2025);
        assert_eq!(time.current_time(at(0)).utc_secs(), JAN_2025);
        time.clock_mut().fail_reads = true;
        let sample = time.current_time(at(61_000));
        assert_eq!(sample.utc_secs(), JAN_2025 + 61);
    }

    #[test]
    fn test_read_failure_without_history_is_midnight() {
        let mut time = authority(0);
        time.clock_mut().fail_reads = true;
        let sample = time.current_time(at(0));
        assert_eq!((sample.hour(), sample.minute(), sample.second()), (0, 0, 0));
    }
}
