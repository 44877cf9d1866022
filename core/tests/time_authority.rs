mod common;

use clock_core::time::DstRule;
use clock_core::{
    to_display_format, SyncPolicy, SyncRejection, TimeAuthority, TimeSample, TimeSource, TimeZone,
};
use common::{at_ms, at_secs, FakeRtc};
use proptest::prelude::*;

// 2025-06-15 12:00:00 UTC
const JUNE_2025: u64 = 1_749_988_800;

fn authority(rtc: &FakeRtc, zone: TimeZone) -> TimeAuthority<FakeRtc> {
    TimeAuthority::new(rtc.clone(), zone, SyncPolicy::default())
}

#[test]
fn test_unsynced_time_comes_from_rtc() {
    let rtc = FakeRtc::at(JUNE_2025 + 61);
    let mut time = authority(&rtc, TimeZone::UTC);

    let sample = time.current_time(at_ms(0));
    assert_eq!(sample.source(), TimeSource::Persistent);
    assert_eq!((sample.hour(), sample.minute(), sample.second()), (12, 1, 1));

    rtc.advance(60);
    assert_eq!(time.current_time(at_secs(60)).minute(), 2);
}

#[test]
fn test_wall_clock_follows_zone_and_dst() {
    let rtc = FakeRtc::at(JUNE_2025);
    let mut time = authority(&rtc, TimeZone::pacific());
    // PDT in June: UTC-7
    assert_eq!(time.current_time(at_ms(0)).hour(), 5);

    // 2025-01-15 12:00:00 UTC, PST: UTC-8
    rtc.utc.set(1_736_942_400);
    assert_eq!(time.current_time(at_ms(0)).hour(), 4);

    let rtc = FakeRtc::at(JUNE_2025);
    let zone = TimeZone {
        utc_offset_minutes: 60,
        dst: DstRule::EuropeanUnion,
    };
    assert_eq!(authority(&rtc, zone).current_time(at_ms(0)).hour(), 14);
}

#[test]
fn test_accepted_sync_rewrites_rtc() {
    let rtc = FakeRtc::at(946_684_800);
    let mut time = authority(&rtc, TimeZone::UTC);

    let record = time
        .accept_network_sync(TimeSample::network(JUNE_2025, at_ms(1_000)))
        .unwrap();
    assert!(record.rtc_updated);
    assert_eq!(record.utc_secs, JUNE_2025);
    assert_eq!(*rtc.writes.borrow(), vec![JUNE_2025]);

    let sample = time.current_time(at_ms(1_500));
    assert_eq!(sample.utc_secs(), JUNE_2025);
    assert_eq!(sample.source(), TimeSource::Network);
    assert_eq!(time.last_sync(), Some(record));
}

#[test]
fn test_rejected_sync_keeps_baseline() {
    let rtc = FakeRtc::at(JUNE_2025);
    let mut time = authority(&rtc, TimeZone::UTC);

    // The SNTP epoch rolling to zero decodes as 1970
    let result = time.accept_network_sync(TimeSample::network(0, at_ms(0)));
    assert_eq!(result, Err(SyncRejection::OutOfRange { utc_secs: 0 }));
    assert!(rtc.writes.borrow().is_empty());
    assert_eq!(time.current_time(at_ms(0)).utc_secs(), JUNE_2025);
    assert_eq!(time.current_time(at_ms(0)).source(), TimeSource::Persistent);
}

#[test]
fn test_out_of_order_sample_is_stale() {
    let rtc = FakeRtc::at(JUNE_2025);
    let mut time = authority(&rtc, TimeZone::UTC);

    time.accept_network_sync(TimeSample::network(JUNE_2025 + 10, at_secs(100)))
        .unwrap();
    let result = time.accept_network_sync(TimeSample::network(JUNE_2025 + 5, at_secs(50)));
    assert_eq!(result, Err(SyncRejection::Stale));
    assert_eq!(time.sync_count(), 1);
}

#[test]
fn test_rtc_write_failure_corrects_in_memory() {
    let rtc = FakeRtc::at(JUNE_2025);
    rtc.fail_writes.set(true);
    let mut time = authority(&rtc, TimeZone::UTC);

    let record = time
        .accept_network_sync(TimeSample::network(JUNE_2025 - 30, at_ms(0)))
        .unwrap();
    assert!(!record.rtc_updated);
    assert_eq!(time.correction_secs(), -30);

    rtc.advance(5);
    assert_eq!(time.current_time(at_secs(5)).utc_secs(), JUNE_2025 - 25);
}

#[test]
fn test_rtc_read_failure_extrapolates_last_reading() {
    let rtc = FakeRtc::at(JUNE_2025);
    let mut time = authority(&rtc, TimeZone::UTC);
    time.current_time(at_secs(10));

    rtc.fail_reads.set(true);
    let sample = time.current_time(at_secs(70));
    assert_eq!(sample.utc_secs(), JUNE_2025 + 60);
}

#[test]
fn test_display_format_for_every_hour() {
    for hour in 0..24u64 {
        let sample = TimeSample::network(JUNE_2025 - 12 * 3600 + hour * 3600 + 7 * 60, at_ms(0));
        assert_eq!(sample.hour() as u64, hour);

        let h24 = to_display_format(&sample, false);
        assert_eq!(h24.hour() as u64, hour);
        assert_eq!(h24.minute(), 7);
        assert!(!h24.is_12_hour);

        let h12 = to_display_format(&sample, true);
        let expected = match hour {
            0 => 12,
            1..=12 => hour,
            _ => hour - 12,
        };
        assert_eq!(h12.hour() as u64, expected, "hour {}", hour);
        assert_eq!(h12.hour_tens.is_none(), expected < 10);
    }
}

proptest! {
    #[test]
    fn prop_accepted_syncs_are_reflected(
        start in 1_704_067_200u64..1_900_000_000,
        steps in prop::collection::vec((1u64..3_600, 0u64..600), 1..40),
    ) {
        let rtc = FakeRtc::at(start);
        let mut time = authority(&rtc, TimeZone::UTC);
        let mut utc = start;
        let mut mono = 0u64;

        for (advance_secs, drift_secs) in steps {
            mono += advance_secs * 1000;
            rtc.advance(advance_secs);
            utc += advance_secs + drift_secs;

            let record = time.accept_network_sync(TimeSample::network(utc, at_ms(mono)));
            prop_assert!(record.is_ok(), "rejected {:?}", record);
            prop_assert_eq!(time.current_time(at_ms(mono)).utc_secs(), utc);
        }
    }

    #[test]
    fn prop_unsynced_time_is_always_valid(utc in any::<u64>(), offset in -720i16..=840) {
        let rtc = FakeRtc::at(utc);
        let mut time = authority(&rtc, TimeZone::fixed(offset));
        let sample = time.current_time(at_ms(0));
        prop_assert!(sample.hour() < 24);
        prop_assert!(sample.minute() < 60);
        prop_assert!(sample.second() < 60);
        prop_assert_eq!(sample.source(), TimeSource::Persistent);
    }
}
