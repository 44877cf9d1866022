//! Conversions between Unix time and the RTC's calendar registers
//!
//! The calendar math itself lives in `clock_core::time::calendar`; this
//! module only maps it onto `embassy_stm32::rtc::DateTime`.

use clock_core::time::calendar::{CivilDateTime, Weekday};
use embassy_stm32::rtc::{DateTime, DayOfWeek};

/// Convert a Unix timestamp to an RTC `DateTime`
///
/// Fails for dates the RTC cannot hold.
pub fn unix_to_datetime(unix_secs: u64) -> Option<DateTime> {
    let civil = CivilDateTime::from_unix(unix_secs);
    DateTime::from(
        civil.year,
        civil.month,
        civil.day,
        day_of_week(civil.weekday()),
        civil.hour,
        civil.minute,
        civil.second,
        0,
    )
    .ok()
}

/// Convert an RTC `DateTime` to a Unix timestamp
pub fn datetime_to_unix(dt: &DateTime) -> u64 {
    CivilDateTime {
        year: dt.year(),
        month: dt.month(),
        day: dt.day(),
        hour: dt.hour(),
        minute: dt.minute(),
        second: dt.second(),
    }
    .to_unix()
}

fn day_of_week(weekday: Weekday) -> DayOfWeek {
    match weekday {
        Weekday::Monday => DayOfWeek::Monday,
        Weekday::Tuesday => DayOfWeek::Tuesday,
        Weekday::Wednesday => DayOfWeek::Wednesday,
        Weekday::Thursday => DayOfWeek::Thursday,
        Weekday::Friday => DayOfWeek::Friday,
        Weekday::Saturday => DayOfWeek::Saturday,
        Weekday::Sunday => DayOfWeek::Sunday,
    }
}
