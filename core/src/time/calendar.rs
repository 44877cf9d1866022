//! Calendar date/time conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! These algorithms are used in C++20's `<chrono>` library and provide:
//! - O(1) time complexity (no year iteration)
//! - Correct handling of leap years
//! - Valid for all dates in the proleptic Gregorian calendar
//!
//! Plain integers only, so the board can map them onto whatever its RTC
//! peripheral expects.

/// Seconds in a civil day (no leap seconds, like NTP)
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Largest Unix timestamp representable as a `CivilDateTime` (9999-12-31 23:59:59)
pub const MAX_UNIX_SECS: u64 = 253_402_300_799;

/// Day of week, Sunday first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Weekday {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl Weekday {
    fn from_index(index: u8) -> Self {
        match index % 7 {
            0 => Weekday::Sunday,
            1 => Weekday::Monday,
            2 => Weekday::Tuesday,
            3 => Weekday::Wednesday,
            4 => Weekday::Thursday,
            5 => Weekday::Friday,
            _ => Weekday::Saturday,
        }
    }

    /// Day number 0-6 with Sunday = 0
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Broken-down UTC date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    /// Convert a Unix timestamp to a civil date/time
    ///
    /// Timestamps past `MAX_UNIX_SECS` saturate to 9999-12-31 23:59:59.
    pub fn from_unix(unix_secs: u64) -> Self {
        let unix_secs = unix_secs.min(MAX_UNIX_SECS);
        let days_since_epoch = (unix_secs / SECONDS_PER_DAY) as i32;
        let secs_today = unix_secs % SECONDS_PER_DAY;

        let (year, month, day) = civil_from_days(days_since_epoch);

        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }

    /// Convert back to a Unix timestamp; dates before 1970 clamp to 0
    pub fn to_unix(&self) -> u64 {
        let days_since_epoch = days_from_civil(self.year, self.month, self.day);
        if days_since_epoch < 0 {
            return 0;
        }

        (days_since_epoch as u64) * SECONDS_PER_DAY
            + (self.hour as u64) * 3600
            + (self.minute as u64) * 60
            + (self.second as u64)
    }

    /// Day of week of this date
    pub fn weekday(&self) -> Weekday {
        weekday(days_from_civil(self.year, self.month, self.day))
    }
}

/// Check if year is a leap year (Gregorian calendar)
///
/// - Divisible by 4: leap year
/// - EXCEPT divisible by 100: not a leap year
/// - EXCEPT divisible by 400: leap year
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Day of week for a day count since the Unix epoch (1970-01-01 was a Thursday)
pub fn weekday(days_since_epoch: i32) -> Weekday {
    Weekday::from_index((days_since_epoch + 4).rem_euclid(7) as u8)
}

/// Day of month of the `n`th (1-based) `weekday` in `month`
pub fn nth_weekday_of_month(year: u16, month: u8, target: Weekday, n: u8) -> u8 {
    let first = weekday(days_from_civil(year, month, 1)).index();
    let first_match = 1 + (7 + target.index() - first) % 7;
    first_match + 7 * n.saturating_sub(1)
}

/// Day of month of the last `weekday` in `month`
pub fn last_weekday_of_month(year: u16, month: u8, target: Weekday) -> u8 {
    let last_day = days_in_month(year, month);
    let last = weekday(days_from_civil(year, month, last_day)).index();
    last_day - (7 + last - target.index()) % 7
}

/// Convert days since Unix epoch to civil date (year, month, day)
///
/// Howard Hinnant's civil_from_days algorithm.
pub fn civil_from_days(days_since_epoch: i32) -> (u16, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + 719468;

    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = (yoe as i32) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // March = 0
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;
    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
///
/// Howard Hinnant's days_from_civil algorithm.
pub fn days_from_civil(year: u16, month: u8, day: u8) -> i32 {
    let y = year as i32;
    let m = month as i32;
    let d = day as i32;

    // March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (m as u32) + 2) / 5 + (d as u32) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146097 + (doe as i32) - 719468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2000)); // Divisible by 400
        assert!(is_leap_year(2024)); // Divisible by 4
        assert!(!is_leap_year(1900)); // Divisible by 100, not 400
        assert!(!is_leap_year(2023)); // Not divisible by 4
        assert!(!is_leap_year(2100)); // Divisible by 100, not 400
    }

    #[test]
    fn test_unix_epoch() {
        let dt = CivilDateTime::from_unix(0);
        assert_eq!(dt.year, 1970);
        assert_eq!(dt.month, 1);
        assert_eq!(dt.day, 1);
        assert_eq!(dt.hour, 0);
        assert_eq!(dt.minute, 0);
        assert_eq!(dt.second, 0);
        assert_eq!(dt.weekday(), Weekday::Thursday);
    }

    #[test]
    fn test_round_trip_conversion() {
        let test_dates = [
            0u64,       // 1970-01-01 00:00:00
            946684800,  // 2000-01-01 00:00:00
            1609459200, // 2021-01-01 00:00:00
            1704067200, // 2024-01-01 00:00:00
            2147483647, // 2038-01-19 03:14:07 (32-bit Unix time limit)
            4102444800, // 2100-01-01 00:00:00
        ];

        for &unix_secs in &test_dates {
            let converted_back = CivilDateTime::from_unix(unix_secs).to_unix();
            assert_eq!(
                unix_secs, converted_back,
                "Round trip failed for timestamp {}",
                unix_secs
            );
        }
    }

    #[test]
    fn test_leap_day_2024() {
        let leap_day = CivilDateTime {
            year: 2024,
            month: 2,
            day: 29,
            hour: 0,
            minute: 0,
            second: 0,
        };
        let dt = CivilDateTime::from_unix(leap_day.to_unix());
        assert_eq!(dt, leap_day);
    }

    #[test]
    fn test_before_epoch_clamps() {
        let dt = CivilDateTime {
            year: 1969,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 59,
        };
        assert_eq!(dt.to_unix(), 0);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn test_weekday_in_month() {
        // March 2024 starts on a Friday; second Sunday is the 10th
        assert_eq!(nth_weekday_of_month(2024, 3, Weekday::Sunday, 2), 10);
        // November 2024: first Sunday is the 3rd
        assert_eq!(nth_weekday_of_month(2024, 11, Weekday::Sunday, 1), 3);
        // Last Sundays of March and October 2024
        assert_eq!(last_weekday_of_month(2024, 3, Weekday::Sunday), 31);
        assert_eq!(last_weekday_of_month(2024, 10, Weekday::Sunday), 27);
    }
}
