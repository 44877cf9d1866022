//! 12/24-hour display formatting

use super::TimeSample;

/// Digits to show for a time of day
///
/// Derived from a `TimeSample` on every refresh; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayFormat {
    /// Tens digit of the hour, `None` (blank) for hours below 10
    pub hour_tens: Option<u8>,
    pub hour_ones: u8,
    pub minute_tens: u8,
    pub minute_ones: u8,
    pub is_12_hour: bool,
}

impl DisplayFormat {
    /// The displayed hour as a number
    pub fn hour(&self) -> u8 {
        self.hour_tens.unwrap_or(0) * 10 + self.hour_ones
    }

    /// The displayed minute as a number
    pub fn minute(&self) -> u8 {
        self.minute_tens * 10 + self.minute_ones
    }
}

/// Hour as shown on the clock face
///
/// In 12-hour mode 0 becomes 12 and 13-23 become 1-11; 24-hour mode is the
/// identity.
pub const fn display_hour(hour: u8, twelve_hour: bool) -> u8 {
    if !twelve_hour {
        return hour;
    }
    match hour {
        0 => 12,
        13..=23 => hour - 12,
        _ => hour,
    }
}

/// Split `sample` into display digits
pub fn to_display_format(sample: &TimeSample, twelve_hour: bool) -> DisplayFormat {
    let hour = display_hour(sample.hour(), twelve_hour);
    let minute = sample.minute();

    DisplayFormat {
        hour_tens: if hour >= 10 { Some(hour / 10) } else { None },
        hour_ones: hour % 10,
        minute_tens: minute / 10,
        minute_ones: minute % 10,
        is_12_hour: twelve_hour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Instant, TimeSource, TimeZone};

    fn sample_at(hour: u8, minute: u8) -> TimeSample {
        let utc = hour as u64 * 3600 + minute as u64 * 60;
        TimeSample::new(utc, &TimeZone::UTC, TimeSource::Persistent, Instant::from_ticks(0))
    }

    #[test]
    fn test_twelve_hour_boundaries() {
        assert_eq!(display_hour(0, true), 12);
        assert_eq!(display_hour(1, true), 1);
        assert_eq!(display_hour(11, true), 11);
        assert_eq!(display_hour(12, true), 12);
        assert_eq!(display_hour(13, true), 1);
        assert_eq!(display_hour(23, true), 11);
    }

    #[test]
    fn test_twelve_hour_all_hours() {
        for hour in 0..24u8 {
            let expected = match hour {
                0 => 12,
                1..=12 => hour,
                _ => hour - 12,
            };
            assert_eq!(to_display_format(&sample_at(hour, 0), true).hour(), expected);
        }
    }

    #[test]
    fn test_twenty_four_hour_is_identity() {
        for hour in 0..24u8 {
            assert_eq!(display_hour(hour, false), hour);
            assert_eq!(to_display_format(&sample_at(hour, 0), false).hour(), hour);
        }
    }

    #[test]
    fn test_leading_hour_digit_blank() {
        let fmt = to_display_format(&sample_at(9, 5), false);
        assert_eq!(fmt.hour_tens, None);
        assert_eq!(fmt.hour_ones, 9);
        assert_eq!(fmt.minute_tens, 0);
        assert_eq!(fmt.minute_ones, 5);

        // Midnight in 12-hour mode shows "12", two digits
        let fmt = to_display_format(&sample_at(0, 59), true);
        assert_eq!(fmt.hour_tens, Some(1));
        assert_eq!(fmt.hour_ones, 2);
        assert_eq!(fmt.minute(), 59);
        assert!(fmt.is_12_hour);
    }
}
