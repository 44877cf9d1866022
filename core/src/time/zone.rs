//! Fixed-offset time zones with optional daylight saving rules

use super::calendar::{
    days_from_civil, last_weekday_of_month, nth_weekday_of_month, CivilDateTime, Weekday,
    MAX_UNIX_SECS, SECONDS_PER_DAY,
};

/// Daylight saving rule applied on top of the standard offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DstRule {
    /// Standard time all year
    None,
    /// Second Sunday of March 02:00 local to first Sunday of November 02:00 local
    UnitedStates,
    /// Last Sunday of March 01:00 UTC to last Sunday of October 01:00 UTC
    EuropeanUnion,
}

/// Local time zone: standard UTC offset plus a DST rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeZone {
    /// Standard (winter) offset from UTC in minutes, e.g. -480 for UTC-8
    pub utc_offset_minutes: i16,
    pub dst: DstRule,
}

impl TimeZone {
    pub const UTC: Self = Self::fixed(0);

    /// Zone with a fixed offset and no daylight saving
    pub const fn fixed(utc_offset_minutes: i16) -> Self {
        Self {
            utc_offset_minutes,
            dst: DstRule::None,
        }
    }

    /// UTC-8 with US daylight saving
    pub const fn pacific() -> Self {
        Self {
            utc_offset_minutes: -480,
            dst: DstRule::UnitedStates,
        }
    }

    /// Standard offset in seconds
    pub const fn standard_offset_secs(&self) -> i32 {
        self.utc_offset_minutes as i32 * 60
    }

    /// Whether daylight saving is in effect at `utc_secs`
    pub fn is_dst(&self, utc_secs: u64) -> bool {
        let utc = utc_secs.min(MAX_UNIX_SECS) as i64;
        let std_offset = self.standard_offset_secs() as i64;

        match self.dst {
            DstRule::None => false,
            DstRule::UnitedStates => {
                let year = local_year(utc.saturating_add(std_offset));
                let start_day = nth_weekday_of_month(year, 3, Weekday::Sunday, 2);
                let end_day = nth_weekday_of_month(year, 11, Weekday::Sunday, 1);
                // 02:00 standard time in, 02:00 daylight time out
                let start = midnight(year, 3, start_day) + 2 * 3600 - std_offset;
                let end = midnight(year, 11, end_day) + 2 * 3600 - (std_offset + 3600);
                (start..end).contains(&utc)
            }
            DstRule::EuropeanUnion => {
                let year = local_year(utc);
                let start = midnight(year, 3, last_weekday_of_month(year, 3, Weekday::Sunday)) + 3600;
                let end = midnight(year, 10, last_weekday_of_month(year, 10, Weekday::Sunday)) + 3600;
                (start..end).contains(&utc)
            }
        }
    }

    /// Total offset from UTC in seconds at `utc_secs`, DST included
    pub fn offset_secs_at(&self, utc_secs: u64) -> i32 {
        let dst = if self.is_dst(utc_secs) { 3600 } else { 0 };
        self.standard_offset_secs() + dst
    }
}

impl Default for TimeZone {
    fn default() -> Self {
        Self::UTC
    }
}

fn local_year(secs: i64) -> u16 {
    CivilDateTime::from_unix(secs.max(0) as u64).year
}

fn midnight(year: u16, month: u8, day: u8) -> i64 {
    days_from_civil(year, month, day) as i64 * SECONDS_PER_DAY as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACIFIC: TimeZone = TimeZone::pacific();

    const CENTRAL_EUROPE: TimeZone = TimeZone {
        utc_offset_minutes: 60,
        dst: DstRule::EuropeanUnion,
    };

    #[test]
    fn test_fixed_offset() {
        let zone = TimeZone::fixed(330);
        assert_eq!(zone.offset_secs_at(1_704_067_200), 330 * 60);
        assert!(!zone.is_dst(1_720_000_000));
    }

    #[test]
    fn test_us_spring_forward_2024() {
        // 2024-03-10 10:00:00 UTC == 02:00 PST
        let switch = 1_710_064_800;
        assert_eq!(PACIFIC.offset_secs_at(switch - 1), -8 * 3600);
        assert_eq!(PACIFIC.offset_secs_at(switch), -7 * 3600);
    }

    #[test]
    fn test_us_fall_back_2024() {
        // 2024-11-03 09:00:00 UTC == 02:00 PDT
        let switch = 1_730_624_400;
        assert_eq!(PACIFIC.offset_secs_at(switch - 1), -7 * 3600);
        assert_eq!(PACIFIC.offset_secs_at(switch), -8 * 3600);
    }

    #[test]
    fn test_eu_transitions_2024() {
        // 2024-03-31 01:00:00 UTC
        let spring = 1_711_846_800;
        assert!(!CENTRAL_EUROPE.is_dst(spring - 1));
        assert!(CENTRAL_EUROPE.is_dst(spring));
        assert_eq!(CENTRAL_EUROPE.offset_secs_at(spring), 2 * 3600);

        // 2024-10-27 01:00:00 UTC
        let autumn = 1_729_990_800;
        assert!(CENTRAL_EUROPE.is_dst(autumn - 1));
        assert!(!CENTRAL_EUROPE.is_dst(autumn));
    }

    #[test]
    fn test_winter_is_standard_time() {
        // 2024-01-15 12:00:00 UTC
        assert!(!PACIFIC.is_dst(1_705_320_000));
        assert!(!CENTRAL_EUROPE.is_dst(1_705_320_000));
    }
}
