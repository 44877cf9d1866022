//! Board timekeeping
//!
//! - `rtc`: the internal RTC as the core's `PersistentClock`
//! - `calendar`: Unix time <-> RTC calendar registers
//!
//! The RTIC `Mono` timer (TIM2, 1 MHz) is the monotonic clock; the core
//! works in milliseconds.

mod calendar;
mod rtc;

pub use rtc::RtcClock;

use rtic_monotonics::Monotonic;

use crate::Mono;

/// Convert a `Mono` instant to the core's millisecond `Instant`
pub fn to_clock_instant(instant: <Mono as Monotonic>::Instant) -> clock_core::Instant {
    clock_core::Instant::from_ticks(instant.ticks() / 1_000)
}

/// Current monotonic time in the core's units
pub fn now() -> clock_core::Instant {
    to_clock_instant(Mono::now())
}
