//! Internal RTC as the clock's persistent time store
//!
//! The STM32F405 RTC runs from the 32.768 kHz LSE and keeps counting on the
//! backup battery, so it holds UTC across resets and power loss.

use defmt::{error, Format};
use embassy_stm32::rtc::Rtc;
use hal_abstractions::PersistentClock;

use super::calendar::{datetime_to_unix, unix_to_datetime};

/// RTC operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum RtcError {
    /// Calendar registers could not be read
    ReadFailed,
    /// The RTC rejected the new date
    WriteFailed,
    /// Date outside the range the RTC can store
    OutOfRange,
}

/// `PersistentClock` backed by the internal RTC
pub struct RtcClock {
    rtc: Rtc,
}

impl RtcClock {
    pub fn new(rtc: Rtc) -> Self {
        Self { rtc }
    }
}

impl PersistentClock for RtcClock {
    type Error = RtcError;

    fn read_unix(&mut self) -> Result<u64, RtcError> {
        let datetime = self.rtc.now().map_err(|_| RtcError::ReadFailed)?;
        Ok(datetime_to_unix(&datetime))
    }

    fn write_unix(&mut self, unix_secs: u64) -> Result<(), RtcError> {
        let datetime = unix_to_datetime(unix_secs).ok_or(RtcError::OutOfRange)?;
        self.rtc.set_datetime(datetime).map_err(|e| {
            error!("RTC write failed: {:?}", defmt::Debug2Format(&e));
            RtcError::WriteFailed
        })
    }
}
