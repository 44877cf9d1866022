//! Battery-backed real-time clock

/// A local clock that keeps time across power loss
///
/// Implementations store UTC only; time zones are applied above this layer.
/// Reads and writes must be short, non-blocking register accesses.
pub trait PersistentClock {
    /// Hardware error type
    type Error: core::fmt::Debug;

    /// Read the current time as seconds since the Unix epoch (UTC)
    fn read_unix(&mut self) -> Result<u64, Self::Error>;

    /// Set the clock to `unix_secs` seconds since the Unix epoch (UTC)
    fn write_unix(&mut self, unix_secs: u64) -> Result<(), Self::Error>;
}
