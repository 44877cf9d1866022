//! Hardware abstraction traits for the NTP clock firmware
//!
//! This crate defines traits that abstract over hardware differences
//! between boards. BSPs implement these traits; `clock-core` only ever
//! talks to hardware through them.
//!
//! - [`DisplaySink`]: LED digit/segment driver (MAX7219 on the Feather board)
//! - [`PersistentClock`]: battery-backed real-time clock storing UTC seconds
//! - [`Transport`]: non-blocking publish/subscribe control channel

#![no_std]
#![deny(unsafe_code)]

pub mod display;
pub mod rtc;
pub mod transport;

pub use display::{DisplaySink, Glyph, BRIGHTNESS_MAX};
pub use rtc::PersistentClock;
pub use transport::{InboundMessage, LinkStatus, QoS, Transport, MAX_PAYLOAD_LEN, MAX_TOPIC_LEN};
