//! Platform-agnostic core logic for the NTP clock firmware
//!
//! This crate contains the business logic of the clock. It has NO hardware
//! dependencies: the display, the battery-backed RTC and the MQTT transport
//! are reached through the traits in `hal-abstractions`.
//!
//! - [`time`]: time authority reconciling the persistent clock with SNTP
//! - [`session`]: non-blocking control-channel session state machine
//! - [`dispatch`]: inbound command table and status echo
//! - [`face`]: renders the time onto the LED display
//! - [`app`]: the owned aggregate the driving loop ticks
//!
//! All operations are short and non-blocking and take `&mut self`; the
//! caller provides the monotonic `now` so every component is deterministic
//! under test.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible in every module
mod fmt;

pub mod app;
pub mod config;
pub mod dispatch;
pub mod face;
pub mod session;
pub mod time;

pub use app::ClockApp;
pub use config::{ClockConfig, ConfigError};
pub use dispatch::{BrightnessSetting, CommandDispatcher, ControlTopics, DispatchOutcome, Publisher};
pub use face::{ClockFace, FaceLayout};
pub use session::{ReconnectBudget, SessionConfig, SessionManager, SessionState, Subscription};
pub use time::{
    to_display_format, DisplayFormat, Duration, Instant, SyncPolicy, SyncRecord, SyncRejection,
    TimeAuthority, TimeSample, TimeSource, TimeZone,
};
