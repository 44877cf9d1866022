//! Hand-written fakes for the hardware-facing traits
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use clock_core::{Instant, Publisher};
use hal_abstractions::{DisplaySink, Glyph, InboundMessage, LinkStatus, PersistentClock, QoS, Transport};

pub fn at_ms(ms: u64) -> Instant {
    Instant::from_ticks(ms)
}

pub fn at_secs(secs: u64) -> Instant {
    Instant::from_ticks(secs * 1000)
}

/// Every call the fake transport saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Subscribe(String, QoS),
    Publish {
        topic: String,
        payload: Vec<u8>,
        retained: bool,
    },
    PollInbound,
}

/// Scriptable transport
///
/// `connect` moves the link to `connect_result` (default `Up`) so the next
/// `link_status` reports it. Inbound messages queue until polled.
#[derive(Debug)]
pub struct FakeTransport {
    pub status: LinkStatus,
    pub connect_result: LinkStatus,
    pub fail_subscribe: bool,
    pub fail_publish: bool,
    pub inbound: VecDeque<InboundMessage>,
    pub calls: Vec<Call>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            status: LinkStatus::Down,
            connect_result: LinkStatus::Up,
            fail_subscribe: false,
            fail_publish: false,
            inbound: VecDeque::new(),
            calls: Vec::new(),
        }
    }
}

impl FakeTransport {
    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound
            .push_back(InboundMessage::new(topic, payload).expect("message fits"));
    }

    pub fn connects(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Connect(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn publishes(&self) -> Vec<(String, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Publish { topic, payload, .. } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn subscribes(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Subscribe(topic, _) => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for FakeTransport {
    fn connect(&mut self, client_id: &str) {
        self.calls.push(Call::Connect(client_id.to_string()));
        self.status = self.connect_result;
    }

    fn link_status(&mut self) -> LinkStatus {
        self.status
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> bool {
        self.calls.push(Call::Subscribe(topic.to_string(), qos));
        !self.fail_subscribe
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        self.calls.push(Call::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retained,
        });
        !self.fail_publish
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.calls.push(Call::PollInbound);
        self.inbound.pop_front()
    }
}

/// Publisher that records instead of sending
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub connected: bool,
    pub sent: Vec<(String, Vec<u8>, bool)>,
}

impl RecordingPublisher {
    pub fn connected() -> Self {
        Self {
            connected: true,
            sent: Vec::new(),
        }
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        if !self.connected {
            return false;
        }
        self.sent.push((topic.to_string(), payload.to_vec(), retained));
        true
    }
}

/// Display that remembers the last value written to everything
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub digits: [Option<Glyph>; 8],
    pub segments: [[bool; 8]; 8],
    pub brightness: Vec<u8>,
}

impl RecordingDisplay {
    pub fn digit(&self, position: usize) -> Option<Glyph> {
        self.digits[position]
    }

    pub fn last_brightness(&self) -> Option<u8> {
        self.brightness.last().copied()
    }
}

impl DisplaySink for RecordingDisplay {
    fn set_digit(&mut self, position: u8, glyph: Glyph) {
        self.digits[position as usize] = Some(glyph);
    }

    fn set_segment(&mut self, group: u8, index: u8, on: bool) {
        self.segments[group as usize][index as usize] = on;
    }

    fn set_brightness(&mut self, level: u8) {
        self.brightness.push(level);
    }
}

/// RTC whose time and failure modes are shared with the test body
#[derive(Debug, Clone, Default)]
pub struct FakeRtc {
    pub utc: Rc<Cell<u64>>,
    pub fail_reads: Rc<Cell<bool>>,
    pub fail_writes: Rc<Cell<bool>>,
    pub writes: Rc<RefCell<Vec<u64>>>,
}

impl FakeRtc {
    pub fn at(utc: u64) -> Self {
        let rtc = Self::default();
        rtc.utc.set(utc);
        rtc
    }

    /// Advance the RTC the way the hardware would
    pub fn advance(&self, secs: u64) {
        self.utc.set(self.utc.get() + secs);
    }
}

impl PersistentClock for FakeRtc {
    type Error = ();

    fn read_unix(&mut self) -> Result<u64, ()> {
        if self.fail_reads.get() {
            Err(())
        } else {
            Ok(self.utc.get())
        }
    }

    fn write_unix(&mut self, unix_secs: u64) -> Result<(), ()> {
        if self.fail_writes.get() {
            return Err(());
        }
        self.writes.borrow_mut().push(unix_secs);
        self.utc.set(unix_secs);
        Ok(())
    }
}
