//! The clock as one owned value
//!
//! `ClockApp` bundles the time authority, the session manager, the command
//! dispatcher and the clock face. The board creates exactly one and passes
//! it by reference to whatever drives it; nothing in here is global.

use hal_abstractions::{DisplaySink, PersistentClock, Transport};

use crate::config::{ClockConfig, ConfigError};
use crate::dispatch::{BrightnessSetting, CommandDispatcher, ControlTopics, DispatchOutcome};
use crate::face::ClockFace;
use crate::session::{SessionManager, SessionState};
use crate::time::{to_display_format, Instant, SyncRecord, SyncRejection, TimeAuthority, TimeSample};

pub struct ClockApp<C> {
    time: TimeAuthority<C>,
    session: SessionManager,
    dispatcher: CommandDispatcher,
    face: ClockFace,
    twelve_hour: bool,
}

impl<C: PersistentClock> ClockApp<C> {
    /// Validate `config` and build every component
    ///
    /// `seed` feeds the MQTT client identifier nonce.
    pub fn new(config: &ClockConfig, clock: C, seed: u32) -> Result<Self, ConfigError> {
        config.validate()?;

        let topics = ControlTopics::for_room(config.room)?;
        let dispatcher = CommandDispatcher::new(
            topics,
            BrightnessSetting::new(config.default_brightness),
            config.retain_status,
        )
        .with_echo_suppression(config.suppress_echo);
        let session = SessionManager::new(&config.session, dispatcher.subscriptions(), seed)?;

        Ok(Self {
            time: TimeAuthority::new(clock, config.zone, config.sync_policy),
            session,
            dispatcher,
            face: ClockFace::new(config.face),
            twelve_hour: config.twelve_hour,
        })
    }

    /// Apply the start-up brightness and draw the first frame
    pub fn start<D: DisplaySink + ?Sized>(&mut self, now: Instant, display: &mut D) -> TimeSample {
        let level = self.dispatcher.brightness().level();
        display.set_brightness(level);
        info!("Clock starting, brightness {}", level);
        self.refresh_display(now, display)
    }

    /// One session tick, dispatching whatever arrived
    ///
    /// Announces the current brightness every time the session (re)enters
    /// `Connected`.
    pub fn poll_messaging<T, D>(
        &mut self,
        now: Instant,
        transport: &mut T,
        display: &mut D,
    ) -> Option<SessionState>
    where
        T: Transport,
        D: DisplaySink + ?Sized,
    {
        let dispatcher = &mut self.dispatcher;
        let entered = self.session.tick(now, transport, |topic, payload, out| {
            if let DispatchOutcome::Malformed = dispatcher.dispatch(topic, payload, &mut *display, out) {
                debug!("Malformed command on {}", topic);
            }
        });

        if entered == Some(SessionState::Connected)
            && !self.dispatcher.announce(&mut self.session.publisher(transport))
        {
            warn!("Could not announce brightness");
            // A failed publish drops the session
            return Some(self.session.state());
        }
        entered
    }

    /// Redraw the display from the time authority
    ///
    /// Independent of the messaging session.
    pub fn refresh_display<D: DisplaySink + ?Sized>(&mut self, now: Instant, display: &mut D) -> TimeSample {
        let sample = self.time.current_time(now);
        let format = to_display_format(&sample, self.twelve_hour);
        self.face.render(&format, sample.second(), display);
        sample
    }

    /// Offer a network time sample to the time authority
    pub fn accept_network_sync(&mut self, sample: TimeSample) -> Result<SyncRecord, SyncRejection> {
        self.time.accept_network_sync(sample)
    }

    pub fn time(&self) -> &TimeAuthority<C> {
        &self.time
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn brightness(&self) -> BrightnessSetting {
        self.dispatcher.brightness()
    }

    pub fn twelve_hour(&self) -> bool {
        self.twelve_hour
    }
}
