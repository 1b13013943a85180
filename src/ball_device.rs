//! Ball-handling device: counts balls and ejects them through its strategy.
//!
//! # State Machine
//!
//! ```text
//!          eject requested, ball present
//!   Idle ─────────────────────────────────▶ Ejecting ◀──┐
//!    ▲                                        │         │ timeout (retry,
//!    │ confirmed / missing / broken           │ left    │ reorder if jammed)
//!    │                                        ▼         │
//!    └──────────────────────────────────── BallLeft ────┘ ball came back
//! ```
//!
//! Balls are counted from the ball switches: a switch counts once it has
//! been active for `entrance_count_delay_ms` and stops counting once it has
//! been inactive for `exit_count_delay_ms`. A ball has left when the count
//! drops or the confirm switch goes active. It is confirmed by the confirm
//! switch or by [`BallDevice::confirm_eject`]. A device with no ball
//! switches cannot count, so each eject attempt is taken as the ball leaving.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `balldevice_captured_from_<source>` | Unexpected ball counted |
//! | `balldevice_<name>_ball_enter` | Any new ball counted |
//! | `balldevice_<name>_ejecting_ball` | Each eject attempt |
//! | `balldevice_<name>_ball_eject_failed` | Attempt timed out |
//! | `balldevice_<name>_eject_broken` | `max_eject_attempts` used up |
//! | `balldevice_<name>_ball_eject_success` | Eject confirmed |
//! | `balldevice_ball_missing`, `balldevice_<name>_ball_missing` | Ball lost |

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::coil::Coil;
use crate::config::{short_string, BallDeviceConfig, ShortString};
use crate::ejector::AnyEjector;
use crate::error::{EjectorError, Error, SwitchError};
use crate::events::{Event, EventSink};
use crate::switch::{SwitchId, SwitchState};
use crate::switch_engine::{SwitchEngine, WaitState};
use crate::traits::{CoilDriver, DeviceStatus, Ejector, EjectorContext, SearchPhase};
use crate::wait::{SwitchInbox, SwitchWait};

/// Device state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DeviceState {
    /// Holding balls, nothing in progress.
    #[default]
    Idle,
    /// Trying to get a ball out.
    Ejecting,
    /// A ball left and has not been confirmed yet.
    BallLeft,
}

impl DeviceState {
    /// State name for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Idle => "idle",
            DeviceState::Ejecting => "ejecting",
            DeviceState::BallLeft => "ball_left",
        }
    }
}

#[derive(Debug)]
struct ActiveEject {
    target: ShortString,
    eject_try: u32,
    num_attempts: u32,
    timeout_at: Option<u64>,
    resume_at: Option<u64>,
    missing_at: Option<u64>,
    confirm: Option<SwitchWait>,
}

impl ActiveEject {
    fn new(target: ShortString) -> Self {
        Self {
            target,
            eject_try: 1,
            num_attempts: 0,
            timeout_at: None,
            resume_at: None,
            missing_at: None,
            confirm: None,
        }
    }
}

/// A ball-holding mechanism driven by one ejector strategy.
#[derive(Debug)]
pub struct BallDevice<D: CoilDriver> {
    config: BallDeviceConfig,
    ejector: AnyEjector<D>,
    ball_switches: Vec<SwitchId>,
    jam_switch: Option<SwitchId>,
    confirm_switch: Option<SwitchId>,
    counted: Vec<bool>,
    count_inbox: SwitchInbox,
    state: DeviceState,
    balls: u32,
    expected_incoming: u32,
    queue: VecDeque<ShortString>,
    active: Option<ActiveEject>,
    confirmed: bool,
}

impl<D: CoilDriver> BallDevice<D> {
    /// Create a device, resolving its switch names.
    pub fn new(
        config: BallDeviceConfig,
        ejector: AnyEjector<D>,
        engine: &SwitchEngine,
    ) -> Result<Self, SwitchError> {
        let ball_switches = config
            .ball_switches
            .iter()
            .map(|name| engine.switch_id(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let jam_switch = config
            .jam_switch
            .as_ref()
            .map(|name| engine.switch_id(name.as_str()))
            .transpose()?;
        let confirm_switch = config
            .confirm_eject_switch
            .as_ref()
            .map(|name| engine.switch_id(name.as_str()))
            .transpose()?;

        Ok(Self {
            counted: vec![false; ball_switches.len()],
            config,
            ejector,
            ball_switches,
            jam_switch,
            confirm_switch,
            count_inbox: SwitchInbox::new(),
            state: DeviceState::Idle,
            balls: 0,
            expected_incoming: 0,
            queue: VecDeque::new(),
            active: None,
            confirmed: false,
        })
    }

    /// Build the strategy from config and create the device.
    pub fn from_config(
        config: BallDeviceConfig,
        coil: Option<Coil<D>>,
        engine: &SwitchEngine,
    ) -> Result<Self, Error> {
        let ejector = AnyEjector::from_config(&config, coil)?;
        Ok(Self::new(config, ejector, engine)?)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Device name.
    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    /// Device config.
    pub fn config(&self) -> &BallDeviceConfig {
        &self.config
    }

    /// Current state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Whether no eject is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == DeviceState::Idle
    }

    /// Balls the device believes it holds.
    pub fn balls(&self) -> u32 {
        self.balls
    }

    /// Ejects waiting to run, including the one in progress.
    pub fn queued_ejects(&self) -> usize {
        self.queue.len()
    }

    /// Attempt number of the eject in progress.
    pub fn eject_try(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.eject_try)
    }

    /// The ejector strategy.
    pub fn ejector(&self) -> &AnyEjector<D> {
        &self.ejector
    }

    /// Whether a queued eject may start.
    ///
    /// Devices without ball switches cannot count, so they always may.
    pub fn can_eject(&self) -> bool {
        self.balls > 0 || self.ball_switches.is_empty()
    }

    /// Earliest time [`update`](Self::update) has timed work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let eject = self.active.as_ref().and_then(|a| {
            [a.timeout_at, a.resume_at, a.missing_at]
                .into_iter()
                .flatten()
                .min()
        });
        [eject, self.ejector.next_deadline()].into_iter().flatten().min()
    }

    /// Snapshot handed to the strategy.
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            idle: self.is_idle(),
            balls: self.balls,
            is_trough: self.config.is_trough(),
        }
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Queue one eject to `target` (the configured target if `None`).
    pub fn eject(&mut self, target: Option<&str>) {
        let target = target.map_or_else(|| self.config.eject_target.clone(), short_string);
        info!(device = %self.config.name, target = %target, "eject requested");
        self.queue.push_back(target);
    }

    /// Queue one eject per ball currently held.
    pub fn eject_all(&mut self, target: Option<&str>) {
        for _ in self.queue.len()..self.balls as usize {
            self.eject(target);
        }
    }

    /// Announce a ball on its way in, so it is not reported as captured.
    pub fn expect_incoming_ball(&mut self) {
        self.expected_incoming += 1;
    }

    /// Confirm that the ejected ball arrived at its target.
    ///
    /// Returns `false` if no eject is waiting for confirmation.
    pub fn confirm_eject(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.confirmed = true;
        true
    }

    /// Target of the eject in progress.
    pub fn eject_target(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.target.as_str())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Register switch handlers and take the initial ball count.
    ///
    /// The engine must be initialised.
    pub fn setup(
        &mut self,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        for (index, &switch) in self.ball_switches.iter().enumerate() {
            engine.register(
                switch,
                SwitchState::Active,
                self.config.entrance_count_delay_ms,
                self.count_inbox.callback(),
                now_ms,
            )?;
            engine.register(
                switch,
                SwitchState::Inactive,
                self.config.exit_count_delay_ms,
                self.count_inbox.callback(),
                now_ms,
            )?;
            self.counted[index] = engine.is_active(switch, 0, now_ms)?;
        }
        self.balls = self.count();
        info!(device = %self.config.name, balls = self.balls, "ball device ready");

        let status = self.status();
        let mut ctx = EjectorContext {
            engine,
            events,
            now_ms,
            status,
        };
        self.ejector.setup(&mut ctx)
    }

    /// Advance counting, the eject state machine and the strategy.
    pub fn update(
        &mut self,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        let status = self.status();
        self.ejector.update(&mut EjectorContext {
            engine: &mut *engine,
            events: &mut *events,
            now_ms,
            status,
        })?;

        let changed = self.recount();
        let count = self.count();
        match self.state {
            DeviceState::Idle => {
                if changed {
                    self.sync_idle_count(count, events);
                }
            }
            DeviceState::Ejecting => self.update_ejecting(changed, count, engine, events, now_ms)?,
            DeviceState::BallLeft => self.update_ball_left(changed, count, engine, events, now_ms)?,
        }

        if self.state == DeviceState::Idle && self.can_eject() && !self.queue.is_empty() {
            self.start_eject(engine, events, now_ms)?;
        }
        Ok(())
    }

    /// Nudge the device for ball search.
    pub fn ball_search(
        &mut self,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
        phase: SearchPhase,
        iteration: u32,
    ) -> Result<bool, EjectorError> {
        let status = self.status();
        self.ejector.ball_search(
            &mut EjectorContext {
                engine,
                events,
                now_ms,
                status,
            },
            phase,
            iteration,
        )
    }

    // ------------------------------------------------------------------
    // Counting
    // ------------------------------------------------------------------

    fn recount(&mut self) -> bool {
        let hits = self.count_inbox.drain();
        for hit in &hits {
            if let Some(index) = self.ball_switches.iter().position(|s| *s == hit.switch) {
                self.counted[index] = hit.state.is_active();
            }
        }
        !hits.is_empty()
    }

    fn count(&self) -> u32 {
        self.counted.iter().filter(|c| **c).count() as u32
    }

    fn sync_idle_count(&mut self, count: u32, events: &mut dyn EventSink) {
        if count > self.balls {
            for _ in self.balls..count {
                self.ball_entered(events);
            }
        } else if count < self.balls {
            warn!(device = %self.config.name, counted = count, expected = self.balls, "ball disappeared while idle");
            for _ in count..self.balls {
                self.post_missing(events);
            }
        }
        self.balls = count;
    }

    fn ball_entered(&mut self, events: &mut dyn EventSink) {
        self.balls += 1;
        if self.expected_incoming > 0 {
            self.expected_incoming -= 1;
            debug!(device = %self.config.name, "expected ball arrived");
        } else {
            info!(device = %self.config.name, source = %self.config.captures_from, "captured unexpected ball");
            events.post(
                Event::new(format!("balldevice_captured_from_{}", self.config.captures_from))
                    .with_arg("balls", 1u32),
            );
        }
        events.post(
            device_event(&self.config.name, "ball_enter")
                .with_arg("new_balls", 1u32)
                .with_arg("balls", self.balls),
        );
    }

    // ------------------------------------------------------------------
    // Ejecting
    // ------------------------------------------------------------------

    fn start_eject(
        &mut self,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        let Some(target) = self.queue.front().cloned() else {
            return Ok(());
        };
        self.active = Some(ActiveEject::new(target));
        self.confirmed = false;
        self.state = DeviceState::Ejecting;
        self.attempt(engine, events, now_ms)
    }

    fn attempt(
        &mut self,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        let is_jammed = self.is_jammed(engine, now_ms)?;
        let status = self.status();
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        active.num_attempts += 1;
        active.resume_at = None;

        events.post(
            device_event(&self.config.name, "ejecting_ball")
                .with_arg("target", active.target.as_str())
                .with_arg("balls", status.balls)
                .with_arg("num_attempts", active.num_attempts),
        );
        info!(
            device = %self.config.name,
            target = %active.target,
            eject_try = active.eject_try,
            is_jammed,
            "ejecting ball"
        );

        // armed first so a driver error still ends in a retry or eject_broken
        let timeout_ms = u64::from(self.config.eject_timeout_ms);
        active.timeout_at = Some(now_ms + timeout_ms);
        let progress = self.ejector.eject_one_ball(
            &mut EjectorContext {
                engine: &mut *engine,
                events,
                now_ms,
                status,
            },
            is_jammed,
            active.eject_try,
        )?;
        active.timeout_at = Some(progress.busy_until_ms + timeout_ms);

        if active.confirm.is_none() {
            if let Some(switch) = self.confirm_switch {
                active.confirm = Some(engine.wait_for(switch, WaitState::Active, true, 0, now_ms)?);
            }
        }

        if self.ball_switches.is_empty() {
            // nothing can see the ball go, so it left with the pulse
            self.ball_left(now_ms);
        }
        Ok(())
    }

    fn is_jammed(&self, engine: &SwitchEngine, now_ms: u64) -> Result<bool, SwitchError> {
        match self.jam_switch {
            Some(switch) => engine.is_active(switch, 0, now_ms),
            None => Ok(false),
        }
    }

    fn take_confirmation(&mut self) -> bool {
        let by_switch = self
            .active
            .as_ref()
            .and_then(|a| a.confirm.as_ref())
            .is_some_and(|w| w.is_resolved());
        by_switch || std::mem::take(&mut self.confirmed)
    }

    fn update_ejecting(
        &mut self,
        changed: bool,
        count: u32,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        if changed && count > self.balls {
            // a new ball arrived while the old one is still inside
            for _ in self.balls..count {
                self.ball_entered(events);
            }
        }

        let confirmed = self.take_confirmation();
        if (changed && count < self.balls) || confirmed {
            self.ball_left(now_ms);
            if confirmed {
                self.eject_success(engine, events);
            }
            return Ok(());
        }

        let (resume_at, timeout_at) = match self.active.as_ref() {
            Some(active) => (active.resume_at, active.timeout_at),
            None => return Ok(()),
        };
        if resume_at.is_some_and(|at| at <= now_ms) {
            return self.attempt(engine, events, now_ms);
        }
        if timeout_at.is_some_and(|at| at <= now_ms) {
            return self.eject_failed(engine, events, now_ms);
        }
        Ok(())
    }

    fn ball_left(&mut self, now_ms: u64) {
        self.balls = self.balls.saturating_sub(1);
        self.state = DeviceState::BallLeft;
        if let Some(active) = self.active.as_mut() {
            active.timeout_at = None;
            active.resume_at = None;
            active.missing_at = Some(now_ms + u64::from(self.config.ball_missing_timeout_ms));
        }
        info!(device = %self.config.name, balls = self.balls, "ball left device");
    }

    fn eject_failed(
        &mut self,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        warn!(device = %self.config.name, attempt = active.num_attempts, "eject timed out");
        events.post(
            device_event(&self.config.name, "ball_eject_failed")
                .with_arg("target", active.target.as_str())
                .with_arg("num_attempts", active.num_attempts),
        );
        active.eject_try += 1;
        // rearmed so a failed reorder still times out
        active.timeout_at = Some(now_ms + u64::from(self.config.eject_timeout_ms));

        let max = self.config.max_eject_attempts;
        if max > 0 && active.num_attempts >= max {
            warn!(device = %self.config.name, attempts = max, "giving up on eject");
            events.post(device_event(&self.config.name, "eject_broken").with_arg("num_attempts", max));
            self.finish_eject(engine);
            return Ok(());
        }

        if self.ejector.can_reorder() && self.is_jammed(engine, now_ms)? {
            let status = self.status();
            let progress = self.ejector.reorder_balls(&mut EjectorContext {
                engine,
                events,
                now_ms,
                status,
            })?;
            if let Some(active) = self.active.as_mut() {
                active.resume_at = Some(progress.busy_until_ms);
            }
            return Ok(());
        }
        self.attempt(engine, events, now_ms)
    }

    fn update_ball_left(
        &mut self,
        changed: bool,
        count: u32,
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
        now_ms: u64,
    ) -> Result<(), EjectorError> {
        if changed && count > self.balls {
            warn!(device = %self.config.name, "ejected ball returned");
            self.balls = count;
            self.state = DeviceState::Ejecting;
            if let Some(active) = self.active.as_mut() {
                active.eject_try += 1;
                active.missing_at = None;
            }
            return self.attempt(engine, events, now_ms);
        }

        if self.take_confirmation() {
            self.eject_success(engine, events);
            return Ok(());
        }

        let missing_at = self.active.as_ref().and_then(|a| a.missing_at);
        if missing_at.is_some_and(|at| at <= now_ms) {
            warn!(device = %self.config.name, "ejected ball never arrived");
            self.post_missing(events);
            self.finish_eject(engine);
        }
        Ok(())
    }

    fn eject_success(&mut self, engine: &mut SwitchEngine, events: &mut dyn EventSink) {
        if let Some(active) = self.active.as_ref() {
            info!(device = %self.config.name, target = %active.target, "eject confirmed");
            events.post(
                device_event(&self.config.name, "ball_eject_success")
                    .with_arg("target", active.target.as_str())
                    .with_arg("balls", self.balls),
            );
        }
        self.finish_eject(engine);
    }

    fn finish_eject(&mut self, engine: &mut SwitchEngine) {
        if let Some(active) = self.active.take() {
            if let Some(wait) = active.confirm {
                engine.cancel_wait(&wait);
            }
        }
        self.queue.pop_front();
        self.confirmed = false;
        self.state = DeviceState::Idle;
    }

    fn post_missing(&self, events: &mut dyn EventSink) {
        events.post(Event::new("balldevice_ball_missing").with_arg("device", self.config.name.as_str()));
        events.post(device_event(&self.config.name, "ball_missing"));
    }
}

fn device_event(device: &str, suffix: &str) -> Event {
    Event::new(format!("balldevice_{device}_{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoilConfig, SwitchConfig};
    use crate::events::EventQueue;
    use crate::hal::{MockCoilDriver, MockSwitchPlatform};

    fn engine() -> SwitchEngine {
        let mut engine = SwitchEngine::new(false);
        engine.add_switch(&SwitchConfig::new("s_lock1", 1)).unwrap();
        engine.add_switch(&SwitchConfig::new("s_lock2", 2)).unwrap();
        engine
    }

    fn device(engine: &SwitchEngine) -> BallDevice<MockCoilDriver> {
        let config = BallDeviceConfig::new("bd_lock")
            .with_eject_coil("c_lock")
            .with_ball_switches(&["s_lock1", "s_lock2"]);
        let coil = Coil::new(CoilConfig::new("c_lock"), MockCoilDriver::new());
        BallDevice::from_config(config, Some(coil), engine).unwrap()
    }

    #[test]
    fn unknown_switch_is_rejected() {
        let engine = engine();
        let config = BallDeviceConfig::new("bd_lock")
            .with_eject_coil("c_lock")
            .with_ball_switches(&["s_nope"]);
        let coil = Coil::new(CoilConfig::new("c_lock"), MockCoilDriver::new());
        let err = BallDevice::from_config(config, Some(coil), &engine).unwrap_err();
        assert!(matches!(err, Error::Switch(SwitchError::UnknownSwitch(_))));
    }

    #[test]
    fn setup_counts_active_switches() {
        let mut engine = engine();
        let mut device = device(&engine);
        let mut platform = MockSwitchPlatform::new().with_switch(1, true).with_switch(2, false);
        engine.initialize(&mut platform, 0).unwrap();

        let mut events = EventQueue::new();
        device.setup(&mut engine, &mut events, 0).unwrap();
        assert_eq!(device.balls(), 1);
        assert!(device.is_idle());
        // initial balls are not captures
        assert!(events.is_empty());
    }

    #[test]
    fn eject_all_queues_one_per_ball() {
        let mut engine = engine();
        let mut device = device(&engine);
        let mut platform = MockSwitchPlatform::new().with_switch(1, true).with_switch(2, true);
        engine.initialize(&mut platform, 0).unwrap();
        device.setup(&mut engine, &mut EventQueue::new(), 0).unwrap();

        device.eject_all(None);
        assert_eq!(device.queued_ejects(), 2);
        device.eject_all(None);
        assert_eq!(device.queued_ejects(), 2);
    }

    #[test]
    fn confirm_without_eject_is_ignored() {
        let engine = engine();
        let mut device = device(&engine);
        assert!(!device.confirm_eject());
        assert_eq!(device.eject_target(), None);
        assert_eq!(DeviceState::BallLeft.as_str(), "ball_left");
    }
}
