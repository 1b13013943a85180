//! Ejector strategy trait: how a ball device moves a ball out.
//!
//! A ball device picks one strategy at configuration time and drives it
//! through this trait. Strategies never block. Anything that takes time
//! (pulse settle, enable window, hold release) is reported back as an
//! [`EjectProgress`] and finished from [`Ejector::update`].
//!
//! # Built-in Strategies
//!
//! | Strategy | Actuator | Reorder |
//! |----------|----------|---------|
//! | [`PulseCoilEjector`] | Timed pulse, escalating on retries | With a reorder pulse |
//! | [`HoldCoilEjector`] | Coil held on, released to eject | No |
//! | [`EnableCoilEjector`] | Coil enabled for a window | No |
//! | [`EventEjector`] | None, posts events | Posts an event |
//!
//! [`PulseCoilEjector`]: crate::ejector::PulseCoilEjector
//! [`HoldCoilEjector`]: crate::ejector::HoldCoilEjector
//! [`EnableCoilEjector`]: crate::ejector::EnableCoilEjector
//! [`EventEjector`]: crate::ejector::EventEjector

use crate::config::EjectorKind;
use crate::error::EjectorError;
use crate::events::EventSink;
use crate::switch_engine::SwitchEngine;

/// What the owning device currently believes about itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Device is not ejecting.
    pub idle: bool,
    /// Balls counted in the device.
    pub balls: u32,
    /// Device is tagged `trough`.
    pub is_trough: bool,
}

/// Everything a strategy may touch during one call.
pub struct EjectorContext<'a> {
    /// Switch engine, for reading and registering switches.
    pub engine: &'a mut SwitchEngine,
    /// Event sink.
    pub events: &'a mut dyn EventSink,
    /// Current time.
    pub now_ms: u64,
    /// Owning device status.
    pub status: DeviceStatus,
}

/// Result of starting a timed ejector operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EjectProgress {
    /// When the strategy's own wait ends.
    pub busy_until_ms: u64,
}

impl EjectProgress {
    /// Operation finished immediately.
    pub fn done(now_ms: u64) -> Self {
        Self {
            busy_until_ms: now_ms,
        }
    }
}

/// Ball search escalation phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SearchPhase {
    /// Reset idle, empty devices.
    One,
    /// Light nudge of every non-trough device.
    Two,
    /// Full nudge of every non-trough device.
    Three,
}

impl SearchPhase {
    /// Phase from its number (1-3).
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(SearchPhase::One),
            2 => Some(SearchPhase::Two),
            3 => Some(SearchPhase::Three),
            _ => None,
        }
    }

    /// Phase number (1-3).
    pub const fn number(&self) -> u8 {
        match self {
            SearchPhase::One => 1,
            SearchPhase::Two => 2,
            SearchPhase::Three => 3,
        }
    }
}

/// A ball ejection strategy.
///
/// # Required Methods
///
/// - [`eject_one_ball`](Self::eject_one_ball): start one eject attempt
/// - [`reorder_balls`](Self::reorder_balls): reposition balls without ejecting
/// - [`ball_search`](Self::ball_search): nudge the device during ball search
/// - [`kind`](Self::kind): which strategy this is
///
/// # Optional Methods
///
/// - [`setup`](Self::setup): register switch handlers (default: nothing)
/// - [`update`](Self::update): finish timed phases (default: nothing)
/// - [`can_reorder`](Self::can_reorder): whether reorder is supported (default: `false`)
/// - [`next_deadline`](Self::next_deadline): when `update` next has work (default: `None`)
pub trait Ejector {
    /// Register switch handlers. Called once after the engine is initialised.
    fn setup(&mut self, _ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        Ok(())
    }

    /// Start ejecting one ball.
    ///
    /// `eject_try` counts attempts for the current ball starting at 1;
    /// `is_jammed` says whether the jam switch is active.
    fn eject_one_ball(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        is_jammed: bool,
        eject_try: u32,
    ) -> Result<EjectProgress, EjectorError>;

    /// Reposition balls in the device without ejecting.
    ///
    /// The device is not stable again until `busy_until_ms`.
    fn reorder_balls(&mut self, ctx: &mut EjectorContext<'_>) -> Result<EjectProgress, EjectorError>;

    /// Nudge the device. Returns whether it did anything.
    fn ball_search(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        phase: SearchPhase,
        iteration: u32,
    ) -> Result<bool, EjectorError>;

    /// Advance timed phases.
    fn update(&mut self, _ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        Ok(())
    }

    /// Whether [`reorder_balls`](Self::reorder_balls) can clear a jam.
    fn can_reorder(&self) -> bool {
        false
    }

    /// Earliest time [`update`](Self::update) has timed work to do.
    fn next_deadline(&self) -> Option<u64> {
        None
    }

    /// Strategy kind.
    fn kind(&self) -> EjectorKind;
}
