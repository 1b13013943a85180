//! Built-in ejector strategies and the runtime-selected [`AnyEjector`].
//!
//! A device's config names its strategy with [`EjectorKind`]; the device
//! stores whichever one was chosen as an [`AnyEjector`] so all devices have
//! the same type regardless of strategy.
//!
//! ```rust
//! use pinball_core::coil::Coil;
//! use pinball_core::config::{BallDeviceConfig, CoilConfig, EjectorKind};
//! use pinball_core::ejector::AnyEjector;
//! use pinball_core::hal::MockCoilDriver;
//! use pinball_core::traits::Ejector;
//!
//! let config = BallDeviceConfig::new("bd_plunger")
//!     .with_eject_coil("c_plunger")
//!     .with_reorder_pulse(8);
//! let coil = Coil::new(CoilConfig::new("c_plunger"), MockCoilDriver::new());
//!
//! let ejector = AnyEjector::from_config(&config, Some(coil)).unwrap();
//! assert_eq!(ejector.kind(), EjectorKind::PulseCoil);
//! assert!(ejector.can_reorder());
//!
//! // An enable window makes no sense for a pulse ejector
//! let bad = config.with_enable_time(200);
//! let coil = Coil::new(CoilConfig::new("c_plunger"), MockCoilDriver::new());
//! assert!(AnyEjector::from_config(&bad, Some(coil)).is_err());
//! ```

mod enable;
mod event;
mod hold;
mod pulse;

pub use enable::EnableCoilEjector;
pub use event::EventEjector;
pub use hold::{HoldCoilEjector, DEFAULT_RELEASE_MS};
pub use pulse::{PulseCoilEjector, REORDER_SETTLE_MS};

use crate::coil::Coil;
use crate::config::{BallDeviceConfig, EjectorKind};
use crate::error::{ConfigError, EjectorError};
use crate::traits::{CoilDriver, EjectProgress, Ejector, EjectorContext, SearchPhase};

/// One of the built-in strategies.
#[derive(Debug)]
pub enum AnyEjector<D: CoilDriver> {
    /// Pulse-coil strategy.
    Pulse(PulseCoilEjector<D>),
    /// Hold-coil strategy.
    Hold(HoldCoilEjector<D>),
    /// Enable-coil strategy.
    Enable(EnableCoilEjector<D>),
    /// Event-only strategy.
    Event(EventEjector),
}

impl<D: CoilDriver> AnyEjector<D> {
    /// Build the strategy named by `config.ejector`.
    ///
    /// `coil` is the eject coil, or the hold coil for a hold ejector. The
    /// event-only ejector takes none.
    pub fn from_config(config: &BallDeviceConfig, coil: Option<Coil<D>>) -> Result<Self, ConfigError> {
        let name = config.name.as_str();
        match (config.ejector, coil) {
            (EjectorKind::EventOnly, None) => Ok(AnyEjector::Event(EventEjector::from_config(config)?)),
            (EjectorKind::EventOnly, Some(_)) => Err(ConfigError::incompatible(
                name,
                "eject_coil",
                EjectorKind::EventOnly.as_str(),
            )),
            (EjectorKind::HoldCoil, None) => Err(ConfigError::missing(name, "hold_coil")),
            (_, None) => Err(ConfigError::missing(name, "eject_coil")),
            (EjectorKind::PulseCoil, Some(coil)) => {
                Ok(AnyEjector::Pulse(PulseCoilEjector::from_config(config, coil)?))
            }
            (EjectorKind::HoldCoil, Some(coil)) => {
                Ok(AnyEjector::Hold(HoldCoilEjector::from_config(config, coil)?))
            }
            (EjectorKind::EnableCoil, Some(coil)) => {
                Ok(AnyEjector::Enable(EnableCoilEjector::from_config(config, coil)?))
            }
        }
    }

    /// The strategy's coil, if it has one.
    pub fn coil(&self) -> Option<&Coil<D>> {
        match self {
            AnyEjector::Pulse(e) => Some(e.coil()),
            AnyEjector::Hold(e) => Some(e.coil()),
            AnyEjector::Enable(e) => Some(e.coil()),
            AnyEjector::Event(_) => None,
        }
    }

    fn inner(&mut self) -> &mut dyn Ejector {
        match self {
            AnyEjector::Pulse(e) => e,
            AnyEjector::Hold(e) => e,
            AnyEjector::Enable(e) => e,
            AnyEjector::Event(e) => e,
        }
    }
}

impl<D: CoilDriver> Ejector for AnyEjector<D> {
    fn setup(&mut self, ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        self.inner().setup(ctx)
    }

    fn eject_one_ball(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        is_jammed: bool,
        eject_try: u32,
    ) -> Result<EjectProgress, EjectorError> {
        self.inner().eject_one_ball(ctx, is_jammed, eject_try)
    }

    fn reorder_balls(&mut self, ctx: &mut EjectorContext<'_>) -> Result<EjectProgress, EjectorError> {
        self.inner().reorder_balls(ctx)
    }

    fn ball_search(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        phase: SearchPhase,
        iteration: u32,
    ) -> Result<bool, EjectorError> {
        self.inner().ball_search(ctx, phase, iteration)
    }

    fn update(&mut self, ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        self.inner().update(ctx)
    }

    fn can_reorder(&self) -> bool {
        match self {
            AnyEjector::Pulse(e) => e.can_reorder(),
            AnyEjector::Hold(e) => e.can_reorder(),
            AnyEjector::Enable(e) => e.can_reorder(),
            AnyEjector::Event(e) => e.can_reorder(),
        }
    }

    fn next_deadline(&self) -> Option<u64> {
        match self {
            AnyEjector::Pulse(e) => e.next_deadline(),
            AnyEjector::Hold(e) => e.next_deadline(),
            AnyEjector::Enable(e) => e.next_deadline(),
            AnyEjector::Event(e) => e.next_deadline(),
        }
    }

    fn kind(&self) -> EjectorKind {
        match self {
            AnyEjector::Pulse(_) => EjectorKind::PulseCoil,
            AnyEjector::Hold(_) => EjectorKind::HoldCoil,
            AnyEjector::Enable(_) => EjectorKind::EnableCoil,
            AnyEjector::Event(_) => EjectorKind::EventOnly,
        }
    }
}
