//! Enable-coil ejector: holds the eject coil on for a fixed window.

use tracing::{debug, info};

use crate::coil::{Coil, CoilOverlay};
use crate::config::{BallDeviceConfig, EjectorKind, ShortString};
use crate::error::{ConfigError, EjectorError};
use crate::traits::{CoilDriver, EjectProgress, Ejector, EjectorContext, SearchPhase};

/// Ejects with a time-boxed enable instead of a pulse.
#[derive(Debug)]
pub struct EnableCoilEjector<D: CoilDriver> {
    device: ShortString,
    coil: Coil<D>,
    enable_ms: u32,
    jam_pulse: Option<u32>,
    max_wait_ms: Option<u32>,
    disable_at: Option<u64>,
}

impl<D: CoilDriver> EnableCoilEjector<D> {
    /// Build from device config. Needs `eject_coil_enable_time`.
    pub fn from_config(config: &BallDeviceConfig, coil: Coil<D>) -> Result<Self, ConfigError> {
        let name = config.name.as_str();
        let kind = EjectorKind::EnableCoil.as_str();
        if config.eject_coil.is_none() {
            return Err(ConfigError::missing(name, "eject_coil"));
        }
        let enable_ms = config
            .eject_coil_enable_time
            .ok_or_else(|| ConfigError::missing(name, "eject_coil_enable_time"))?;
        if config.eject_coil_retry_pulse.is_some() {
            return Err(ConfigError::incompatible(name, "eject_coil_retry_pulse", kind));
        }
        if config.eject_coil_reorder_pulse.is_some() {
            return Err(ConfigError::incompatible(name, "eject_coil_reorder_pulse", kind));
        }
        if config.hold_coil_release_time.is_some() {
            return Err(ConfigError::incompatible(name, "hold_coil_release_time", kind));
        }

        Ok(Self {
            device: config.name.clone(),
            coil,
            enable_ms,
            jam_pulse: config.eject_coil_jam_pulse,
            max_wait_ms: config.eject_coil_max_wait_ms,
            disable_at: None,
        })
    }

    /// The eject coil.
    pub fn coil(&self) -> &Coil<D> {
        &self.coil
    }

    fn enable_for_window(&mut self, now_ms: u64) -> Result<EjectProgress, EjectorError> {
        self.coil.enable(&CoilOverlay::new())?;
        let until = now_ms + u64::from(self.enable_ms);
        self.disable_at = Some(until);
        Ok(EjectProgress {
            busy_until_ms: until,
        })
    }
}

impl<D: CoilDriver> Ejector for EnableCoilEjector<D> {
    fn eject_one_ball(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        _is_jammed: bool,
        eject_try: u32,
    ) -> Result<EjectProgress, EjectorError> {
        info!(device = %self.device, eject_try, enable_ms = self.enable_ms, "enabling eject coil");
        self.enable_for_window(ctx.now_ms)
    }

    fn reorder_balls(&mut self, ctx: &mut EjectorContext<'_>) -> Result<EjectProgress, EjectorError> {
        Ok(EjectProgress::done(ctx.now_ms))
    }

    fn ball_search(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        phase: SearchPhase,
        iteration: u32,
    ) -> Result<bool, EjectorError> {
        debug!(device = %self.device, phase = phase.number(), iteration, "ball search");
        if self.jam_pulse.is_some() {
            self.coil.pulse(None, self.max_wait_ms, ctx.now_ms)?;
        } else {
            self.enable_for_window(ctx.now_ms)?;
        }
        Ok(true)
    }

    fn update(&mut self, ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        self.coil.update(ctx.now_ms)?;
        if matches!(self.disable_at, Some(at) if at <= ctx.now_ms) {
            self.disable_at = None;
            self.coil.disable()?;
        }
        Ok(())
    }

    fn next_deadline(&self) -> Option<u64> {
        [self.disable_at, self.coil.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn kind(&self) -> EjectorKind {
        EjectorKind::EnableCoil
    }
}
