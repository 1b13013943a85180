//! Pulse-coil ejector: fires a timed pulse sized by the attempt number.

use tracing::{debug, info};

use crate::coil::Coil;
use crate::config::{BallDeviceConfig, EjectorKind, ShortString};
use crate::error::{ConfigError, EjectorError};
use crate::traits::{CoilDriver, EjectProgress, Ejector, EjectorContext, SearchPhase};

/// Extra settle time after a reorder pulse.
pub const REORDER_SETTLE_MS: u64 = 2000;

/// Ejects by pulsing the eject coil.
///
/// Pulse strength escalates with `eject_try`:
///
/// | Condition | Pulse |
/// |-----------|-------|
/// | `eject_try <= 2`, jammed, jam pulse configured | jam pulse |
/// | `eject_try > retries_before_increasing_pulse`, retry pulse configured | retry pulse |
/// | otherwise | coil default |
#[derive(Debug)]
pub struct PulseCoilEjector<D: CoilDriver> {
    device: ShortString,
    coil: Coil<D>,
    jam_pulse: Option<u32>,
    retry_pulse: Option<u32>,
    retries_before_increasing_pulse: u32,
    reorder_pulse: Option<u32>,
    max_wait_ms: Option<u32>,
}

impl<D: CoilDriver> PulseCoilEjector<D> {
    /// Build from device config, rejecting enable and hold settings.
    pub fn from_config(config: &BallDeviceConfig, coil: Coil<D>) -> Result<Self, ConfigError> {
        let name = config.name.as_str();
        let kind = EjectorKind::PulseCoil.as_str();
        if config.eject_coil.is_none() {
            return Err(ConfigError::missing(name, "eject_coil"));
        }
        if config.eject_coil_enable_time.is_some() {
            return Err(ConfigError::incompatible(name, "eject_coil_enable_time", kind));
        }
        if config.hold_coil_release_time.is_some() {
            return Err(ConfigError::incompatible(name, "hold_coil_release_time", kind));
        }

        Ok(Self {
            device: config.name.clone(),
            coil,
            jam_pulse: config.eject_coil_jam_pulse,
            retry_pulse: config.eject_coil_retry_pulse,
            retries_before_increasing_pulse: config.retries_before_increasing_pulse,
            reorder_pulse: config.eject_coil_reorder_pulse,
            max_wait_ms: config.eject_coil_max_wait_ms,
        })
    }

    /// Pulse strength for an attempt; `None` means the coil default.
    pub fn pulse_strength(&self, is_jammed: bool, eject_try: u32) -> Option<u32> {
        match (self.jam_pulse, self.retry_pulse) {
            (Some(jam), _) if eject_try <= 2 && is_jammed => Some(jam),
            (_, Some(retry)) if eject_try > self.retries_before_increasing_pulse => Some(retry),
            _ => None,
        }
    }

    /// The eject coil.
    pub fn coil(&self) -> &Coil<D> {
        &self.coil
    }

    fn fire(&mut self, strength: Option<u32>, now_ms: u64) -> Result<EjectProgress, EjectorError> {
        let wait_ms = self.coil.pulse(strength, self.max_wait_ms, now_ms)?;
        let duration = self.coil.pulse_duration_ms(strength);
        Ok(EjectProgress {
            busy_until_ms: now_ms + u64::from(wait_ms) + u64::from(duration),
        })
    }
}

impl<D: CoilDriver> Ejector for PulseCoilEjector<D> {
    fn eject_one_ball(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        is_jammed: bool,
        eject_try: u32,
    ) -> Result<EjectProgress, EjectorError> {
        let strength = self.pulse_strength(is_jammed, eject_try);
        match strength {
            Some(ms) => info!(device = %self.device, eject_try, is_jammed, pulse_ms = ms, "ejecting with adjusted pulse"),
            None => debug!(device = %self.device, eject_try, "ejecting with default pulse"),
        }
        self.fire(strength, ctx.now_ms)
    }

    fn reorder_balls(&mut self, ctx: &mut EjectorContext<'_>) -> Result<EjectProgress, EjectorError> {
        let pulse = self
            .reorder_pulse
            .ok_or_else(|| ConfigError::missing(self.device.as_str(), "eject_coil_reorder_pulse"))?;
        info!(device = %self.device, pulse_ms = pulse, "reordering balls");
        let progress = self.fire(Some(pulse), ctx.now_ms)?;
        Ok(EjectProgress {
            busy_until_ms: progress.busy_until_ms + REORDER_SETTLE_MS,
        })
    }

    fn ball_search(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        phase: SearchPhase,
        iteration: u32,
    ) -> Result<bool, EjectorError> {
        let strength = match phase {
            // repeated resets are harmless when nothing is inside
            SearchPhase::One if ctx.status.idle && ctx.status.balls == 0 => None,
            SearchPhase::One => return Ok(false),
            _ if ctx.status.is_trough => return Ok(false),
            SearchPhase::Two => self.jam_pulse,
            SearchPhase::Three => None,
        };
        debug!(device = %self.device, phase = phase.number(), iteration, "ball search pulse");
        self.coil.pulse(strength, self.max_wait_ms, ctx.now_ms)?;
        Ok(true)
    }

    fn update(&mut self, ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        self.coil.update(ctx.now_ms)?;
        Ok(())
    }

    fn can_reorder(&self) -> bool {
        self.reorder_pulse.is_some()
    }

    fn next_deadline(&self) -> Option<u64> {
        self.coil.next_deadline()
    }

    fn kind(&self) -> EjectorKind {
        EjectorKind::PulseCoil
    }
}
