//! Hold-coil ejector: keeps balls in with a held coil and releases to eject.

use tracing::{debug, info};

use crate::coil::{Coil, CoilOverlay};
use crate::config::{BallDeviceConfig, EjectorKind, ShortString};
use crate::error::{ConfigError, EjectorError};
use crate::switch::{SwitchId, SwitchState};
use crate::traits::{CoilDriver, EjectProgress, Ejector, EjectorContext, SearchPhase};
use crate::wait::SwitchInbox;

/// Release window used when `hold_coil_release_time` is not set.
pub const DEFAULT_RELEASE_MS: u32 = 1000;

/// Holds the coil while any hold switch is active, except during a release.
#[derive(Debug)]
pub struct HoldCoilEjector<D: CoilDriver> {
    device: ShortString,
    coil: Coil<D>,
    hold_switch_names: Vec<ShortString>,
    hold_switches: Vec<SwitchId>,
    release_ms: u32,
    releasing_until: Option<u64>,
    inbox: SwitchInbox,
}

impl<D: CoilDriver> HoldCoilEjector<D> {
    /// Build from device config. Needs a hold coil and hold switches.
    pub fn from_config(config: &BallDeviceConfig, coil: Coil<D>) -> Result<Self, ConfigError> {
        let name = config.name.as_str();
        let kind = EjectorKind::HoldCoil.as_str();
        if config.hold_coil.is_none() {
            return Err(ConfigError::missing(name, "hold_coil"));
        }
        if config.hold_switches.is_empty() {
            return Err(ConfigError::missing(name, "hold_switches"));
        }
        let incompatible = [
            ("eject_coil_enable_time", config.eject_coil_enable_time.is_some()),
            ("eject_coil_jam_pulse", config.eject_coil_jam_pulse.is_some()),
            ("eject_coil_retry_pulse", config.eject_coil_retry_pulse.is_some()),
            ("eject_coil_reorder_pulse", config.eject_coil_reorder_pulse.is_some()),
        ];
        if let Some((field, _)) = incompatible.iter().find(|(_, set)| *set) {
            return Err(ConfigError::incompatible(name, *field, kind));
        }

        Ok(Self {
            device: config.name.clone(),
            coil,
            hold_switch_names: config.hold_switches.clone(),
            hold_switches: Vec::new(),
            release_ms: config.hold_coil_release_time.unwrap_or(DEFAULT_RELEASE_MS),
            releasing_until: None,
            inbox: SwitchInbox::new(),
        })
    }

    /// The hold coil.
    pub fn coil(&self) -> &Coil<D> {
        &self.coil
    }

    /// Hold switches resolved during setup.
    pub fn hold_switches(&self) -> &[SwitchId] {
        &self.hold_switches
    }

    /// Whether a release is in progress.
    pub fn is_releasing(&self) -> bool {
        self.releasing_until.is_some()
    }

    fn hold(&mut self) -> Result<(), EjectorError> {
        if !self.coil.is_enabled() {
            debug!(device = %self.device, "enabling hold coil");
            self.coil.enable(&CoilOverlay::new())?;
        }
        Ok(())
    }
}

impl<D: CoilDriver> Ejector for HoldCoilEjector<D> {
    fn setup(&mut self, ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        // hits land in the inbox; the coil engages when update drains it,
        // which Machine::process_switch runs in the same call
        let mut any_active = false;
        for name in &self.hold_switch_names {
            let id = ctx.engine.switch_id(name.as_str())?;
            ctx.engine
                .register(id, SwitchState::Active, 0, self.inbox.callback(), ctx.now_ms)?;
            any_active |= ctx.engine.is_active(id, 0, ctx.now_ms)?;
            self.hold_switches.push(id);
        }
        if any_active {
            self.hold()?;
        }
        Ok(())
    }

    fn eject_one_ball(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        _is_jammed: bool,
        eject_try: u32,
    ) -> Result<EjectProgress, EjectorError> {
        info!(device = %self.device, eject_try, release_ms = self.release_ms, "releasing hold coil");
        self.coil.disable()?;
        let until = ctx.now_ms + u64::from(self.release_ms);
        self.releasing_until = Some(until);
        Ok(EjectProgress {
            busy_until_ms: until,
        })
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
        debug!(device = %self.device, phase = phase.number(), iteration, "ball search pulse");
        self.coil.pulse(None, None, ctx.now_ms)?;
        Ok(true)
    }

    fn update(&mut self, ctx: &mut EjectorContext<'_>) -> Result<(), EjectorError> {
        self.coil.update(ctx.now_ms)?;

        if let Some(until) = self.releasing_until {
            if ctx.now_ms < until {
                // hold switch hits during a release are ignored
                self.inbox.clear();
                return Ok(());
            }
            self.releasing_until = None;
            if ctx.status.balls > 0 {
                self.hold()?;
            }
        }

        if !self.inbox.drain().is_empty() {
            self.hold()?;
        }
        Ok(())
    }

    fn next_deadline(&self) -> Option<u64> {
        [self.releasing_until, self.coil.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    fn kind(&self) -> EjectorKind {
        EjectorKind::HoldCoil
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoilConfig;
    use crate::hal::MockCoilDriver;

    fn coil() -> Coil<MockCoilDriver> {
        Coil::new(CoilConfig::new("c_hold"), MockCoilDriver::new())
    }

    #[test]
    fn needs_hold_switches() {
        let config = BallDeviceConfig::new("bd_lock").with_hold_coil("c_hold", &[]);
        let err = HoldCoilEjector::from_config(&config, coil()).unwrap_err();
        assert_eq!(err.field, "hold_switches");
    }

    #[test]
    fn rejects_pulse_settings() {
        let config = BallDeviceConfig::new("bd_lock")
            .with_hold_coil("c_hold", &["s_lock"])
            .with_jam_pulse(5);
        let err = HoldCoilEjector::from_config(&config, coil()).unwrap_err();
        assert_eq!(err.field, "eject_coil_jam_pulse");
    }

    #[test]
    fn release_time_defaults() {
        let config = BallDeviceConfig::new("bd_lock").with_hold_coil("c_hold", &["s_lock"]);
        let ejector = HoldCoilEjector::from_config(&config, coil()).unwrap();
        assert_eq!(ejector.release_ms, DEFAULT_RELEASE_MS);
        assert!(!ejector.is_releasing());
    }
}
