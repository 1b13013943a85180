//! Event-only ejector for devices without their own actuator.
//!
//! Something outside the crate (a show, a mechanical plunger prompt) listens
//! for the posted events and moves the ball.

use tracing::debug;

use crate::config::{BallDeviceConfig, EjectorKind, ShortString};
use crate::error::{ConfigError, EjectorError};
use crate::events::Event;
use crate::traits::{EjectProgress, Ejector, EjectorContext, SearchPhase};

/// Posts `balldevice_<name>_ejector_*` events instead of firing coils.
#[derive(Debug, Clone)]
pub struct EventEjector {
    device: ShortString,
}

impl EventEjector {
    /// Build from device config. Any coil setting is an error.
    pub fn from_config(config: &BallDeviceConfig) -> Result<Self, ConfigError> {
        let name = config.name.as_str();
        let kind = EjectorKind::EventOnly.as_str();
        let coil_fields = [
            ("eject_coil", config.eject_coil.is_some()),
            ("hold_coil", config.hold_coil.is_some()),
            ("eject_coil_enable_time", config.eject_coil_enable_time.is_some()),
            ("eject_coil_jam_pulse", config.eject_coil_jam_pulse.is_some()),
            ("eject_coil_retry_pulse", config.eject_coil_retry_pulse.is_some()),
            ("eject_coil_reorder_pulse", config.eject_coil_reorder_pulse.is_some()),
            ("hold_coil_release_time", config.hold_coil_release_time.is_some()),
        ];
        if let Some((field, _)) = coil_fields.iter().find(|(_, set)| *set) {
            return Err(ConfigError::incompatible(name, *field, kind));
        }
        Ok(Self {
            device: config.name.clone(),
        })
    }

    fn event_name(&self, action: &str) -> String {
        format!("balldevice_{}_ejector_{}", self.device, action)
    }
}

impl Ejector for EventEjector {
    fn eject_one_ball(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        is_jammed: bool,
        eject_try: u32,
    ) -> Result<EjectProgress, EjectorError> {
        ctx.events.post(
            Event::new(self.event_name("eject_one_ball"))
                .with_arg("is_jammed", is_jammed)
                .with_arg("eject_try", eject_try),
        );
        Ok(EjectProgress::done(ctx.now_ms))
    }

    fn reorder_balls(&mut self, ctx: &mut EjectorContext<'_>) -> Result<EjectProgress, EjectorError> {
        ctx.events.post(Event::new(self.event_name("reorder_balls")));
        Ok(EjectProgress::done(ctx.now_ms))
    }

    fn ball_search(
        &mut self,
        ctx: &mut EjectorContext<'_>,
        phase: SearchPhase,
        iteration: u32,
    ) -> Result<bool, EjectorError> {
        debug!(device = %self.device, phase = phase.number(), "ball search event");
        ctx.events.post(
            Event::new(self.event_name("ball_search"))
                .with_arg("phase", u32::from(phase.number()))
                .with_arg("iteration", iteration),
        );
        // nothing physical moved
        Ok(false)
    }

    fn can_reorder(&self) -> bool {
        true
    }

    fn kind(&self) -> EjectorKind {
        EjectorKind::EventOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coils_rejected() {
        let config = BallDeviceConfig::new("bd_magnet").with_eject_coil("c_magnet");
        let err = EventEjector::from_config(&config).unwrap_err();
        assert_eq!(err.field, "eject_coil");
    }

    #[test]
    fn event_names_include_device() {
        let ejector = EventEjector::from_config(&BallDeviceConfig::new("bd_magnet")).unwrap();
        assert_eq!(
            ejector.event_name("eject_one_ball"),
            "balldevice_bd_magnet_ejector_eject_one_ball"
        );
    }
}
