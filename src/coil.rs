//! Driver output wrapper shared by ejectors.
//!
//! A [`Coil`] pairs an immutable [`CoilConfig`] with a platform
//! [`CoilDriver`]. Callers that need different electrical settings pass a
//! [`CoilOverlay`]; it is merged into concrete settings for that one call
//! and the base config is never touched.
//!
//! Pulses respect the coil's recycle window: a pulse requested too soon is
//! deferred until the window ends, but never longer than the caller's
//! `max_wait_ms`. Deferred pulses are fired from [`Coil::update`].
//!
//! # Example
//!
//! ```rust
//! use pinball_core::coil::{Coil, CoilOverlay};
//! use pinball_core::config::CoilConfig;
//! use pinball_core::hal::MockCoilDriver;
//!
//! let config = CoilConfig::new("c_trough_eject").with_default_pulse_ms(20);
//! let mut coil = Coil::new(config, MockCoilDriver::new());
//!
//! assert_eq!(coil.pulse(None, None, 0).unwrap(), 0);
//! assert_eq!(coil.pulse(Some(5), None, 100).unwrap(), 0);
//! assert_eq!(coil.driver().pulses(), vec![20, 5]);
//!
//! // Overlays change one call only
//! coil.enable(&CoilOverlay::new().with_hold_power(0.25)).unwrap();
//! assert_eq!(coil.config().default_hold_power, 1.0);
//! ```

use tracing::debug;

use crate::config::CoilConfig;
use crate::error::CoilError;
use crate::traits::{CoilDriver, HoldSettings, PulseSettings};

/// Per-call adjustments to a coil's base settings.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CoilOverlay {
    /// Pulse length override.
    pub pulse_ms: Option<u32>,
    /// Pulse power override.
    pub pulse_power: Option<f32>,
    /// Hold power override.
    pub hold_power: Option<f32>,
}

impl CoilOverlay {
    /// Overlay that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the pulse length.
    pub fn with_pulse_ms(mut self, ms: u32) -> Self {
        self.pulse_ms = Some(ms);
        self
    }

    /// Override the pulse power.
    pub fn with_pulse_power(mut self, power: f32) -> Self {
        self.pulse_power = Some(power);
        self
    }

    /// Override the hold power.
    pub fn with_hold_power(mut self, power: f32) -> Self {
        self.hold_power = Some(power);
        self
    }
}

/// A configured coil and its driver.
#[derive(Debug)]
pub struct Coil<D: CoilDriver> {
    config: CoilConfig,
    driver: D,
    recycle_until: Option<u64>,
    deferred: Option<(PulseSettings, u64)>,
    enabled: bool,
}

impl<D: CoilDriver> Coil<D> {
    /// Wrap a driver with its base config.
    pub fn new(config: CoilConfig, driver: D) -> Self {
        Self {
            config,
            driver,
            recycle_until: None,
            deferred: None,
            enabled: false,
        }
    }

    /// Coil name.
    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    /// Base configuration.
    pub fn config(&self) -> &CoilConfig {
        &self.config
    }

    /// Platform driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Platform driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Whether the coil is held on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a deferred pulse is waiting.
    pub fn has_deferred_pulse(&self) -> bool {
        self.deferred.is_some()
    }

    /// When the deferred pulse is due, if one is waiting.
    pub fn next_deadline(&self) -> Option<u64> {
        self.deferred.map(|(_, at)| at)
    }

    /// Pulse length used for `strength` (or the default).
    pub fn pulse_duration_ms(&self, strength: Option<u32>) -> u32 {
        strength.unwrap_or(self.config.default_pulse_ms)
    }

    /// Merge an overlay into concrete pulse settings.
    pub fn pulse_settings(&self, overlay: &CoilOverlay) -> PulseSettings {
        PulseSettings::new(overlay.pulse_ms.unwrap_or(self.config.default_pulse_ms))
            .with_power(overlay.pulse_power.unwrap_or(self.config.default_pulse_power))
    }

    /// Merge an overlay into concrete hold settings.
    pub fn hold_settings(&self, overlay: &CoilOverlay) -> HoldSettings {
        HoldSettings::new(overlay.hold_power.unwrap_or(self.config.default_hold_power))
    }

    /// Pulse at `strength` ms (coil default if `None`).
    ///
    /// Returns how long the pulse was delayed waiting for the recycle window.
    pub fn pulse(
        &mut self,
        strength: Option<u32>,
        max_wait_ms: Option<u32>,
        now_ms: u64,
    ) -> Result<u32, CoilError> {
        let overlay = CoilOverlay {
            pulse_ms: strength,
            ..Default::default()
        };
        self.pulse_with(&overlay, max_wait_ms, now_ms)
    }

    /// Pulse with an overlay.
    pub fn pulse_with(
        &mut self,
        overlay: &CoilOverlay,
        max_wait_ms: Option<u32>,
        now_ms: u64,
    ) -> Result<u32, CoilError> {
        let settings = self.pulse_settings(overlay);

        let mut wait_ms = match self.recycle_until {
            Some(until) if until > now_ms => u32::try_from(until - now_ms).unwrap_or(u32::MAX),
            _ => 0,
        };
        if let Some(max) = max_wait_ms {
            wait_ms = wait_ms.min(max);
        }

        if wait_ms > 0 {
            debug!(coil = %self.config.name, wait_ms, "deferring pulse until recycle ends");
            let replaced = self.deferred.replace((settings, now_ms + u64::from(wait_ms)));
            if let Some((old, at)) = replaced {
                debug!(coil = %self.config.name, ms = old.duration_ms, due_ms = at, "replacing deferred pulse");
            }
            return Ok(wait_ms);
        }

        self.fire(settings, now_ms)?;
        Ok(0)
    }

    /// Fire a deferred pulse once it is due.
    pub fn update(&mut self, now_ms: u64) -> Result<(), CoilError> {
        if let Some((settings, at)) = self.deferred {
            if at <= now_ms {
                self.deferred = None;
                self.fire(settings, now_ms)?;
            }
        }
        Ok(())
    }

    fn fire(&mut self, settings: PulseSettings, now_ms: u64) -> Result<(), CoilError> {
        debug!(coil = %self.config.name, ms = settings.duration_ms, power = settings.power, "pulse");
        self.driver.pulse(settings).map_err(|e| self.error(e))?;
        self.recycle_until =
            Some(now_ms + u64::from(settings.duration_ms) + u64::from(self.config.recycle_ms));
        Ok(())
    }

    /// Pulse, then hold the coil on.
    pub fn enable(&mut self, overlay: &CoilOverlay) -> Result<(), CoilError> {
        let pulse = self.pulse_settings(overlay);
        let hold = self.hold_settings(overlay);
        debug!(coil = %self.config.name, hold_power = hold.power, "enable");
        self.driver.enable(pulse, hold).map_err(|e| self.error(e))?;
        self.enabled = true;
        Ok(())
    }

    /// Turn the coil off and drop any deferred pulse.
    pub fn disable(&mut self) -> Result<(), CoilError> {
        debug!(coil = %self.config.name, "disable");
        self.deferred = None;
        self.driver.disable().map_err(|e| self.error(e))?;
        self.enabled = false;
        Ok(())
    }

    fn error(&self, err: D::Error) -> CoilError {
        CoilError {
            coil: self.config.name.as_str().into(),
            message: format!("{err:?}"),
        }
    }
}
