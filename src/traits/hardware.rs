//! Platform boundary: time source, coil drivers, and switch reads.
//!
//! These traits are the whole contract with the hardware layer below the
//! crate. Board wire protocols live behind them and are not modelled here.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Clock`] | Monotonic time in milliseconds |
//! | [`CoilDriver`] | Pulse, enable (hold), and disable one driver output |
//! | [`SwitchPlatform`] | Bulk read of raw switch states |
//!
//! # Implementation
//!
//! For tests and desktop development, use the mocks from
//! [`crate::hal::mock`].
//!
//! # Example
//!
//! ```rust
//! use pinball_core::traits::{CoilDriver, PulseSettings};
//! use pinball_core::hal::{CoilAction, MockCoilDriver};
//!
//! let mut driver = MockCoilDriver::new();
//! driver.pulse(PulseSettings::new(20)).unwrap();
//! assert_eq!(driver.actions, vec![CoilAction::Pulse(PulseSettings::new(20))]);
//! ```

use std::collections::BTreeMap;

/// Electrical settings for one pulse.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PulseSettings {
    /// Pulse length in milliseconds.
    pub duration_ms: u32,
    /// Power as a fraction of full duty (0.0 to 1.0).
    pub power: f32,
}

impl PulseSettings {
    /// Full-power pulse of `duration_ms`.
    pub const fn new(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            power: 1.0,
        }
    }

    /// Set the pulse power, clamped to 0.0-1.0.
    pub fn with_power(mut self, power: f32) -> Self {
        self.power = power.clamp(0.0, 1.0);
        self
    }
}

/// Electrical settings for holding a coil after the initial pulse.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoldSettings {
    /// Hold power as a fraction of full duty (0.0 to 1.0).
    pub power: f32,
}

impl HoldSettings {
    /// Hold at `power`, clamped to 0.0-1.0.
    pub fn new(power: f32) -> Self {
        Self {
            power: power.clamp(0.0, 1.0),
        }
    }
}

/// One platform driver output.
///
/// Implementations must not block; a board that needs serial round trips
/// should queue the command and return.
pub trait CoilDriver {
    /// Error type for driver operations.
    type Error: core::fmt::Debug;

    /// Fire a single timed pulse.
    fn pulse(&mut self, pulse: PulseSettings) -> Result<(), Self::Error>;

    /// Pulse, then hold the coil on until [`disable`](Self::disable).
    fn enable(&mut self, pulse: PulseSettings, hold: HoldSettings) -> Result<(), Self::Error>;

    /// Turn the coil off.
    fn disable(&mut self) -> Result<(), Self::Error>;
}

/// Bulk access to raw (physical) switch states.
pub trait SwitchPlatform {
    /// Error type for platform reads.
    type Error: core::fmt::Debug;

    /// Read every switch the platform knows, keyed by platform number.
    ///
    /// States are physical: `true` means the contact is closed.
    fn read_switch_states(&mut self) -> Result<BTreeMap<u32, bool>, Self::Error>;
}

/// Time source.
///
/// Provides monotonic time in milliseconds for every timed operation.
///
/// # Example
///
/// ```rust
/// use pinball_core::traits::Clock;
/// use pinball_core::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_settings_default_full_power() {
        let pulse = PulseSettings::new(15);
        assert_eq!(pulse.duration_ms, 15);
        assert_eq!(pulse.power, 1.0);
    }

    #[test]
    fn pulse_power_clamped() {
        assert_eq!(PulseSettings::new(10).with_power(1.7).power, 1.0);
        assert_eq!(PulseSettings::new(10).with_power(-0.2).power, 0.0);
    }

    #[test]
    fn hold_power_clamped() {
        assert_eq!(HoldSettings::new(2.0).power, 1.0);
        assert_eq!(HoldSettings::new(0.25).power, 0.25);
    }
}
