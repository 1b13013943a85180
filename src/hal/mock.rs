//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the platform traits, enabling
//! development and testing on desktop without driver boards.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockCoilDriver`] | [`CoilDriver`] | Records pulse/enable/disable calls |
//! | [`MockSwitchPlatform`] | [`SwitchPlatform`] | Settable raw switch states |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//!
//! # Example
//!
//! ```rust
//! use pinball_core::hal::{CoilAction, MockCoilDriver};
//! use pinball_core::traits::{CoilDriver, PulseSettings};
//!
//! let mut driver = MockCoilDriver::new();
//! driver.pulse(PulseSettings::new(12)).unwrap();
//! driver.disable().unwrap();
//!
//! assert_eq!(driver.pulses(), vec![12]);
//! assert_eq!(driver.actions.last(), Some(&CoilAction::Disable));
//! ```
//!
//! [`CoilDriver`]: crate::traits::CoilDriver
//! [`SwitchPlatform`]: crate::traits::SwitchPlatform
//! [`Clock`]: crate::traits::Clock

use std::collections::BTreeMap;

use crate::traits::{Clock, CoilDriver, HoldSettings, PulseSettings, SwitchPlatform};

// ============================================================================
// Coil Mocks
// ============================================================================

/// One call recorded by [`MockCoilDriver`].
#[derive(Clone, Debug, PartialEq)]
pub enum CoilAction {
    /// `pulse` was called.
    Pulse(PulseSettings),
    /// `enable` was called.
    Enable(PulseSettings, HoldSettings),
    /// `disable` was called.
    Disable,
}

/// Mock coil driver for testing.
///
/// Records every call in order. Set `fail` to make every call return an
/// error.
#[derive(Debug, Default)]
pub struct MockCoilDriver {
    /// Calls in the order they were made.
    pub actions: Vec<CoilAction>,
    /// Whether the coil is currently held on.
    pub enabled: bool,
    /// Fail every call with this message.
    pub fail: Option<&'static str>,
}

impl MockCoilDriver {
    /// Creates a new mock driver with no recorded calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock driver whose calls all fail.
    pub fn failing(message: &'static str) -> Self {
        Self {
            fail: Some(message),
            ..Default::default()
        }
    }

    /// Pulse lengths in the order they were fired.
    pub fn pulses(&self) -> Vec<u32> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                CoilAction::Pulse(p) => Some(p.duration_ms),
                _ => None,
            })
            .collect()
    }

    /// Number of `enable` calls.
    pub fn enable_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, CoilAction::Enable(..)))
            .count()
    }

    /// Number of `disable` calls.
    pub fn disable_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, CoilAction::Disable))
            .count()
    }

    /// Forget recorded calls.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    fn check(&self) -> Result<(), &'static str> {
        match self.fail {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }
}

impl CoilDriver for MockCoilDriver {
    type Error = &'static str;

    fn pulse(&mut self, pulse: PulseSettings) -> Result<(), Self::Error> {
        self.check()?;
        self.actions.push(CoilAction::Pulse(pulse));
        Ok(())
    }

    fn enable(&mut self, pulse: PulseSettings, hold: HoldSettings) -> Result<(), Self::Error> {
        self.check()?;
        self.actions.push(CoilAction::Enable(pulse, hold));
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.actions.push(CoilAction::Disable);
        self.enabled = false;
        Ok(())
    }
}

// ============================================================================
// Switch Mocks
// ============================================================================

/// Mock switch platform for testing.
///
/// Holds raw (physical) states by platform number.
///
/// # Example
///
/// ```rust
/// use pinball_core::hal::MockSwitchPlatform;
/// use pinball_core::traits::SwitchPlatform;
///
/// let mut platform = MockSwitchPlatform::new().with_switch(1, true).with_switch(2, false);
/// let states = platform.read_switch_states().unwrap();
/// assert_eq!(states.get(&1), Some(&true));
/// ```
#[derive(Debug, Default)]
pub struct MockSwitchPlatform {
    /// Raw states by platform number.
    pub states: BTreeMap<u32, bool>,
    /// Number of reads performed.
    pub read_count: usize,
}

impl MockSwitchPlatform {
    /// Creates a platform with no switches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a switch with its raw state.
    pub fn with_switch(mut self, number: u32, closed: bool) -> Self {
        self.states.insert(number, closed);
        self
    }

    /// Change a raw state.
    pub fn set(&mut self, number: u32, closed: bool) {
        self.states.insert(number, closed);
    }
}

impl SwitchPlatform for MockSwitchPlatform {
    type Error = ();

    fn read_switch_states(&mut self) -> Result<BTreeMap<u32, bool>, ()> {
        self.read_count += 1;
        Ok(self.states.clone())
    }
}

// ============================================================================
// Clock Mock
// ============================================================================

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use pinball_core::hal::MockClock;
/// use pinball_core::traits::Clock;
///
/// let mut clock = MockClock::new();
/// clock.set(1000);
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_driver_records_in_order() {
        let mut driver = MockCoilDriver::new();
        driver.pulse(PulseSettings::new(10)).unwrap();
        driver
            .enable(PulseSettings::new(20), HoldSettings::new(0.5))
            .unwrap();
        driver.disable().unwrap();

        assert_eq!(driver.actions.len(), 3);
        assert_eq!(driver.pulses(), vec![10]);
        assert_eq!(driver.enable_count(), 1);
        assert_eq!(driver.disable_count(), 1);
        assert!(!driver.enabled);
    }

    #[test]
    fn mock_driver_tracks_enabled() {
        let mut driver = MockCoilDriver::new();
        driver
            .enable(PulseSettings::new(20), HoldSettings::new(1.0))
            .unwrap();
        assert!(driver.enabled);
    }

    #[test]
    fn failing_driver_records_nothing() {
        let mut driver = MockCoilDriver::failing("bus fault");
        assert_eq!(driver.pulse(PulseSettings::new(10)), Err("bus fault"));
        assert!(driver.actions.is_empty());
    }

    #[test]
    fn mock_platform_counts_reads() {
        let mut platform = MockSwitchPlatform::new().with_switch(3, true);
        platform.read_switch_states().unwrap();
        platform.set(3, false);
        let states = platform.read_switch_states().unwrap();
        assert_eq!(states.get(&3), Some(&false));
        assert_eq!(platform.read_count, 2);
    }

    #[test]
    fn mock_clock_advance() {
        let mut clock = MockClock::new();
        clock.advance(500);
        assert_eq!(clock.now_ms(), 500);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 750);
    }
}
