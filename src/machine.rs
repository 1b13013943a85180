//! Machine glue: owns the switch engine, ball devices, ball search and the
//! event queue, and advances them together.
//!
//! Everything runs on one cooperative tick. The runner calls
//! [`Machine::tick`] with the current time (as often as it likes, at the
//! latest by [`Machine::next_deadline`]) and feeds switch changes through
//! [`Machine::process_switch`] or the engine directly.
//!
//! # Example
//!
//! ```rust
//! use pinball_core::config::{BallDeviceConfig, CoilConfig, MachineConfig, SwitchConfig};
//! use pinball_core::hal::{MockCoilDriver, MockSwitchPlatform};
//! use pinball_core::machine::Machine;
//!
//! let config = MachineConfig::default()
//!     .with_switch(SwitchConfig::new("s_trough1", 1))
//!     .with_coil(CoilConfig::new("c_trough_eject").with_default_pulse_ms(20));
//! let mut machine = Machine::new(config).unwrap();
//!
//! let trough = BallDeviceConfig::new("bd_trough")
//!     .with_eject_coil("c_trough_eject")
//!     .with_ball_switches(&["s_trough1"])
//!     .with_tag("trough");
//! machine.add_ball_device(trough, Some(MockCoilDriver::new())).unwrap();
//!
//! let mut platform = MockSwitchPlatform::new().with_switch(1, true);
//! machine.initialize(&mut platform, 0).unwrap();
//! assert_eq!(machine.device("bd_trough").unwrap().balls(), 1);
//! ```

use tracing::{debug, info};

use crate::ball_device::BallDevice;
use crate::ball_search::BallSearch;
use crate::coil::Coil;
use crate::config::{BallDeviceConfig, CoilConfig, EjectorKind, MachineConfig};
use crate::error::{ConfigError, Error};
use crate::events::{Event, EventQueue};
use crate::switch::SwitchState;
use crate::switch_engine::SwitchEngine;
use crate::traits::{Clock, CoilDriver, SwitchPlatform};
use crate::wait::SwitchInbox;

/// Eject target confirmed by playfield switch activity.
pub const PLAYFIELD: &str = "playfield";

/// A machine built from a [`MachineConfig`].
#[derive(Debug)]
pub struct Machine<D: CoilDriver> {
    config: MachineConfig,
    engine: SwitchEngine,
    devices: Vec<BallDevice<D>>,
    ball_search: BallSearch,
    events: EventQueue,
    playfield_inbox: SwitchInbox,
}

impl<D: CoilDriver> Machine<D> {
    /// Create the machine and its switches.
    pub fn new(config: MachineConfig) -> Result<Self, Error> {
        let mut engine = SwitchEngine::new(config.production);
        for switch in &config.switches {
            engine.add_switch(switch)?;
        }
        info!(switches = config.switches.len(), production = config.production, "machine created");

        Ok(Self {
            ball_search: BallSearch::new(config.ball_search.clone()),
            config,
            engine,
            devices: Vec::new(),
            events: EventQueue::new(),
            playfield_inbox: SwitchInbox::new(),
        })
    }

    /// Add a ball device driven by `driver`.
    ///
    /// The driver drives the device's eject coil, or its hold coil for a
    /// hold ejector; the coil's base settings come from the machine config.
    /// Devices added after [`initialize`](Self::initialize) are set up
    /// straight away.
    pub fn add_ball_device(
        &mut self,
        config: BallDeviceConfig,
        driver: Option<D>,
    ) -> Result<(), Error> {
        if self.device(config.name.as_str()).is_some() {
            return Err(ConfigError::new(config.name.as_str(), "name", "duplicate ball device").into());
        }

        let coil_name = match config.ejector {
            EjectorKind::HoldCoil => config.hold_coil.clone(),
            _ => config.eject_coil.clone(),
        };
        let coil = driver.map(|driver| {
            let coil_config = coil_name
                .as_ref()
                .map(|name| {
                    self.config
                        .coil(name.as_str())
                        .cloned()
                        .unwrap_or_else(|| CoilConfig::new(name.as_str()))
                })
                .unwrap_or_default();
            Coil::new(coil_config, driver)
        });

        let mut device = BallDevice::from_config(config, coil, &self.engine)?;
        if self.engine.is_initialised() {
            device.setup(&mut self.engine, &mut self.events, 0)?;
        }
        debug!(device = device.name(), "ball device added");
        self.devices.push(device);
        Ok(())
    }

    /// Add every device listed in the machine config.
    ///
    /// `driver_for` supplies the coil driver for each device (`None` for
    /// event-only devices).
    pub fn add_configured_devices<F>(&mut self, mut driver_for: F) -> Result<(), Error>
    where
        F: FnMut(&BallDeviceConfig) -> Option<D>,
    {
        for config in self.config.ball_devices.clone() {
            let driver = driver_for(&config);
            self.add_ball_device(config, driver)?;
        }
        Ok(())
    }

    /// Read switches from hardware and set up every device.
    pub fn initialize<P: SwitchPlatform>(
        &mut self,
        platform: &mut P,
        now_ms: u64,
    ) -> Result<(), Error> {
        self.engine.initialize(platform, now_ms)?;

        for name in &self.config.playfield_switches {
            let id = self.engine.switch_id(name.as_str())?;
            self.engine
                .register(id, SwitchState::Active, 0, self.playfield_inbox.callback(), now_ms)?;
        }
        for device in &mut self.devices {
            device.setup(&mut self.engine, &mut self.events, now_ms)?;
        }
        Ok(())
    }

    /// Advance switch timers, devices and ball search to `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), Error> {
        self.engine.update(now_ms);

        if !self.playfield_inbox.drain().is_empty() {
            for device in &mut self.devices {
                if device.eject_target() == Some(PLAYFIELD) {
                    device.confirm_eject();
                }
            }
            self.ball_search.activity(now_ms, &mut self.events);
        }

        for device in &mut self.devices {
            device.update(&mut self.engine, &mut self.events, now_ms)?;
        }
        self.ball_search
            .update(now_ms, &mut self.devices, &mut self.engine, &mut self.events)?;
        Ok(())
    }

    /// Tick at the clock's current time.
    pub fn poll<C: Clock>(&mut self, clock: &C) -> Result<(), Error> {
        self.tick(clock.now_ms())
    }

    /// Report a logical switch change by name, then tick.
    pub fn process_switch(&mut self, name: &str, active: bool, now_ms: u64) -> Result<(), Error> {
        self.engine.process_named(name, u8::from(active), true, now_ms)?;
        self.tick(now_ms)
    }

    /// Earliest time a tick has timed work to do.
    ///
    /// Covers switch hold timers, device eject timers, strategy timers and
    /// ball search.
    pub fn next_deadline(&self) -> Option<u64> {
        self.devices
            .iter()
            .map(|device| device.next_deadline())
            .chain([self.engine.next_deadline(), self.ball_search.next_deadline()])
            .flatten()
            .min()
    }

    /// Take every event posted since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    /// Events posted since the last drain.
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Machine configuration.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Switch engine.
    pub fn engine(&self) -> &SwitchEngine {
        &self.engine
    }

    /// Switch engine, mutably.
    pub fn engine_mut(&mut self) -> &mut SwitchEngine {
        &mut self.engine
    }

    /// Ball devices in the order they were added.
    pub fn devices(&self) -> &[BallDevice<D>] {
        &self.devices
    }

    /// Look up a device by name.
    pub fn device(&self, name: &str) -> Option<&BallDevice<D>> {
        self.devices.iter().find(|d| d.name() == name)
    }

    /// Look up a device by name, mutably.
    pub fn device_mut(&mut self, name: &str) -> Option<&mut BallDevice<D>> {
        self.devices.iter_mut().find(|d| d.name() == name)
    }

    /// Ball search coordinator.
    pub fn ball_search(&self) -> &BallSearch {
        &self.ball_search
    }

    /// Ball search coordinator, mutably.
    pub fn ball_search_mut(&mut self) -> &mut BallSearch {
        &mut self.ball_search
    }

    /// Enable ball search and start its timer.
    pub fn enable_ball_search(&mut self, now_ms: u64) {
        self.ball_search.enable(now_ms);
    }

    /// Disable ball search, stopping a running search.
    pub fn disable_ball_search(&mut self) {
        self.ball_search.disable(&mut self.events);
    }
}
