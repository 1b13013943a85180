//! # pinball-core
//!
//! Switch handling and ball ejection for pinball machine control.
//!
//! ## Features
//!
//! - **Switch event engine**: NC polarity, duplicate suppression, immediate
//!   and hold-time handlers, waits that resolve exactly once, monitors
//! - **Ejector strategies**: pulse (with jam and retry escalation), hold,
//!   enable and event-only, chosen per device in config
//! - **Ball devices**: ball counting, eject retries, jam reordering, missing
//!   ball detection
//! - **Ball search**: three-phase playfield search after inactivity
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Platform boundary and the ejector strategy trait
//! - `switch_engine` - Switch state and handler dispatch
//! - `ejector` - Built-in ejector strategies
//! - `ball_device` - Per-device eject state machine
//! - `machine` - Ties engine, devices and ball search together
//! - `hal` - Mock platform for tests and demos
//!
//! Time is always passed in explicitly as `now_ms`; nothing in the crate
//! sleeps or spawns.
//!
//! ## Example
//!
//! ```rust
//! use pinball_core::{
//!     config::{BallDeviceConfig, CoilConfig, MachineConfig, SwitchConfig},
//!     hal::{MockCoilDriver, MockSwitchPlatform},
//!     Machine,
//! };
//!
//! let config = MachineConfig::default()
//!     .with_switch(SwitchConfig::new("s_plunger", 1))
//!     .with_coil(CoilConfig::new("c_plunger").with_default_pulse_ms(15));
//! let mut machine = Machine::new(config).unwrap();
//! machine
//!     .add_ball_device(
//!         BallDeviceConfig::new("bd_plunger")
//!             .with_eject_coil("c_plunger")
//!             .with_ball_switches(&["s_plunger"]),
//!         Some(MockCoilDriver::new()),
//!     )
//!     .unwrap();
//!
//! machine
//!     .initialize(&mut MockSwitchPlatform::new().with_switch(1, true), 0)
//!     .unwrap();
//!
//! // Eject the ball and run the main loop
//! machine.device_mut("bd_plunger").unwrap().eject(None);
//! machine.tick(10).unwrap();
//!
//! let pulses = machine.device("bd_plunger").unwrap().ejector().coil().unwrap().driver().pulses();
//! assert_eq!(pulses, vec![15]);
//! ```

#![warn(missing_docs)]

/// Ball-holding devices and their eject state machine.
pub mod ball_device;
/// Playfield ball search.
pub mod ball_search;
/// Coil wrapper with per-call overlays and recycle handling.
pub mod coil;
/// Machine configuration.
pub mod config;
/// Built-in ejector strategies.
pub mod ejector;
/// Error types.
pub mod error;
/// Posted events and event sinks.
pub mod events;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Machine glue.
pub mod machine;
/// Switch entity.
pub mod switch;
/// Switch event engine.
pub mod switch_engine;
/// Core traits for the platform boundary and ejector strategies.
pub mod traits;
/// Switch waits and inboxes.
pub mod wait;

// Re-exports for convenience
pub use ball_device::{BallDevice, DeviceState};
pub use ball_search::BallSearch;
pub use coil::{Coil, CoilOverlay};
pub use ejector::{AnyEjector, EnableCoilEjector, EventEjector, HoldCoilEjector, PulseCoilEjector};
pub use error::{CoilError, ConfigError, EjectorError, Error, SwitchError};
pub use events::{Event, EventArg, EventQueue, EventSink};
pub use machine::Machine;
pub use switch::{Switch, SwitchId, SwitchState};
pub use switch_engine::{HandlerHandle, MonitoredSwitchChange, SwitchEngine, WaitState};
pub use traits::{
    // Hardware
    Clock,
    CoilDriver,
    // Ejectors
    DeviceStatus,
    EjectProgress,
    Ejector,
    EjectorContext,
    HoldSettings,
    PulseSettings,
    SearchPhase,
    SwitchPlatform,
};
pub use wait::{SwitchHit, SwitchInbox, SwitchWait};

// Config re-exports
pub use config::{BallDeviceConfig, BallSearchConfig, CoilConfig, EjectorKind, MachineConfig, SwitchConfig};
