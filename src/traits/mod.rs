//! Trait definitions for the platform boundary and ejector strategies.
//!
//! # Submodules
//!
//! - `hardware`: Coil drivers, switch reads, clock
//! - `ejector`: Ball ejection strategies
//!
//! # Platform Boundary
//!
//! - [`CoilDriver`]: Pulse, hold and release one driver output
//! - [`SwitchPlatform`]: Bulk read of raw switch states
//! - [`Clock`]: Monotonic millisecond time source
//!
//! # Ejector Strategies
//!
//! Ball devices eject through the [`Ejector`] trait. The built-in
//! implementations live in [`crate::ejector`].

pub mod ejector;
pub mod hardware;

pub use ejector::*;
pub use hardware::*;
