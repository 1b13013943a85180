//! Error types for configuration, switch sequencing, coils, and ejectors.
//!
//! The taxonomy follows how each condition must be handled:
//!
//! | Error | Handling |
//! |-------|----------|
//! | [`ConfigError`] | Fatal at load time, names the device and field |
//! | [`SwitchError`] | Sequencing errors are programming bugs (see [`SwitchError::is_fatal`]) |
//! | [`CoilError`] | Platform driver failure, carries the coil name |
//! | [`EjectorError`] | Anything raised while a strategy drives hardware |
//!
//! Transient hardware anomalies (duplicate transitions, unknown switch
//! numbers, jams) are never errors; they are logged and handled in place.

use thiserror::Error;

/// Invalid or contradictory configuration.
///
/// Raised while building devices and strategies, before the machine runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ball device '{device}': {field}: {reason}")]
pub struct ConfigError {
    /// Name of the device whose config is invalid.
    pub device: String,
    /// Offending config field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ConfigError {
    /// Create a config error for `device`.`field`.
    pub fn new(device: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            field,
            reason: reason.into(),
        }
    }

    /// A required field was not set.
    pub fn missing(device: &str, field: &'static str) -> Self {
        Self::new(device, field, "required for this ejector but not configured")
    }

    /// A field was set that the chosen ejector does not support.
    pub fn incompatible(device: &str, field: &'static str, ejector: &str) -> Self {
        Self::new(device, field, format!("not supported by the {ejector} ejector"))
    }
}

/// Errors raised by the switch event engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    /// The engine has not completed its initial hardware read.
    #[error("cannot {operation} before the initial switch read has completed")]
    NotInitialised {
        /// Operation that was attempted too early.
        operation: &'static str,
    },

    /// No switch with this name is configured.
    #[error("unknown switch '{0}'")]
    UnknownSwitch(String),

    /// A switch id that was never issued by this engine.
    #[error("switch id {0} was never registered")]
    InvalidSwitchId(usize),

    /// The hardware read did not report a configured switch.
    #[error("switch '{name}' (number {number}) missing from hardware read")]
    MissingFromHardware {
        /// Switch name.
        name: String,
        /// Platform switch number.
        number: u32,
    },

    /// The platform failed to read switch states.
    #[error("switch platform error: {0}")]
    Platform(String),

    /// Two switches share a name or a platform number.
    #[error("duplicate switch '{0}'")]
    Duplicate(String),
}

impl SwitchError {
    /// Whether this error signals a programming or boot-ordering bug.
    ///
    /// Fatal errors should abort the machine; the rest may be reported and
    /// survived.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SwitchError::NotInitialised { .. }
                | SwitchError::InvalidSwitchId(_)
                | SwitchError::UnknownSwitch(_)
        )
    }
}

/// A platform coil driver call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("coil '{coil}': {message}")]
pub struct CoilError {
    /// Coil name.
    pub coil: String,
    /// Driver error, formatted.
    pub message: String,
}

/// Errors raised while an ejector strategy drives hardware.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EjectorError {
    /// Coil driver failure.
    #[error(transparent)]
    Coil(#[from] CoilError),

    /// Switch engine failure (usually a sequencing bug).
    #[error(transparent)]
    Switch(#[from] SwitchError),

    /// Operation needs config the strategy does not have.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Switch engine error.
    #[error(transparent)]
    Switch(#[from] SwitchError),

    /// Coil driver error.
    #[error(transparent)]
    Coil(#[from] CoilError),

    /// Ejector error.
    #[error(transparent)]
    Ejector(#[from] EjectorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_pinpoints_device_and_field() {
        let err = ConfigError::missing("bd_trough", "eject_coil");
        let text = err.to_string();
        assert!(text.contains("bd_trough"));
        assert!(text.contains("eject_coil"));
    }

    #[test]
    fn incompatible_names_the_ejector() {
        let err = ConfigError::incompatible("bd_lock", "eject_coil_enable_time", "pulse_coil");
        assert!(err.to_string().contains("pulse_coil"));
    }

    #[test]
    fn sequencing_errors_are_fatal() {
        assert!(SwitchError::NotInitialised { operation: "read" }.is_fatal());
        assert!(SwitchError::InvalidSwitchId(7).is_fatal());
        assert!(!SwitchError::Platform("timeout".into()).is_fatal());
    }

    #[test]
    fn ejector_error_wraps_coil_error() {
        let coil = CoilError {
            coil: "c_eject".into(),
            message: "bus fault".into(),
        };
        let err: EjectorError = coil.clone().into();
        assert_eq!(err, EjectorError::Coil(coil));
        let top: Error = err.into();
        assert!(top.to_string().contains("c_eject"));
    }
}
