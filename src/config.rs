//! Machine configuration: switches, coils, ball devices, and ball search.
//!
//! Uses `heapless::String` for names so a config can be cloned cheaply into
//! every component that needs it. All structs have sensible defaults and
//! `with_*` builders; with the `serde` feature they deserialize directly from
//! a machine config file (loading the file is the caller's job).
//!
//! # Example
//!
//! ```rust
//! use pinball_core::config::{BallDeviceConfig, EjectorKind, MachineConfig, SwitchConfig};
//!
//! let trough = BallDeviceConfig::new("bd_trough")
//!     .with_ejector(EjectorKind::PulseCoil)
//!     .with_eject_coil("c_trough_eject")
//!     .with_ball_switches(&["s_trough1", "s_trough2"])
//!     .with_tag("trough");
//!
//! let config = MachineConfig::default()
//!     .with_switch(SwitchConfig::new("s_trough1", 1))
//!     .with_switch(SwitchConfig::new("s_trough2", 2))
//!     .with_ball_device(trough);
//!
//! assert_eq!(config.ball_devices[0].ball_switches.len(), 2);
//! ```

use heapless::String as HString;

/// Maximum length for names (switches, coils, devices, events)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for name strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

fn short_strings(names: &[&str]) -> Vec<ShortString> {
    names.iter().map(|n| short_string(n)).collect()
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete machine configuration for the switch and ball handling core.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MachineConfig {
    /// Configured switches
    pub switches: Vec<SwitchConfig>,
    /// Configured coils
    pub coils: Vec<CoilConfig>,
    /// Configured ball devices
    pub ball_devices: Vec<BallDeviceConfig>,
    /// Playfield ball search settings
    pub ball_search: BallSearchConfig,
    /// Switches that count as playfield activity (confirm playfield ejects,
    /// reset the ball search timer)
    pub playfield_switches: Vec<ShortString>,
    /// Production mode silences development warnings (duplicate switch states)
    pub production: bool,
}

impl MachineConfig {
    /// Add a switch
    pub fn with_switch(mut self, switch: SwitchConfig) -> Self {
        self.switches.push(switch);
        self
    }

    /// Add a coil
    pub fn with_coil(mut self, coil: CoilConfig) -> Self {
        self.coils.push(coil);
        self
    }

    /// Add a ball device
    pub fn with_ball_device(mut self, device: BallDeviceConfig) -> Self {
        self.ball_devices.push(device);
        self
    }

    /// Set ball search configuration
    pub fn with_ball_search(mut self, ball_search: BallSearchConfig) -> Self {
        self.ball_search = ball_search;
        self
    }

    /// Set the playfield activity switches
    pub fn with_playfield_switches(mut self, switches: &[&str]) -> Self {
        self.playfield_switches = short_strings(switches);
        self
    }

    /// Enable or disable production mode
    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Look up a coil config by name
    pub fn coil(&self, name: &str) -> Option<&CoilConfig> {
        self.coils.iter().find(|c| c.name.as_str() == name)
    }
}

// ============================================================================
// Switch Config
// ============================================================================

/// One physical switch input
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SwitchConfig {
    /// Unique switch name
    pub name: ShortString,
    /// Platform switch number
    pub number: u32,
    /// Normally closed (NC) switch: physical and logical states are inverted
    pub invert: bool,
    /// Minimum time between trusted hardware transitions (platform debounce)
    pub recycle_ms: u32,
    /// Human-readable label (defaults to the name)
    pub label: ShortString,
    /// Platform identity reported to monitors
    pub platform: ShortString,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            name: ShortString::new(),
            number: 0,
            invert: false,
            recycle_ms: 0,
            label: ShortString::new(),
            platform: short_string("virtual"),
        }
    }
}

impl SwitchConfig {
    /// Normally open switch `name` at platform `number`
    pub fn new(name: &str, number: u32) -> Self {
        Self {
            name: short_string(name),
            number,
            ..Default::default()
        }
    }

    /// Set the NC/NO polarity
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Set the recycle window
    pub fn with_recycle_ms(mut self, ms: u32) -> Self {
        self.recycle_ms = ms;
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = short_string(label);
        self
    }

    /// Set the platform identity
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = short_string(platform);
        self
    }
}

// ============================================================================
// Coil Config
// ============================================================================

/// Base settings of one driver output.
///
/// Shared by every caller of the coil; callers change behavior per call with
/// an overlay instead of mutating this.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CoilConfig {
    /// Unique coil name
    pub name: ShortString,
    /// Default pulse length in milliseconds
    pub default_pulse_ms: u32,
    /// Default pulse power (0.0 to 1.0)
    pub default_pulse_power: f32,
    /// Default hold power (0.0 to 1.0)
    pub default_hold_power: f32,
    /// Minimum time between the end of one pulse and the next
    pub recycle_ms: u32,
}

impl Default for CoilConfig {
    fn default() -> Self {
        Self {
            name: ShortString::new(),
            default_pulse_ms: 10,
            default_pulse_power: 1.0,
            default_hold_power: 1.0,
            recycle_ms: 0,
        }
    }
}

impl CoilConfig {
    /// Coil `name` with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            ..Default::default()
        }
    }

    /// Set the default pulse length
    pub fn with_default_pulse_ms(mut self, ms: u32) -> Self {
        self.default_pulse_ms = ms;
        self
    }

    /// Set the default pulse power
    pub fn with_default_pulse_power(mut self, power: f32) -> Self {
        self.default_pulse_power = power.clamp(0.0, 1.0);
        self
    }

    /// Set the default hold power
    pub fn with_default_hold_power(mut self, power: f32) -> Self {
        self.default_hold_power = power.clamp(0.0, 1.0);
        self
    }

    /// Set the recycle window
    pub fn with_recycle_ms(mut self, ms: u32) -> Self {
        self.recycle_ms = ms;
        self
    }
}

// ============================================================================
// Ball Device Config
// ============================================================================

/// Which ejector strategy a ball device drives its hardware with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EjectorKind {
    /// Timed pulse on the eject coil, escalating on retries
    #[default]
    PulseCoil,
    /// Coil held on while balls are present, released to eject
    HoldCoil,
    /// Coil enabled for a fixed window
    EnableCoil,
    /// No actuator; posts events for something else to act on
    EventOnly,
}

impl EjectorKind {
    /// Config name of the ejector kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            EjectorKind::PulseCoil => "pulse_coil",
            EjectorKind::HoldCoil => "hold_coil",
            EjectorKind::EnableCoil => "enable_coil",
            EjectorKind::EventOnly => "event_only",
        }
    }
}

/// Ball device configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BallDeviceConfig {
    /// Unique device name
    pub name: ShortString,
    /// Ejector strategy
    pub ejector: EjectorKind,
    /// Coil fired to eject
    pub eject_coil: Option<ShortString>,
    /// Reduced pulse used to clear a jammed ball on early tries
    pub eject_coil_jam_pulse: Option<u32>,
    /// Elevated pulse used once retries exceed the threshold
    pub eject_coil_retry_pulse: Option<u32>,
    /// Pulse used to reposition balls without ejecting
    pub eject_coil_reorder_pulse: Option<u32>,
    /// Maximum time a pulse may be delayed waiting for the coil to recycle
    pub eject_coil_max_wait_ms: Option<u32>,
    /// Tries at default strength before switching to the retry pulse
    pub retries_before_increasing_pulse: u32,
    /// Enable window of an enable-coil ejector
    pub eject_coil_enable_time: Option<u32>,
    /// Coil held on to keep balls in the device
    pub hold_coil: Option<ShortString>,
    /// How long the hold coil is released to let one ball out
    pub hold_coil_release_time: Option<u32>,
    /// Switches that enable the hold coil when active
    pub hold_switches: Vec<ShortString>,
    /// Switches that count balls in the device
    pub ball_switches: Vec<ShortString>,
    /// Switch covering the exit when a ball is stuck
    pub jam_switch: Option<ShortString>,
    /// Switch hit by a ball after it left the device
    pub confirm_eject_switch: Option<ShortString>,
    /// How long a ball switch must be active to count a ball
    pub entrance_count_delay_ms: u32,
    /// How long a ball switch must be inactive to count a ball as gone
    pub exit_count_delay_ms: u32,
    /// How long to wait for a ball to leave before retrying
    pub eject_timeout_ms: u32,
    /// How long to wait for the target to confirm before the ball is missing
    pub ball_missing_timeout_ms: u32,
    /// Attempts before giving up on an eject (0 = unlimited)
    pub max_eject_attempts: u32,
    /// Device tags (`trough` excludes the device from phase 2/3 search)
    pub tags: Vec<ShortString>,
    /// Position in the ball search sequence (lower runs first)
    pub ball_search_order: u32,
    /// Default eject target
    pub eject_target: ShortString,
    /// Where unexpected balls come from
    pub captures_from: ShortString,
}

impl Default for BallDeviceConfig {
    fn default() -> Self {
        Self {
            name: ShortString::new(),
            ejector: EjectorKind::PulseCoil,
            eject_coil: None,
            eject_coil_jam_pulse: None,
            eject_coil_retry_pulse: None,
            eject_coil_reorder_pulse: None,
            eject_coil_max_wait_ms: None,
            retries_before_increasing_pulse: 4,
            eject_coil_enable_time: None,
            hold_coil: None,
            hold_coil_release_time: None,
            hold_switches: Vec::new(),
            ball_switches: Vec::new(),
            jam_switch: None,
            confirm_eject_switch: None,
            entrance_count_delay_ms: 500,
            exit_count_delay_ms: 500,
            eject_timeout_ms: 10_000,
            ball_missing_timeout_ms: 20_000,
            max_eject_attempts: 0,
            tags: Vec::new(),
            ball_search_order: 200,
            eject_target: short_string("playfield"),
            captures_from: short_string("playfield"),
        }
    }
}

impl BallDeviceConfig {
    /// Device `name` with default settings
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            ..Default::default()
        }
    }

    /// Set the ejector strategy
    pub fn with_ejector(mut self, ejector: EjectorKind) -> Self {
        self.ejector = ejector;
        self
    }

    /// Set the eject coil
    pub fn with_eject_coil(mut self, coil: &str) -> Self {
        self.eject_coil = Some(short_string(coil));
        self
    }

    /// Set the jam pulse
    pub fn with_jam_pulse(mut self, ms: u32) -> Self {
        self.eject_coil_jam_pulse = Some(ms);
        self
    }

    /// Set the retry pulse and the number of tries before it is used
    pub fn with_retry_pulse(mut self, ms: u32, retries_before_increasing_pulse: u32) -> Self {
        self.eject_coil_retry_pulse = Some(ms);
        self.retries_before_increasing_pulse = retries_before_increasing_pulse;
        self
    }

    /// Set the reorder pulse
    pub fn with_reorder_pulse(mut self, ms: u32) -> Self {
        self.eject_coil_reorder_pulse = Some(ms);
        self
    }

    /// Set the maximum pulse wait
    pub fn with_max_wait_ms(mut self, ms: u32) -> Self {
        self.eject_coil_max_wait_ms = Some(ms);
        self
    }

    /// Set the enable window
    pub fn with_enable_time(mut self, ms: u32) -> Self {
        self.eject_coil_enable_time = Some(ms);
        self
    }

    /// Set the hold coil and its hold switches
    pub fn with_hold_coil(mut self, coil: &str, hold_switches: &[&str]) -> Self {
        self.hold_coil = Some(short_string(coil));
        self.hold_switches = short_strings(hold_switches);
        self
    }

    /// Set the hold release window
    pub fn with_release_time(mut self, ms: u32) -> Self {
        self.hold_coil_release_time = Some(ms);
        self
    }

    /// Set the ball switches
    pub fn with_ball_switches(mut self, switches: &[&str]) -> Self {
        self.ball_switches = short_strings(switches);
        self
    }

    /// Set the jam switch
    pub fn with_jam_switch(mut self, switch: &str) -> Self {
        self.jam_switch = Some(short_string(switch));
        self
    }

    /// Set the eject confirmation switch
    pub fn with_confirm_switch(mut self, switch: &str) -> Self {
        self.confirm_eject_switch = Some(short_string(switch));
        self
    }

    /// Set entrance and exit count delays
    pub fn with_count_delays(mut self, entrance_ms: u32, exit_ms: u32) -> Self {
        self.entrance_count_delay_ms = entrance_ms;
        self.exit_count_delay_ms = exit_ms;
        self
    }

    /// Set eject and ball missing timeouts
    pub fn with_timeouts(mut self, eject_ms: u32, ball_missing_ms: u32) -> Self {
        self.eject_timeout_ms = eject_ms;
        self.ball_missing_timeout_ms = ball_missing_ms;
        self
    }

    /// Set the maximum eject attempts
    pub fn with_max_eject_attempts(mut self, attempts: u32) -> Self {
        self.max_eject_attempts = attempts;
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(short_string(tag));
        self
    }

    /// Set the ball search order
    pub fn with_ball_search_order(mut self, order: u32) -> Self {
        self.ball_search_order = order;
        self
    }

    /// Set the eject target
    pub fn with_eject_target(mut self, target: &str) -> Self {
        self.eject_target = short_string(target);
        self
    }

    /// Set where unexpected balls come from
    pub fn with_captures_from(mut self, source: &str) -> Self {
        self.captures_from = short_string(source);
        self
    }

    /// Check for a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.as_str() == tag)
    }

    /// Whether this device is a trough
    pub fn is_trough(&self) -> bool {
        self.has_tag("trough")
    }
}

// ============================================================================
// Ball Search Config
// ============================================================================

/// Playfield ball search configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BallSearchConfig {
    /// Whether ball search may run at all
    pub enabled: bool,
    /// Playfield inactivity before a search starts
    pub timeout_ms: u32,
    /// Delay after a device acted before trying the next one
    pub interval_ms: u32,
    /// Delay after a full pass over all devices
    pub wait_after_iteration_ms: u32,
    /// Iterations of phase 1 (idle, empty devices)
    pub phase_1_searches: u32,
    /// Iterations of phase 2 (light nudge)
    pub phase_2_searches: u32,
    /// Iterations of phase 3 (full nudge)
    pub phase_3_searches: u32,
}

impl Default for BallSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 15_000,
            interval_ms: 150,
            wait_after_iteration_ms: 5_000,
            phase_1_searches: 3,
            phase_2_searches: 3,
            phase_3_searches: 4,
        }
    }
}

impl BallSearchConfig {
    /// Enable or disable ball search
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the inactivity timeout
    pub fn with_timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the per-device and per-iteration delays
    pub fn with_intervals(mut self, interval_ms: u32, wait_after_iteration_ms: u32) -> Self {
        self.interval_ms = interval_ms;
        self.wait_after_iteration_ms = wait_after_iteration_ms;
        self
    }

    /// Set the number of iterations per phase
    pub fn with_searches(mut self, phase_1: u32, phase_2: u32, phase_3: u32) -> Self {
        self.phase_1_searches = phase_1;
        self.phase_2_searches = phase_2;
        self.phase_3_searches = phase_3;
        self
    }

    /// Iterations configured for `phase` (1-3)
    pub fn searches(&self, phase: u8) -> u32 {
        match phase {
            1 => self.phase_1_searches,
            2 => self.phase_2_searches,
            3 => self.phase_3_searches,
            _ => 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ball_device_defaults() {
        let device = BallDeviceConfig::new("bd_trough");
        assert_eq!(device.name.as_str(), "bd_trough");
        assert_eq!(device.ejector, EjectorKind::PulseCoil);
        assert_eq!(device.retries_before_increasing_pulse, 4);
        assert_eq!(device.entrance_count_delay_ms, 500);
        assert_eq!(device.exit_count_delay_ms, 500);
        assert_eq!(device.eject_timeout_ms, 10_000);
        assert_eq!(device.ball_search_order, 200);
        assert_eq!(device.eject_target.as_str(), "playfield");
        assert!(device.eject_coil_jam_pulse.is_none());
        assert!(!device.is_trough());
    }

    #[test]
    fn ball_device_builder() {
        let device = BallDeviceConfig::new("bd_plunger")
            .with_eject_coil("c_plunger")
            .with_jam_pulse(5)
            .with_retry_pulse(15, 3)
            .with_reorder_pulse(8)
            .with_jam_switch("s_plunger_jam")
            .with_tag("trough");

        assert_eq!(device.eject_coil.as_deref(), Some("c_plunger"));
        assert_eq!(device.eject_coil_jam_pulse, Some(5));
        assert_eq!(device.eject_coil_retry_pulse, Some(15));
        assert_eq!(device.retries_before_increasing_pulse, 3);
        assert_eq!(device.eject_coil_reorder_pulse, Some(8));
        assert_eq!(device.jam_switch.as_deref(), Some("s_plunger_jam"));
        assert!(device.is_trough());
    }

    #[test]
    fn hold_coil_builder_sets_switches() {
        let device = BallDeviceConfig::new("bd_lock").with_hold_coil("c_hold", &["s_lock1", "s_lock2"]);
        assert_eq!(device.hold_coil.as_deref(), Some("c_hold"));
        assert_eq!(device.hold_switches.len(), 2);
    }

    #[test]
    fn switch_config_builder() {
        let switch = SwitchConfig::new("s_shooter", 17)
            .with_invert(true)
            .with_label("Shooter Lane")
            .with_platform("fast");

        assert_eq!(switch.number, 17);
        assert!(switch.invert);
        assert_eq!(switch.label.as_str(), "Shooter Lane");
        assert_eq!(switch.platform.as_str(), "fast");
    }

    #[test]
    fn coil_config_clamps_power() {
        let coil = CoilConfig::new("c_eject")
            .with_default_pulse_power(3.0)
            .with_default_hold_power(-1.0);
        assert_eq!(coil.default_pulse_power, 1.0);
        assert_eq!(coil.default_hold_power, 0.0);
    }

    #[test]
    fn ball_search_searches_per_phase() {
        let search = BallSearchConfig::default().with_searches(1, 2, 3);
        assert_eq!(search.searches(1), 1);
        assert_eq!(search.searches(2), 2);
        assert_eq!(search.searches(3), 3);
        assert_eq!(search.searches(4), 0);
    }

    #[test]
    fn machine_config_coil_lookup() {
        let config = MachineConfig::default().with_coil(CoilConfig::new("c_eject").with_default_pulse_ms(20));
        assert_eq!(config.coil("c_eject").map(|c| c.default_pulse_ms), Some(20));
        assert!(config.coil("c_missing").is_none());
    }

    #[test]
    fn ejector_kind_names() {
        assert_eq!(EjectorKind::PulseCoil.as_str(), "pulse_coil");
        assert_eq!(EjectorKind::HoldCoil.as_str(), "hold_coil");
        assert_eq!(EjectorKind::EnableCoil.as_str(), "enable_coil");
        assert_eq!(EjectorKind::EventOnly.as_str(), "event_only");
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_utf8_boundary() {
        let input = "\u{1F3B1}".repeat(20); // 4 bytes each
        let s = short_string(&input);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn ball_device_from_json() {
        let json = r#"{
            "name": "bd_plunger",
            "ejector": "pulse_coil",
            "eject_coil": "c_plunger",
            "eject_coil_jam_pulse": 5,
            "eject_coil_retry_pulse": 15,
            "retries_before_increasing_pulse": 3,
            "ball_switches": ["s_plunger"]
        }"#;
        let device: BallDeviceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(device.name.as_str(), "bd_plunger");
        assert_eq!(device.eject_coil_jam_pulse, Some(5));
        assert_eq!(device.retries_before_increasing_pulse, 3);
        assert_eq!(device.exit_count_delay_ms, 500);
        assert_eq!(device.ball_switches[0].as_str(), "s_plunger");
    }
}
