//! Logical representation of one physical switch input.
//!
//! A [`Switch`] is created once from its [`SwitchConfig`] and afterwards only
//! mutated by the [`SwitchEngine`](crate::switch_engine::SwitchEngine).
//! The logical state always equals the hardware state XOR the NC flag.

use crate::config::{ShortString, SwitchConfig};

/// Stable index of a switch inside its engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwitchId(pub(crate) usize);

impl SwitchId {
    /// Index of the switch in configuration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Logical switch state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SwitchState {
    /// Not activated (0).
    #[default]
    Inactive,
    /// Activated (1).
    Active,
}

impl SwitchState {
    /// State from a raw value; anything non-zero is active.
    pub fn from_raw(raw: u8) -> Self {
        Self::from(raw != 0)
    }

    /// Numeric value (0 or 1).
    pub const fn as_u8(&self) -> u8 {
        match self {
            SwitchState::Inactive => 0,
            SwitchState::Active => 1,
        }
    }

    /// Whether this is [`Active`](Self::Active).
    pub const fn is_active(&self) -> bool {
        matches!(self, SwitchState::Active)
    }

    /// The other state.
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            SwitchState::Inactive => SwitchState::Active,
            SwitchState::Active => SwitchState::Inactive,
        }
    }

    /// Flip the state when `invert` is set.
    #[must_use]
    pub const fn xor(&self, invert: bool) -> Self {
        if invert {
            self.opposite()
        } else {
            *self
        }
    }

    pub(crate) const fn slot(&self) -> usize {
        self.as_u8() as usize
    }
}

impl From<bool> for SwitchState {
    fn from(active: bool) -> Self {
        if active {
            SwitchState::Active
        } else {
            SwitchState::Inactive
        }
    }
}

/// One configured switch.
#[derive(Clone, Debug)]
pub struct Switch {
    /// Unique name.
    pub name: ShortString,
    /// Label reported to monitors.
    pub label: ShortString,
    /// Platform identity reported to monitors.
    pub platform: ShortString,
    /// Platform switch number.
    pub number: u32,
    /// Normally closed switch.
    pub invert: bool,
    /// Platform debounce window.
    pub recycle_ms: u32,
    pub(crate) state: SwitchState,
    pub(crate) hw_state: SwitchState,
    pub(crate) last_change: Option<u64>,
}

impl Switch {
    /// Create an inactive switch from config.
    pub fn from_config(config: &SwitchConfig) -> Self {
        let label = if config.label.is_empty() {
            config.name.clone()
        } else {
            config.label.clone()
        };
        Self {
            name: config.name.clone(),
            label,
            platform: config.platform.clone(),
            number: config.number,
            invert: config.invert,
            recycle_ms: config.recycle_ms,
            state: SwitchState::Inactive,
            hw_state: SwitchState::Inactive.xor(config.invert),
            last_change: None,
        }
    }

    /// Logical state (after polarity).
    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Raw hardware state (before polarity).
    pub fn hw_state(&self) -> SwitchState {
        self.hw_state
    }

    /// Time of the last accepted transition.
    ///
    /// `None` means the switch has been in its state since power-on.
    pub fn last_change(&self) -> Option<u64> {
        self.last_change
    }

    /// Milliseconds in the current state, `u64::MAX` if since power-on.
    pub fn ms_since_change(&self, now_ms: u64) -> u64 {
        match self.last_change {
            Some(t) => now_ms.saturating_sub(t),
            None => u64::MAX,
        }
    }

    /// Set the logical state, keeping the hardware state consistent.
    pub(crate) fn set_logical(&mut self, state: SwitchState, last_change: Option<u64>) {
        self.state = state;
        self.hw_state = state.xor(self.invert);
        self.last_change = last_change;
    }
}
