//! Switch event engine: turns raw hardware transitions into logical events.
//!
//! The engine owns every [`Switch`] and every registered handler. It is the
//! only place where switch state changes, and it runs each transition to
//! completion before the next one is looked at.
//!
//! # Processing a transition
//!
//! 1. Normalise the raw value to 0/1 and apply NC polarity (hardware
//!    deliveries are physical, software sources may be logical).
//! 2. Drop duplicates: a transition into the state the switch is already in
//!    fires nothing and leaves `last_change` alone.
//! 3. Store the new state and timestamp and forget every pending timed
//!    firing of the switch.
//! 4. Fire immediate handlers for the new state in registration order and
//!    schedule timed handlers at `last_change + hold_ms`.
//! 5. Notify monitors.
//!
//! # Timed handlers
//!
//! Each switch has at most one outstanding delayed callback, aimed at its
//! earliest pending firing. The runner calls [`SwitchEngine::update`] with
//! the current time; [`SwitchEngine::next_deadline`] says when that is
//! next needed.
//!
//! # Example
//!
//! ```rust
//! use pinball_core::config::SwitchConfig;
//! use pinball_core::hal::MockSwitchPlatform;
//! use pinball_core::switch::SwitchState;
//! use pinball_core::switch_engine::SwitchEngine;
//! use pinball_core::wait::SwitchInbox;
//!
//! let mut engine = SwitchEngine::new(false);
//! let trough = engine.add_switch(&SwitchConfig::new("s_trough1", 1)).unwrap();
//! engine.initialize(&mut MockSwitchPlatform::new().with_switch(1, false), 0).unwrap();
//!
//! // Fire once the switch has been active for a full second
//! let inbox = SwitchInbox::new();
//! engine.register(trough, SwitchState::Active, 1000, inbox.callback(), 0).unwrap();
//!
//! engine.process_transition(trough, 1, false, 0).unwrap();
//! engine.update(999);
//! assert!(inbox.is_empty());
//! engine.update(1000);
//! assert_eq!(inbox.drain().len(), 1);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::config::SwitchConfig;
use crate::error::SwitchError;
use crate::switch::{Switch, SwitchId, SwitchState};
use crate::traits::SwitchPlatform;
use crate::wait::{SwitchCallback, SwitchHit, SwitchWait, WaitId, WaitSlot};

/// Returned by [`SwitchEngine::register`]; pass it back to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerHandle {
    switch: SwitchId,
    state: SwitchState,
    id: u64,
}

impl HandlerHandle {
    /// Switch the handler watches.
    pub fn switch(&self) -> SwitchId {
        self.switch
    }

    /// State the handler fires on.
    pub fn state(&self) -> SwitchState {
        self.state
    }
}

/// Identity of a monitor callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MonitorId(u64);

/// Record passed to monitors on every accepted transition.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MonitoredSwitchChange {
    /// Switch name, or the number for unconfigured switches.
    pub name: String,
    /// Switch label, or `<platform>-<number>` for unconfigured switches.
    pub label: String,
    /// Platform identity.
    pub platform: String,
    /// Platform switch number.
    pub number: u32,
    /// New logical state.
    pub state: SwitchState,
}

/// Passive observer of switch changes.
pub type SwitchMonitor = Box<dyn FnMut(&MonitoredSwitchChange)>;

/// Target state of a wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitState {
    /// Wait for inactive.
    Inactive,
    /// Wait for active.
    Active,
    /// Wait for the opposite of each switch's state at registration time.
    Opposite,
}

impl From<SwitchState> for WaitState {
    fn from(state: SwitchState) -> Self {
        match state {
            SwitchState::Inactive => WaitState::Inactive,
            SwitchState::Active => WaitState::Active,
        }
    }
}

enum HandlerAction {
    Call(SwitchCallback),
    Wait(WaitId),
}

struct RegisteredHandler {
    switch: SwitchId,
    state: SwitchState,
    hold_ms: u32,
    action: HandlerAction,
}

struct SwitchSlot {
    switch: Switch,
    // Handler ids per state, in registration order
    handlers: [Vec<u64>; 2],
    // Fire time -> handler ids due then
    pending: BTreeMap<u64, Vec<u64>>,
    // The one outstanding delayed callback
    armed_at: Option<u64>,
}

struct WaitEntry {
    slot: Rc<RefCell<WaitSlot>>,
    handlers: Vec<HandlerHandle>,
}

/// Tracks all switches and dispatches their changes.
///
/// A handler is live while it is present in the registry; unregistering
/// removes it everywhere, so an already-scheduled timed firing finds nothing
/// to run when its time comes.
pub struct SwitchEngine {
    switches: Vec<SwitchSlot>,
    by_name: BTreeMap<String, SwitchId>,
    by_number: BTreeMap<(String, u32), SwitchId>,
    handlers: BTreeMap<u64, RegisteredHandler>,
    waits: BTreeMap<WaitId, WaitEntry>,
    monitors: Vec<(MonitorId, SwitchMonitor)>,
    next_id: u64,
    initialised: bool,
    production: bool,
}

impl fmt::Debug for SwitchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchEngine")
            .field("switches", &self.switches.len())
            .field("handlers", &self.handlers.len())
            .field("waits", &self.waits.len())
            .field("monitors", &self.monitors.len())
            .field("initialised", &self.initialised)
            .finish()
    }
}

impl SwitchEngine {
    /// Create an empty engine.
    ///
    /// In production mode duplicate transitions are dropped silently.
    pub fn new(production: bool) -> Self {
        Self {
            switches: Vec::new(),
            by_name: BTreeMap::new(),
            by_number: BTreeMap::new(),
            handlers: BTreeMap::new(),
            waits: BTreeMap::new(),
            monitors: Vec::new(),
            next_id: 1,
            initialised: false,
            production,
        }
    }

    // ------------------------------------------------------------------
    // Switch table
    // ------------------------------------------------------------------

    /// Add a configured switch. Switches start inactive until initialised.
    pub fn add_switch(&mut self, config: &SwitchConfig) -> Result<SwitchId, SwitchError> {
        let name = config.name.as_str().to_owned();
        let number_key = (config.platform.as_str().to_owned(), config.number);
        if self.by_name.contains_key(&name) || self.by_number.contains_key(&number_key) {
            return Err(SwitchError::Duplicate(name));
        }

        let id = SwitchId(self.switches.len());
        self.switches.push(SwitchSlot {
            switch: Switch::from_config(config),
            handlers: [Vec::new(), Vec::new()],
            pending: BTreeMap::new(),
            armed_at: None,
        });
        self.by_name.insert(name, id);
        self.by_number.insert(number_key, id);
        Ok(id)
    }

    /// Look up a switch by name.
    pub fn switch_id(&self, name: &str) -> Result<SwitchId, SwitchError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SwitchError::UnknownSwitch(name.into()))
    }

    /// Look up a switch by platform and number.
    pub fn switch_by_number(&self, platform: &str, number: u32) -> Option<SwitchId> {
        self.by_number.get(&(platform.to_owned(), number)).copied()
    }

    /// Borrow a switch.
    pub fn switch(&self, id: SwitchId) -> Result<&Switch, SwitchError> {
        self.switches
            .get(id.0)
            .map(|slot| &slot.switch)
            .ok_or(SwitchError::InvalidSwitchId(id.0))
    }

    /// All switches in configuration order.
    pub fn switches(&self) -> impl Iterator<Item = (SwitchId, &Switch)> {
        self.switches
            .iter()
            .enumerate()
            .map(|(i, slot)| (SwitchId(i), &slot.switch))
    }

    /// Whether the initial hardware read has completed.
    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    fn slot(&self, id: SwitchId) -> Result<&SwitchSlot, SwitchError> {
        self.switches
            .get(id.0)
            .ok_or(SwitchError::InvalidSwitchId(id.0))
    }

    fn slot_mut(&mut self, id: SwitchId) -> Result<&mut SwitchSlot, SwitchError> {
        self.switches
            .get_mut(id.0)
            .ok_or(SwitchError::InvalidSwitchId(id.0))
    }

    // ------------------------------------------------------------------
    // Hardware synchronisation
    // ------------------------------------------------------------------

    /// Read every switch from hardware and start accepting transitions.
    ///
    /// States read here count as "since power-on": timed handlers do not
    /// fire for them.
    pub fn initialize<P: SwitchPlatform>(
        &mut self,
        platform: &mut P,
        now_ms: u64,
    ) -> Result<(), SwitchError> {
        self.read_from_hardware(platform)?;
        self.initialised = true;
        debug!(now_ms, switches = self.switches.len(), "switch engine initialised");
        self.log_active_switches();
        Ok(())
    }

    fn read_from_hardware<P: SwitchPlatform>(
        &mut self,
        platform: &mut P,
    ) -> Result<(), SwitchError> {
        let states = platform
            .read_switch_states()
            .map_err(|e| SwitchError::Platform(format!("{e:?}")))?;

        for slot in &mut self.switches {
            let closed = states.get(&slot.switch.number).copied().ok_or_else(|| {
                SwitchError::MissingFromHardware {
                    name: slot.switch.name.as_str().into(),
                    number: slot.switch.number,
                }
            })?;
            let state = SwitchState::from(closed).xor(slot.switch.invert);
            slot.switch.set_logical(state, None);
        }
        Ok(())
    }

    /// Re-read hardware and warn about every switch whose state drifted.
    ///
    /// Returns `true` if everything matched. The stored states are replaced
    /// by the hardware read without firing handlers.
    pub fn verify_switches<P: SwitchPlatform>(
        &mut self,
        platform: &mut P,
    ) -> Result<bool, SwitchError> {
        let before: Vec<SwitchState> = self.switches.iter().map(|s| s.switch.state).collect();
        let changed: Vec<Option<u64>> = self.switches.iter().map(|s| s.switch.last_change).collect();
        self.read_from_hardware(platform)?;

        let mut ok = true;
        for ((slot, old), last_change) in self.switches.iter_mut().zip(before).zip(changed) {
            if slot.switch.state != old {
                ok = false;
                warn!(
                    switch = %slot.switch.name,
                    hw_state = slot.switch.state.as_u8(),
                    tracked_state = old.as_u8(),
                    "switch state error"
                );
            } else {
                slot.switch.last_change = last_change;
            }
        }
        Ok(ok)
    }

    /// Force the logical state of a switch without firing anything.
    ///
    /// Used by virtual platforms to seed states. With `reset_time` the
    /// switch counts as being in this state since power-on.
    pub fn set_state(
        &mut self,
        id: SwitchId,
        state: SwitchState,
        reset_time: bool,
        now_ms: u64,
    ) -> Result<(), SwitchError> {
        let last_change = if reset_time { None } else { Some(now_ms) };
        self.slot_mut(id)?.switch.set_logical(state, last_change);
        Ok(())
    }

    /// Log every active switch at info level.
    pub fn log_active_switches(&self) {
        for slot in self.switches.iter().filter(|s| s.switch.state.is_active()) {
            info!(switch = %slot.switch.name, number = slot.switch.number, "found active switch");
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether the switch is in `state` and has been for at least `hold_ms`.
    pub fn is_state(
        &self,
        id: SwitchId,
        state: SwitchState,
        hold_ms: u32,
        now_ms: u64,
    ) -> Result<bool, SwitchError> {
        if !self.initialised {
            return Err(SwitchError::NotInitialised {
                operation: "read switch state",
            });
        }
        let switch = &self.slot(id)?.switch;
        Ok(switch.state == state && switch.ms_since_change(now_ms) >= u64::from(hold_ms))
    }

    /// Whether the switch is active (for at least `hold_ms`).
    pub fn is_active(&self, id: SwitchId, hold_ms: u32, now_ms: u64) -> Result<bool, SwitchError> {
        self.is_state(id, SwitchState::Active, hold_ms, now_ms)
    }

    /// Whether the switch is inactive (for at least `hold_ms`).
    pub fn is_inactive(
        &self,
        id: SwitchId,
        hold_ms: u32,
        now_ms: u64,
    ) -> Result<bool, SwitchError> {
        self.is_state(id, SwitchState::Inactive, hold_ms, now_ms)
    }

    /// Milliseconds since the last accepted transition.
    pub fn ms_since_change(&self, id: SwitchId, now_ms: u64) -> Result<u64, SwitchError> {
        Ok(self.slot(id)?.switch.ms_since_change(now_ms))
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Call `callback` when the switch enters `state` and stays for `hold_ms`.
    ///
    /// With `hold_ms == 0` the callback runs during the transition. If the
    /// switch is already in `state` but not yet for `hold_ms`, the firing is
    /// scheduled from the time the switch changed, not from now.
    pub fn register(
        &mut self,
        switch: SwitchId,
        state: SwitchState,
        hold_ms: u32,
        callback: SwitchCallback,
        now_ms: u64,
    ) -> Result<HandlerHandle, SwitchError> {
        self.register_action(switch, state, hold_ms, HandlerAction::Call(callback), now_ms)
    }

    fn register_action(
        &mut self,
        switch: SwitchId,
        state: SwitchState,
        hold_ms: u32,
        action: HandlerAction,
        now_ms: u64,
    ) -> Result<HandlerHandle, SwitchError> {
        if hold_ms > 0 && !self.initialised {
            return Err(SwitchError::NotInitialised {
                operation: "register a timed switch handler",
            });
        }
        let id = self.next_id;
        let slot = self.slot_mut(switch)?;
        slot.handlers[state.slot()].push(id);

        let mut catch_up = None;
        if hold_ms > 0 && slot.switch.state == state {
            if let Some(changed_at) = slot.switch.last_change {
                if now_ms.saturating_sub(changed_at) < u64::from(hold_ms) {
                    catch_up = Some(changed_at + u64::from(hold_ms));
                }
            }
        }
        debug!(
            switch = %slot.switch.name,
            state = state.as_u8(),
            hold_ms,
            "registering switch handler"
        );

        self.next_id += 1;
        self.handlers.insert(
            id,
            RegisteredHandler {
                switch,
                state,
                hold_ms,
                action,
            },
        );
        if let Some(due) = catch_up {
            self.add_pending(switch, due, id);
        }

        Ok(HandlerHandle { switch, state, id })
    }

    /// Remove a handler. Removing it twice is a no-op.
    ///
    /// A pending timed firing for the handler will not run.
    pub fn unregister(&mut self, handle: HandlerHandle) -> Result<(), SwitchError> {
        let slot = self.slot_mut(handle.switch)?;
        slot.handlers[handle.state.slot()].retain(|id| *id != handle.id);
        slot.pending.retain(|_, ids| {
            ids.retain(|id| *id != handle.id);
            !ids.is_empty()
        });
        if self.handlers.remove(&handle.id).is_some() {
            debug!(switch = handle.switch.0, handler = handle.id, "removed switch handler");
        }
        Ok(())
    }

    /// Number of live handlers on a switch for a state.
    pub fn handler_count(&self, id: SwitchId, state: SwitchState) -> Result<usize, SwitchError> {
        Ok(self.slot(id)?.handlers[state.slot()].len())
    }

    fn add_pending(&mut self, switch: SwitchId, due: u64, id: u64) {
        let Some(slot) = self.switches.get_mut(switch.0) else {
            return;
        };
        slot.pending.entry(due).or_default().push(id);
        match slot.armed_at {
            Some(armed) if armed <= due => {}
            Some(armed) => {
                debug!(switch = %slot.switch.name, from = armed, to = due, "rescheduling timed switch check");
                slot.armed_at = Some(due);
            }
            None => slot.armed_at = Some(due),
        }
    }

    fn fire(&mut self, id: u64) {
        let Some(handler) = self.handlers.get_mut(&id) else {
            // unregistered since it was scheduled
            return;
        };
        let Some(slot) = self.switches.get(handler.switch.0) else {
            return;
        };
        let hit = SwitchHit {
            switch: handler.switch,
            name: slot.switch.name.clone(),
            state: handler.state,
            hold_ms: handler.hold_ms,
        };
        let wait = match &mut handler.action {
            HandlerAction::Call(callback) => {
                callback(&hit);
                None
            }
            HandlerAction::Wait(wait) => Some(*wait),
        };
        if let Some(wait) = wait {
            self.resolve_wait(wait, hit);
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Process a transition reported for a configured switch.
    ///
    /// `logical` says whether `raw_state` is already logical (keyboard,
    /// virtual sources) or physical (hardware).
    pub fn process_transition(
        &mut self,
        id: SwitchId,
        raw_state: u8,
        logical: bool,
        timestamp_ms: u64,
    ) -> Result<(), SwitchError> {
        if !self.initialised {
            return Err(SwitchError::NotInitialised {
                operation: "process a switch transition",
            });
        }
        let production = self.production;
        let slot = self.slot_mut(id)?;

        let mut state = SwitchState::from_raw(raw_state);
        let mut hw_state = state;
        if slot.switch.invert {
            if logical {
                hw_state = hw_state.opposite();
            } else {
                state = state.opposite();
            }
        }

        if slot.switch.state == state {
            if !production {
                warn!(
                    switch = %slot.switch.name,
                    state = state.as_u8(),
                    "received duplicate switch state from the platform interface"
                );
            }
            return Ok(());
        }

        slot.switch.hw_state = hw_state;
        slot.switch.state = state;
        slot.switch.last_change = Some(timestamp_ms);
        if state.is_active() {
            info!("<<<<<<< '{}' active >>>>>>>", slot.switch.name);
        } else {
            info!("<<<<<<< '{}' inactive >>>>>>>", slot.switch.name);
        }

        // timed firings belong to the previous state
        slot.pending.clear();
        slot.armed_at = None;

        let change = MonitoredSwitchChange {
            name: slot.switch.name.as_str().into(),
            label: slot.switch.label.as_str().into(),
            platform: slot.switch.platform.as_str().into(),
            number: slot.switch.number,
            state,
        };

        self.call_handlers(id, state, timestamp_ms);
        self.notify_monitors(&change);
        Ok(())
    }

    /// Process a transition by platform number.
    ///
    /// A number no configured switch uses is not an error: the change is
    /// passed to monitors only.
    pub fn process_by_number(
        &mut self,
        platform: &str,
        number: u32,
        raw_state: u8,
        logical: bool,
        timestamp_ms: u64,
    ) -> Result<(), SwitchError> {
        if !self.initialised {
            return Err(SwitchError::NotInitialised {
                operation: "process a switch transition",
            });
        }
        if let Some(id) = self.switch_by_number(platform, number) {
            return self.process_transition(id, raw_state, logical, timestamp_ms);
        }

        debug!(platform, number, raw_state, "unknown switch change");
        let change = MonitoredSwitchChange {
            name: number.to_string(),
            label: format!("{platform}-{number}"),
            platform: platform.into(),
            number,
            state: SwitchState::from_raw(raw_state),
        };
        self.notify_monitors(&change);
        Ok(())
    }

    /// Process a transition for a switch by name.
    pub fn process_named(
        &mut self,
        name: &str,
        raw_state: u8,
        logical: bool,
        timestamp_ms: u64,
    ) -> Result<(), SwitchError> {
        let id = self.switch_id(name)?;
        self.process_transition(id, raw_state, logical, timestamp_ms)
    }

    fn call_handlers(&mut self, switch: SwitchId, state: SwitchState, timestamp_ms: u64) {
        let ids = match self.switches.get(switch.0) {
            Some(slot) => slot.handlers[state.slot()].clone(),
            None => return,
        };
        for id in ids {
            let Some(handler) = self.handlers.get(&id) else {
                // removed by an earlier handler in this pass
                continue;
            };
            if handler.hold_ms > 0 {
                let due = timestamp_ms + u64::from(handler.hold_ms);
                debug!(switch = switch.0, due, hold_ms = handler.hold_ms, "found timed switch handler");
                self.add_pending(switch, due, id);
            } else {
                self.fire(id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Run every delayed callback that is due.
    pub fn update(&mut self, now_ms: u64) {
        for index in 0..self.switches.len() {
            if matches!(self.switches[index].armed_at, Some(t) if t <= now_ms) {
                self.process_due(SwitchId(index), now_ms);
            }
        }
        self.purge_dropped_waits();
    }

    /// Earliest time [`update`](Self::update) has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        self.switches.iter().filter_map(|s| s.armed_at).min()
    }

    fn process_due(&mut self, switch: SwitchId, now_ms: u64) {
        let due: Vec<u64> = match self.switches.get_mut(switch.0) {
            Some(slot) => {
                slot.armed_at = None;
                slot.pending.range(..=now_ms).map(|(t, _)| *t).collect()
            }
            None => return,
        };

        for time in due {
            let ids = match self.switches[switch.0].pending.remove(&time) {
                Some(ids) => ids,
                None => continue,
            };
            for id in ids {
                debug!(switch = switch.0, time, "processing timed switch handler");
                self.fire(id);
            }
        }

        let slot = &mut self.switches[switch.0];
        slot.armed_at = slot.pending.keys().next().copied();
    }

    // ------------------------------------------------------------------
    // Waits
    // ------------------------------------------------------------------

    /// Wait for the first of `switches` to enter `state` (for `hold_ms`).
    ///
    /// With `only_on_change == false` a switch already in the state resolves
    /// the wait immediately. The result names the switch that triggered.
    /// All handlers created for the wait are removed as soon as it resolves.
    pub fn wait_for_any(
        &mut self,
        switches: &[SwitchId],
        state: WaitState,
        only_on_change: bool,
        hold_ms: u32,
        now_ms: u64,
    ) -> Result<SwitchWait, SwitchError> {
        let wait_id = WaitId(self.next_id);
        self.next_id += 1;
        let (wait, slot) = SwitchWait::new(wait_id);

        if !only_on_change && state != WaitState::Opposite {
            let target = match state {
                WaitState::Active => SwitchState::Active,
                _ => SwitchState::Inactive,
            };
            for &switch in switches {
                if self.is_state(switch, target, hold_ms, now_ms)? {
                    let name = self.slot(switch)?.switch.name.clone();
                    slot.borrow_mut().resolve(SwitchHit {
                        switch,
                        name,
                        state: target,
                        hold_ms,
                    });
                    return Ok(wait);
                }
            }
        }

        let mut handles = Vec::with_capacity(switches.len());
        for &switch in switches {
            let registered = self.slot(switch).map(|s| match state {
                WaitState::Active => SwitchState::Active,
                WaitState::Inactive => SwitchState::Inactive,
                WaitState::Opposite => s.switch.state.opposite(),
            });
            let result = registered.and_then(|target| {
                self.register_action(switch, target, hold_ms, HandlerAction::Wait(wait_id), now_ms)
            });
            match result {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    for handle in handles {
                        let _ = self.unregister(handle);
                    }
                    return Err(err);
                }
            }
        }

        self.waits.insert(
            wait_id,
            WaitEntry {
                slot,
                handlers: handles,
            },
        );
        Ok(wait)
    }

    /// [`wait_for_any`](Self::wait_for_any) for a single switch.
    pub fn wait_for(
        &mut self,
        switch: SwitchId,
        state: WaitState,
        only_on_change: bool,
        hold_ms: u32,
        now_ms: u64,
    ) -> Result<SwitchWait, SwitchError> {
        self.wait_for_any(&[switch], state, only_on_change, hold_ms, now_ms)
    }

    /// Cancel a wait and remove its handlers.
    pub fn cancel_wait(&mut self, wait: &SwitchWait) {
        if let Some(entry) = self.waits.remove(&wait.id()) {
            entry.slot.borrow_mut().cancel();
            self.drop_wait_handlers(entry.handlers);
        }
    }

    /// Number of waits still registered.
    pub fn pending_waits(&self) -> usize {
        self.waits.len()
    }

    fn resolve_wait(&mut self, wait: WaitId, hit: SwitchHit) {
        if let Some(entry) = self.waits.remove(&wait) {
            entry.slot.borrow_mut().resolve(hit);
            self.drop_wait_handlers(entry.handlers);
        }
    }

    fn drop_wait_handlers(&mut self, handles: Vec<HandlerHandle>) {
        for handle in handles {
            // handles were issued by this engine
            let _ = self.unregister(handle);
        }
    }

    fn purge_dropped_waits(&mut self) {
        let orphaned: Vec<WaitId> = self
            .waits
            .iter()
            .filter(|(_, entry)| Rc::strong_count(&entry.slot) == 1)
            .map(|(id, _)| *id)
            .collect();
        for id in orphaned {
            if let Some(entry) = self.waits.remove(&id) {
                self.drop_wait_handlers(entry.handlers);
            }
        }
    }

    // ------------------------------------------------------------------
    // Monitors
    // ------------------------------------------------------------------

    /// Add a monitor called after the handlers of every accepted transition.
    pub fn add_monitor(&mut self, monitor: SwitchMonitor) -> MonitorId {
        let id = MonitorId(self.next_id);
        self.next_id += 1;
        self.monitors.push((id, monitor));
        id
    }

    /// Remove a monitor. Returns whether it was registered.
    pub fn remove_monitor(&mut self, id: MonitorId) -> bool {
        let before = self.monitors.len();
        self.monitors.retain(|(m, _)| *m != id);
        self.monitors.len() != before
    }

    fn notify_monitors(&mut self, change: &MonitoredSwitchChange) {
        for (_, monitor) in &mut self.monitors {
            monitor(change);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
