//! Handles that carry switch handler results out of the engine.
//!
//! Handler callbacks run inside [`SwitchEngine::process_transition`] and
//! must not touch the engine themselves. Components that need to react to
//! a switch therefore either wait on a [`SwitchWait`] (resolves once) or
//! subscribe a [`SwitchInbox`] (collects every hit) and act on the result
//! from their own `update`.
//!
//! [`SwitchEngine::process_transition`]: crate::switch_engine::SwitchEngine::process_transition

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::config::ShortString;
use crate::switch::{SwitchId, SwitchState};

/// What a handler receives when it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchHit {
    /// Switch that fired.
    pub switch: SwitchId,
    /// Switch name.
    pub name: ShortString,
    /// State the handler was registered for.
    pub state: SwitchState,
    /// Hold time the handler was registered with.
    pub hold_ms: u32,
}

/// Callback invoked by the engine when a handler fires.
pub type SwitchCallback = Box<dyn FnMut(&SwitchHit)>;

/// Identity of a wait inside its engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitId(pub(crate) u64);

#[derive(Debug, Default)]
pub(crate) struct WaitSlot {
    result: Option<SwitchHit>,
    resolved: bool,
    cancelled: bool,
    waker: Option<Waker>,
}

impl WaitSlot {
    /// Store the first result; later results are ignored.
    pub(crate) fn resolve(&mut self, hit: SwitchHit) -> bool {
        if self.resolved || self.cancelled {
            return false;
        }
        self.resolved = true;
        self.result = Some(hit);
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
        true
    }

    pub(crate) fn cancel(&mut self) {
        if self.resolved {
            return;
        }
        self.cancelled = true;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.resolved || self.cancelled
    }
}

/// Result of `wait_for_any`: resolves exactly once.
///
/// Await it as a future (yields `None` if the wait was cancelled) or poll
/// it from a tick loop with [`try_take`](Self::try_take).
#[derive(Debug)]
pub struct SwitchWait {
    id: WaitId,
    slot: Rc<RefCell<WaitSlot>>,
}

impl SwitchWait {
    pub(crate) fn new(id: WaitId) -> (Self, Rc<RefCell<WaitSlot>>) {
        let slot = Rc::new(RefCell::new(WaitSlot::default()));
        (
            Self {
                id,
                slot: Rc::clone(&slot),
            },
            slot,
        )
    }

    /// Identity used to cancel the wait.
    pub fn id(&self) -> WaitId {
        self.id
    }

    /// Whether a switch has satisfied the wait.
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().resolved
    }

    /// Whether the wait was cancelled before resolving.
    pub fn is_cancelled(&self) -> bool {
        self.slot.borrow().cancelled
    }

    /// Take the result if the wait has resolved.
    ///
    /// Returns `Some` at most once.
    pub fn try_take(&mut self) -> Option<SwitchHit> {
        self.slot.borrow_mut().result.take()
    }
}

impl Future for SwitchWait {
    type Output = Option<SwitchHit>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        if let Some(hit) = slot.result.take() {
            return Poll::Ready(Some(hit));
        }
        if slot.is_settled() {
            return Poll::Ready(None);
        }
        slot.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Shared queue of switch hits.
///
/// Clone it into a handler with [`callback`](Self::callback) and drain it
/// from the owner's update.
///
/// # Example
///
/// ```rust
/// use pinball_core::hal::MockSwitchPlatform;
/// use pinball_core::config::SwitchConfig;
/// use pinball_core::switch::SwitchState;
/// use pinball_core::switch_engine::SwitchEngine;
/// use pinball_core::wait::SwitchInbox;
///
/// let mut engine = SwitchEngine::new(false);
/// let s = engine.add_switch(&SwitchConfig::new("s_lock", 4)).unwrap();
/// engine.initialize(&mut MockSwitchPlatform::new().with_switch(4, false), 0).unwrap();
///
/// let inbox = SwitchInbox::new();
/// engine.register(s, SwitchState::Active, 0, inbox.callback(), 0).unwrap();
/// engine.process_transition(s, 1, false, 10).unwrap();
///
/// assert_eq!(inbox.drain().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SwitchInbox {
    hits: Rc<RefCell<VecDeque<SwitchHit>>>,
}

impl SwitchInbox {
    /// Creates an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that pushes every hit into this inbox.
    pub fn callback(&self) -> SwitchCallback {
        let hits = Rc::clone(&self.hits);
        Box::new(move |hit: &SwitchHit| hits.borrow_mut().push_back(hit.clone()))
    }

    /// Take all hits in arrival order.
    pub fn drain(&self) -> Vec<SwitchHit> {
        self.hits.borrow_mut().drain(..).collect()
    }

    /// Whether no hits are waiting.
    pub fn is_empty(&self) -> bool {
        self.hits.borrow().is_empty()
    }

    /// Drop waiting hits.
    pub fn clear(&self) {
        self.hits.borrow_mut().clear();
    }
}
