//! Named events posted to the rest of the machine.
//!
//! Event names are a wire contract shared with machine configs, so they are
//! plain strings (`balldevice_ball_missing`, `ball_search_started`, ...).
//! Components post through the [`EventSink`] trait; [`EventQueue`] is the
//! in-memory sink the [`Machine`](crate::machine::Machine) drains every tick.

use std::collections::VecDeque;
use std::fmt;

/// Value of one event argument.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum EventArg {
    /// Integer argument (`balls`, `num_attempts`, `iteration`).
    Int(i64),
    /// Boolean argument.
    Bool(bool),
    /// String argument (`target`, `device`).
    Str(String),
}

impl From<i64> for EventArg {
    fn from(v: i64) -> Self {
        EventArg::Int(v)
    }
}

impl From<u32> for EventArg {
    fn from(v: u32) -> Self {
        EventArg::Int(i64::from(v))
    }
}

impl From<bool> for EventArg {
    fn from(v: bool) -> Self {
        EventArg::Bool(v)
    }
}

impl From<&str> for EventArg {
    fn from(v: &str) -> Self {
        EventArg::Str(v.into())
    }
}

/// A posted event.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Keyword arguments in the order they were added.
    pub args: Vec<(&'static str, EventArg)>,
}

impl Event {
    /// Event with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, key: &'static str, value: impl Into<EventArg>) -> Self {
        self.args.push((key, value.into()));
        self
    }

    /// Look up an argument.
    pub fn arg(&self, key: &str) -> Option<&EventArg> {
        self.args.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Look up an integer argument.
    pub fn int_arg(&self, key: &str) -> Option<i64> {
        match self.arg(key) {
            Some(EventArg::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.args {
            match value {
                EventArg::Int(v) => write!(f, " {key}={v}")?,
                EventArg::Bool(v) => write!(f, " {key}={v}")?,
                EventArg::Str(v) => write!(f, " {key}={v}")?,
            }
        }
        Ok(())
    }
}

/// Receiver of posted events.
pub trait EventSink {
    /// Post an event.
    fn post(&mut self, event: Event);
}

/// FIFO event sink.
///
/// # Example
///
/// ```rust
/// use pinball_core::events::{Event, EventQueue, EventSink};
///
/// let mut queue = EventQueue::new();
/// queue.post(Event::new("ball_search_started"));
/// assert!(queue.contains("ball_search_started"));
/// assert_eq!(queue.drain().len(), 1);
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all queued events in posting order.
    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    /// Whether an event with this name is queued.
    pub fn contains(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name == name)
    }

    /// Queued events with this name.
    pub fn named(&self, name: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.name == name).collect()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventQueue {
    fn post(&mut self, event: Event) {
        tracing::debug!(event = %event, "posting event");
        self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_args_lookup() {
        let event = Event::new("balldevice_bd_trough_ejecting_ball")
            .with_arg("balls", 1u32)
            .with_arg("target", "playfield")
            .with_arg("mechanical_eject", false);

        assert_eq!(event.int_arg("balls"), Some(1));
        assert_eq!(event.arg("target"), Some(&EventArg::Str("playfield".into())));
        assert_eq!(event.arg("mechanical_eject"), Some(&EventArg::Bool(false)));
        assert!(event.arg("missing").is_none());
    }

    #[test]
    fn event_display() {
        let event = Event::new("ball_search_phase_2").with_arg("iteration", 3u32);
        assert_eq!(event.to_string(), "ball_search_phase_2 iteration=3");
    }

    #[test]
    fn queue_preserves_order() {
        let mut queue = EventQueue::new();
        queue.post(Event::new("a"));
        queue.post(Event::new("b"));
        queue.post(Event::new("a"));

        assert_eq!(queue.named("a").len(), 2);
        let names: Vec<String> = queue.drain().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
    }
}
