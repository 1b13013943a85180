//! Playfield ball search.
//!
//! When the playfield has been quiet for `timeout_ms` the search starts and
//! nudges ball devices one at a time, in `ball_search_order`. It escalates
//! through three phases, running `phase_<n>_searches` full passes over the
//! devices in each. Any playfield activity resets the timer and stops a
//! running search. If phase 3 finishes without finding the ball, the search
//! gives up.
//!
//! ```rust
//! use pinball_core::ball_search::BallSearch;
//! use pinball_core::config::BallSearchConfig;
//! use pinball_core::events::EventQueue;
//!
//! let mut search = BallSearch::new(BallSearchConfig::default().with_timeout_ms(1000));
//! let mut events = EventQueue::new();
//!
//! search.enable(0);
//! assert_eq!(search.deadline(), Some(1000));
//!
//! search.block(&mut events);
//! assert!(search.is_blocked());
//! assert_eq!(search.deadline(), None);
//! ```

use tracing::{debug, info, warn};

use crate::ball_device::BallDevice;
use crate::config::BallSearchConfig;
use crate::error::EjectorError;
use crate::events::{Event, EventSink};
use crate::switch_engine::SwitchEngine;
use crate::traits::{CoilDriver, SearchPhase};

/// Machine-wide ball search coordinator.
#[derive(Debug)]
pub struct BallSearch {
    config: BallSearchConfig,
    enabled: bool,
    blocked: bool,
    started: bool,
    deadline: Option<u64>,
    phase: u8,
    iteration: u32,
    next_device: usize,
    next_at: u64,
}

impl BallSearch {
    /// Create a disabled search.
    pub fn new(config: BallSearchConfig) -> Self {
        Self {
            config,
            enabled: false,
            blocked: false,
            started: false,
            deadline: None,
            phase: 0,
            iteration: 0,
            next_device: 0,
            next_at: 0,
        }
    }

    /// Configuration.
    pub fn config(&self) -> &BallSearchConfig {
        &self.config
    }

    /// Whether the timer may start a search.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the search is blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Whether a search is running.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Current phase (0 when not running).
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Current iteration within the phase.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// When the inactivity timer expires.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    /// Earliest time [`update`](Self::update) has timed work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        if self.started {
            Some(self.next_at)
        } else {
            self.deadline
        }
    }

    /// Allow the search and start its timer.
    ///
    /// Has no effect if ball search is turned off in the config.
    pub fn enable(&mut self, now_ms: u64) {
        if !self.config.enabled {
            debug!("ball search disabled in config");
            return;
        }
        self.enabled = true;
        self.reset_timer(now_ms);
    }

    /// Stop any running search and forbid new ones.
    pub fn disable(&mut self, events: &mut dyn EventSink) {
        self.stop(events);
        self.enabled = false;
    }

    /// Stop any running search until [`unblock`](Self::unblock).
    pub fn block(&mut self, events: &mut dyn EventSink) {
        debug!("blocking ball search");
        self.blocked = true;
        self.stop(events);
    }

    /// Lift a block and restart the timer if enabled.
    pub fn unblock(&mut self, now_ms: u64) {
        self.blocked = false;
        if self.enabled {
            self.reset_timer(now_ms);
        }
    }

    /// Restart the inactivity timer. Does not stop a running search; use
    /// [`activity`](Self::activity) for that.
    pub fn reset_timer(&mut self, now_ms: u64) {
        if self.enabled && !self.blocked {
            self.deadline = Some(now_ms + u64::from(self.config.timeout_ms));
        }
    }

    /// Playfield activity while a search may be running.
    pub fn activity(&mut self, now_ms: u64, events: &mut dyn EventSink) {
        if self.started {
            self.stop(events);
        }
        self.reset_timer(now_ms);
    }

    /// Start searching now.
    pub fn start(&mut self, now_ms: u64, events: &mut dyn EventSink) {
        if self.started || !self.enabled || self.blocked {
            return;
        }
        info!("starting ball search");
        self.started = true;
        self.deadline = None;
        events.post(Event::new("ball_search_started"));
        self.phase = 1;
        self.iteration = 0;
        self.begin_iteration(now_ms, now_ms, events);
    }

    /// Stop searching. The timer is not restarted.
    pub fn stop(&mut self, events: &mut dyn EventSink) {
        self.deadline = None;
        if !self.started {
            return;
        }
        info!("stopping ball search");
        self.started = false;
        self.phase = 0;
        self.iteration = 0;
        events.post(Event::new("ball_search_stopped"));
    }

    /// Give up: announce failure and stop.
    pub fn cancel(&mut self, events: &mut dyn EventSink) {
        warn!("ball search failed to find a ball, giving up");
        events.post(Event::new("ball_search_failed"));
        self.stop(events);
    }

    /// Run the timer and, while searching, the next device.
    pub fn update<D: CoilDriver>(
        &mut self,
        now_ms: u64,
        devices: &mut [BallDevice<D>],
        engine: &mut SwitchEngine,
        events: &mut dyn EventSink,
    ) -> Result<(), EjectorError> {
        if !self.started {
            if self.deadline.is_some_and(|at| at <= now_ms) {
                self.start(now_ms, events);
            }
            return Ok(());
        }
        if now_ms < self.next_at {
            return Ok(());
        }
        let Some(phase) = SearchPhase::from_number(self.phase) else {
            return Ok(());
        };

        let mut order: Vec<usize> = (0..devices.len()).collect();
        order.sort_by_key(|&i| devices[i].config().ball_search_order);

        while let Some(&index) = order.get(self.next_device) {
            self.next_device += 1;
            let device = &mut devices[index];
            if device.ball_search(engine, events, now_ms, phase, self.iteration)? {
                debug!(device = device.name(), phase = self.phase, iteration = self.iteration, "searched device");
                self.next_at = now_ms + u64::from(self.config.interval_ms);
                return Ok(());
            }
        }

        // full pass done
        let wait_until = now_ms + u64::from(self.config.wait_after_iteration_ms);
        self.begin_iteration(now_ms, wait_until, events);
        Ok(())
    }

    fn begin_iteration(&mut self, now_ms: u64, start_at: u64, events: &mut dyn EventSink) {
        self.iteration += 1;
        while self.iteration > self.config.searches(self.phase) {
            self.phase += 1;
            self.iteration = 1;
            if self.phase > 3 {
                debug!(now_ms, "all ball search phases exhausted");
                self.cancel(events);
                return;
            }
        }
        self.next_device = 0;
        self.next_at = start_at;
        events.post(
            Event::new(format!("ball_search_phase_{}", self.phase)).with_arg("iteration", self.iteration),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventQueue;

    #[test]
    fn disabled_in_config_never_arms() {
        let mut search = BallSearch::new(BallSearchConfig::default().with_enabled(false));
        search.enable(0);
        assert!(!search.is_enabled());
        assert_eq!(search.deadline(), None);
    }

    #[test]
    fn start_posts_started_and_phase_one() {
        let mut search = BallSearch::new(BallSearchConfig::default());
        let mut events = EventQueue::new();
        search.enable(0);
        search.start(100, &mut events);

        let names: Vec<String> = events.drain().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["ball_search_started", "ball_search_phase_1"]);
        assert_eq!(search.phase(), 1);
        assert_eq!(search.iteration(), 1);
    }

    #[test]
    fn next_deadline_follows_timer_then_step() {
        let mut search = BallSearch::new(BallSearchConfig::default());
        let mut events = EventQueue::new();
        assert_eq!(search.next_deadline(), None);

        search.enable(0);
        assert_eq!(search.next_deadline(), Some(15_000));

        search.start(100, &mut events);
        assert_eq!(search.next_deadline(), Some(100));

        search.stop(&mut events);
        assert_eq!(search.next_deadline(), None);
    }

    #[test]
    fn blocked_search_does_not_start() {
        let mut search = BallSearch::new(BallSearchConfig::default());
        let mut events = EventQueue::new();
        search.enable(0);
        search.block(&mut events);
        search.start(100, &mut events);
        assert!(!search.is_started());

        search.unblock(200);
        assert_eq!(search.deadline(), Some(15_200));
    }

    #[test]
    fn activity_stops_running_search() {
        let mut search = BallSearch::new(BallSearchConfig::default());
        let mut events = EventQueue::new();
        search.enable(0);
        search.start(0, &mut events);
        events.drain();

        search.activity(500, &mut events);
        assert!(!search.is_started());
        assert!(events.contains("ball_search_stopped"));
        assert_eq!(search.deadline(), Some(15_500));
    }

    #[test]
    fn zero_searches_skip_a_phase() {
        let config = BallSearchConfig::default().with_searches(0, 1, 1);
        let mut search = BallSearch::new(config);
        let mut events = EventQueue::new();
        search.enable(0);
        search.start(0, &mut events);
        assert_eq!(search.phase(), 2);
        assert!(events.contains("ball_search_phase_2"));
    }
}
