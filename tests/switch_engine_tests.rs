//! Integration tests for the switch event engine

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use pinball_core::{
    hal::MockSwitchPlatform, SwitchConfig, SwitchEngine, SwitchError, SwitchInbox, SwitchState,
    WaitState,
};

fn engine(switches: &[(&str, u32)]) -> SwitchEngine {
    let mut engine = SwitchEngine::new(false);
    let mut platform = MockSwitchPlatform::new();
    for (name, number) in switches {
        engine.add_switch(&SwitchConfig::new(name, *number)).unwrap();
        platform.set(*number, false);
    }
    engine.initialize(&mut platform, 0).unwrap();
    engine
}

// ============================================================================
// Hold Handlers
// ============================================================================

#[test]
fn late_registered_hold_handler_fires_at_anchored_time() {
    let mut engine = engine(&[("s_trough1", 1)]);
    let trough = engine.switch_id("s_trough1").unwrap();

    engine.process_transition(trough, 1, false, 0).unwrap();

    // registered 200ms after the switch closed
    let inbox = SwitchInbox::new();
    engine
        .register(trough, SwitchState::Active, 1000, inbox.callback(), 200)
        .unwrap();

    engine.update(999);
    assert!(inbox.is_empty());
    engine.update(1000);
    assert_eq!(inbox.drain().len(), 1);

    // nothing left for 1200
    engine.update(1200);
    assert!(inbox.is_empty());
}

#[test]
fn hold_handler_needs_continuous_hold() {
    let mut engine = engine(&[("s_scoop", 3)]);
    let scoop = engine.switch_id("s_scoop").unwrap();
    let inbox = SwitchInbox::new();
    engine
        .register(scoop, SwitchState::Active, 500, inbox.callback(), 0)
        .unwrap();

    // bounce every 300ms for a while
    let mut t = 0;
    for _ in 0..5 {
        engine.process_transition(scoop, 1, false, t).unwrap();
        engine.update(t + 299);
        engine.process_transition(scoop, 0, false, t + 300).unwrap();
        engine.update(t + 600);
        t += 600;
    }
    assert!(inbox.is_empty());

    engine.process_transition(scoop, 1, false, t).unwrap();
    engine.update(t + 500);
    let hits = inbox.drain();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].hold_ms, 500);
}

#[test]
fn handler_unregistered_before_firing_never_runs() {
    let mut engine = engine(&[("s_lock", 4)]);
    let lock = engine.switch_id("s_lock").unwrap();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let handle = engine
        .register(
            lock,
            SwitchState::Active,
            250,
            Box::new(move |_| *sink.borrow_mut() += 1),
            0,
        )
        .unwrap();

    engine.process_transition(lock, 1, false, 1000).unwrap();
    engine.unregister(handle).unwrap();
    engine.update(5000);
    assert_eq!(*count.borrow(), 0);
}

#[test]
fn register_unregister_round_trip_leaves_no_trace() {
    let mut engine = engine(&[("s_lock", 4)]);
    let lock = engine.switch_id("s_lock").unwrap();

    let handle = engine
        .register(lock, SwitchState::Active, 100, SwitchInbox::new().callback(), 0)
        .unwrap();
    assert_eq!(engine.handler_count(lock, SwitchState::Active).unwrap(), 1);
    engine.unregister(handle).unwrap();
    assert_eq!(engine.handler_count(lock, SwitchState::Active).unwrap(), 0);

    engine.process_transition(lock, 1, false, 10).unwrap();
    assert_eq!(engine.next_deadline(), None);
}

#[test]
fn handles_are_distinct_set_keys() {
    let mut engine = engine(&[("s_lock", 4), ("s_scoop", 5)]);
    let lock = engine.switch_id("s_lock").unwrap();
    let scoop = engine.switch_id("s_scoop").unwrap();
    let inbox = SwitchInbox::new();

    let mut handles = HashSet::new();
    for (switch, state) in [
        (lock, SwitchState::Active),
        (lock, SwitchState::Inactive),
        (scoop, SwitchState::Active),
    ] {
        let handle = engine.register(switch, state, 0, inbox.callback(), 0).unwrap();
        assert!(handles.insert(handle));
        assert!(!handles.insert(handle));
    }
    assert_eq!(handles.len(), 3);

    for handle in handles.drain() {
        engine.unregister(handle).unwrap();
    }
    assert_eq!(engine.handler_count(lock, SwitchState::Active).unwrap(), 0);
    assert_eq!(engine.handler_count(scoop, SwitchState::Active).unwrap(), 0);
}

// ============================================================================
// Duplicates and Polarity
// ============================================================================

#[test]
fn duplicate_transitions_fire_nothing_in_production() {
    let mut engine = SwitchEngine::new(true);
    let s = engine.add_switch(&SwitchConfig::new("s_outlane", 8)).unwrap();
    engine
        .initialize(&mut MockSwitchPlatform::new().with_switch(8, false), 0)
        .unwrap();

    let inbox = SwitchInbox::new();
    engine
        .register(s, SwitchState::Inactive, 0, inbox.callback(), 0)
        .unwrap();
    engine.process_transition(s, 0, false, 50).unwrap();
    assert!(inbox.is_empty());
    assert_eq!(engine.switch(s).unwrap().last_change(), None);
}

#[test]
fn nc_switch_round_trip() {
    let mut engine = SwitchEngine::new(false);
    let tilt = engine
        .add_switch(&SwitchConfig::new("s_tilt", 9).with_invert(true))
        .unwrap();
    // closed contact on an NC switch is logically inactive
    engine
        .initialize(&mut MockSwitchPlatform::new().with_switch(9, true), 0)
        .unwrap();
    assert!(engine.is_inactive(tilt, 0, 0).unwrap());

    engine.process_transition(tilt, 0, false, 10).unwrap();
    assert!(engine.is_active(tilt, 0, 10).unwrap());
    engine.process_transition(tilt, 0, true, 20).unwrap();
    assert!(engine.is_inactive(tilt, 0, 20).unwrap());
}

// ============================================================================
// Waits
// ============================================================================

#[test]
fn wait_for_any_resolves_once_for_simultaneous_switches() {
    let mut engine = engine(&[("s_left", 1), ("s_right", 2)]);
    let ids = [
        engine.switch_id("s_left").unwrap(),
        engine.switch_id("s_right").unwrap(),
    ];
    let mut wait = engine
        .wait_for_any(&ids, WaitState::Active, true, 100, 0)
        .unwrap();

    engine.process_transition(ids[0], 1, false, 1000).unwrap();
    engine.process_transition(ids[1], 1, false, 1000).unwrap();
    engine.update(1100);

    let hit = wait.try_take().unwrap();
    assert_eq!(hit.name.as_str(), "s_left");
    assert!(wait.try_take().is_none());
    for id in ids {
        assert_eq!(engine.handler_count(id, SwitchState::Active).unwrap(), 0);
    }
}

#[test]
fn wait_with_hold_before_init_fails() {
    let mut engine = SwitchEngine::new(false);
    let s = engine.add_switch(&SwitchConfig::new("s_a", 1)).unwrap();
    let err = engine
        .wait_for(s, WaitState::Active, true, 100, 0)
        .unwrap_err();
    assert!(matches!(err, SwitchError::NotInitialised { .. }));
}

#[tokio::test]
async fn wait_can_be_awaited() {
    let mut engine = engine(&[("s_shooter", 5)]);
    let shooter = engine.switch_id("s_shooter").unwrap();
    let wait = engine
        .wait_for(shooter, WaitState::Active, true, 0, 0)
        .unwrap();

    let (hit, ()) = tokio::join!(wait, async {
        tokio::task::yield_now().await;
        engine.process_transition(shooter, 1, false, 10).unwrap();
    });

    let hit = hit.unwrap();
    assert_eq!(hit.name.as_str(), "s_shooter");
    assert_eq!(hit.state, SwitchState::Active);
}

#[tokio::test]
async fn cancelled_wait_yields_none() {
    let mut engine = engine(&[("s_shooter", 5)]);
    let shooter = engine.switch_id("s_shooter").unwrap();
    let wait = engine
        .wait_for(shooter, WaitState::Active, true, 0, 0)
        .unwrap();
    engine.cancel_wait(&wait);

    assert!(wait.await.is_none());
    assert_eq!(engine.pending_waits(), 0);
}

// ============================================================================
// Monitors
// ============================================================================

#[test]
fn monitors_see_configured_and_unknown_switches() {
    let mut engine = SwitchEngine::new(false);
    engine
        .add_switch(&SwitchConfig::new("s_start", 7).with_label("Start Button").with_platform("fast"))
        .unwrap();
    engine
        .initialize(&mut MockSwitchPlatform::new().with_switch(7, false), 0)
        .unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine.add_monitor(Box::new(move |change| sink.borrow_mut().push(change.clone())));

    engine.process_by_number("fast", 7, 1, false, 10).unwrap();
    engine.process_by_number("fast", 70, 1, false, 20).unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].name, "s_start");
    assert_eq!(seen[0].label, "Start Button");
    assert_eq!(seen[1].name, "70");
    assert_eq!(seen[1].label, "fast-70");
}
