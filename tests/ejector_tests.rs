//! Tests for the ejector strategies driven directly through the trait

use pinball_core::{
    hal::{CoilAction, MockCoilDriver, MockSwitchPlatform},
    AnyEjector, BallDeviceConfig, Coil, CoilConfig, DeviceStatus, EjectorContext, EjectorKind,
    Ejector, EventQueue, SearchPhase, SwitchConfig, SwitchEngine,
};

struct Rig {
    engine: SwitchEngine,
    events: EventQueue,
}

impl Rig {
    fn new(switches: &[(&str, u32, bool)]) -> Self {
        let mut engine = SwitchEngine::new(false);
        let mut platform = MockSwitchPlatform::new();
        for (name, number, closed) in switches {
            engine.add_switch(&SwitchConfig::new(name, *number)).unwrap();
            platform.set(*number, *closed);
        }
        engine.initialize(&mut platform, 0).unwrap();
        Self {
            engine,
            events: EventQueue::new(),
        }
    }

    fn ctx(&mut self, now_ms: u64, status: DeviceStatus) -> EjectorContext<'_> {
        EjectorContext {
            engine: &mut self.engine,
            events: &mut self.events,
            now_ms,
            status,
        }
    }
}

fn coil(name: &str) -> Coil<MockCoilDriver> {
    Coil::new(CoilConfig::new(name), MockCoilDriver::new())
}

fn pulses(ejector: &AnyEjector<MockCoilDriver>) -> Vec<u32> {
    ejector.coil().unwrap().driver().pulses()
}

fn actions(ejector: &AnyEjector<MockCoilDriver>) -> Vec<CoilAction> {
    ejector.coil().unwrap().driver().actions.clone()
}

fn idle(balls: u32) -> DeviceStatus {
    DeviceStatus {
        idle: true,
        balls,
        is_trough: false,
    }
}

// ============================================================================
// Pulse Coil
// ============================================================================

#[test]
fn pulse_escalation_jam_then_retry() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_plunger")
        .with_eject_coil("c_plunger")
        .with_jam_pulse(5)
        .with_retry_pulse(15, 3);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_plunger"))).unwrap();

    ejector.eject_one_ball(&mut rig.ctx(0, idle(1)), true, 1).unwrap();
    ejector.eject_one_ball(&mut rig.ctx(1000, idle(1)), false, 5).unwrap();

    assert_eq!(pulses(&ejector), vec![5, 15]);
}

#[test]
fn pulse_escalation_thresholds() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_plunger")
        .with_eject_coil("c_plunger")
        .with_retry_pulse(15, 3);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_plunger"))).unwrap();

    for eject_try in 1..=5 {
        let now = u64::from(eject_try) * 1000;
        ejector
            .eject_one_ball(&mut rig.ctx(now, idle(1)), false, eject_try)
            .unwrap();
    }
    // coil default is 10ms
    assert_eq!(pulses(&ejector), vec![10, 10, 10, 15, 15]);
}

#[test]
fn pulse_progress_covers_wait_and_duration() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_scoop")
        .with_eject_coil("c_scoop")
        .with_reorder_pulse(8);
    let coil = Coil::new(
        CoilConfig::new("c_scoop").with_default_pulse_ms(20).with_recycle_ms(100),
        MockCoilDriver::new(),
    );
    let mut ejector = AnyEjector::from_config(&config, Some(coil)).unwrap();

    let first = ejector.eject_one_ball(&mut rig.ctx(0, idle(1)), false, 1).unwrap();
    assert_eq!(first.busy_until_ms, 20);

    // still recycling until 120: 70ms wait + 8ms pulse + settle
    let reorder = ejector.reorder_balls(&mut rig.ctx(50, idle(1))).unwrap();
    assert_eq!(reorder.busy_until_ms, 50 + 70 + 8 + 2000);
}

#[test]
fn reorder_without_pulse_is_a_config_error() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_scoop").with_eject_coil("c_scoop");
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_scoop"))).unwrap();
    assert!(!ejector.can_reorder());

    let err = ejector.reorder_balls(&mut rig.ctx(0, idle(1))).unwrap_err();
    assert!(err.to_string().contains("eject_coil_reorder_pulse"));
}

#[test]
fn pulse_ball_search_phases() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_scoop")
        .with_eject_coil("c_scoop")
        .with_jam_pulse(4);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_scoop"))).unwrap();

    // phase 1 only for idle empty devices
    assert!(!ejector.ball_search(&mut rig.ctx(0, idle(1)), SearchPhase::One, 1).unwrap());
    assert!(ejector.ball_search(&mut rig.ctx(100, idle(0)), SearchPhase::One, 1).unwrap());
    assert!(ejector.ball_search(&mut rig.ctx(200, idle(1)), SearchPhase::Two, 1).unwrap());
    assert!(ejector.ball_search(&mut rig.ctx(300, idle(1)), SearchPhase::Three, 1).unwrap());
    assert_eq!(pulses(&ejector), vec![10, 4, 10]);

    let trough = DeviceStatus {
        is_trough: true,
        ..idle(3)
    };
    assert!(!ejector.ball_search(&mut rig.ctx(400, trough), SearchPhase::Two, 1).unwrap());
    assert!(!ejector.ball_search(&mut rig.ctx(500, trough), SearchPhase::Three, 1).unwrap());
}

// ============================================================================
// Hold Coil
// ============================================================================

#[test]
fn hold_coil_follows_hold_switch_and_releases() {
    let mut rig = Rig::new(&[("s_lock", 1, false)]);
    let config = BallDeviceConfig::new("bd_lock")
        .with_ejector(EjectorKind::HoldCoil)
        .with_hold_coil("c_lock_hold", &["s_lock"])
        .with_release_time(300);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_lock_hold"))).unwrap();
    ejector.setup(&mut rig.ctx(0, idle(0))).unwrap();
    assert!(actions(&ejector).is_empty());
    let AnyEjector::Hold(hold) = &ejector else {
        panic!("expected a hold ejector");
    };
    assert_eq!(hold.hold_switches(), &[rig.engine.switch_id("s_lock").unwrap()]);

    let lock = rig.engine.switch_id("s_lock").unwrap();
    rig.engine.process_transition(lock, 1, false, 100).unwrap();
    ejector.update(&mut rig.ctx(100, idle(1))).unwrap();
    assert!(ejector.coil().unwrap().is_enabled());

    let progress = ejector.eject_one_ball(&mut rig.ctx(200, idle(1)), false, 1).unwrap();
    assert_eq!(progress.busy_until_ms, 500);
    assert!(!ejector.coil().unwrap().is_enabled());

    // release over with balls still inside: hold again
    ejector.update(&mut rig.ctx(500, idle(1))).unwrap();
    assert!(ejector.coil().unwrap().is_enabled());

    ejector.eject_one_ball(&mut rig.ctx(600, idle(1)), false, 1).unwrap();
    ejector.update(&mut rig.ctx(900, idle(0))).unwrap();
    assert!(!ejector.coil().unwrap().is_enabled());
}

#[test]
fn hold_switch_ignored_during_release() {
    let mut rig = Rig::new(&[("s_lock", 1, true)]);
    let config = BallDeviceConfig::new("bd_lock")
        .with_ejector(EjectorKind::HoldCoil)
        .with_hold_coil("c_lock_hold", &["s_lock"]);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_lock_hold"))).unwrap();
    // already active at setup
    ejector.setup(&mut rig.ctx(0, idle(1))).unwrap();
    assert!(ejector.coil().unwrap().is_enabled());

    ejector.eject_one_ball(&mut rig.ctx(10, idle(1)), false, 1).unwrap();
    let lock = rig.engine.switch_id("s_lock").unwrap();
    rig.engine.process_transition(lock, 0, false, 20).unwrap();
    rig.engine.process_transition(lock, 1, false, 30).unwrap();
    ejector.update(&mut rig.ctx(30, idle(0))).unwrap();
    assert!(!ejector.coil().unwrap().is_enabled());

    // default release is one second
    ejector.update(&mut rig.ctx(1010, idle(0))).unwrap();
    assert!(!ejector.coil().unwrap().is_enabled());
}

#[test]
fn hold_ball_search_pulses_once() {
    let mut rig = Rig::new(&[("s_lock", 1, false)]);
    let config = BallDeviceConfig::new("bd_lock")
        .with_ejector(EjectorKind::HoldCoil)
        .with_hold_coil("c_lock_hold", &["s_lock"]);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_lock_hold"))).unwrap();
    assert!(ejector.ball_search(&mut rig.ctx(0, idle(0)), SearchPhase::Two, 1).unwrap());
    assert_eq!(pulses(&ejector), vec![10]);
}

// ============================================================================
// Enable Coil
// ============================================================================

#[test]
fn enable_coil_times_its_window() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_vuk")
        .with_ejector(EjectorKind::EnableCoil)
        .with_eject_coil("c_vuk")
        .with_enable_time(250);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_vuk"))).unwrap();

    let progress = ejector.eject_one_ball(&mut rig.ctx(100, idle(1)), false, 1).unwrap();
    assert_eq!(progress.busy_until_ms, 350);
    ejector.update(&mut rig.ctx(349, idle(1))).unwrap();
    assert!(ejector.coil().unwrap().is_enabled());
    ejector.update(&mut rig.ctx(350, idle(1))).unwrap();
    assert!(!ejector.coil().unwrap().is_enabled());

    let driver = ejector.coil().unwrap().driver();
    assert_eq!(driver.enable_count(), 1);
    assert_eq!(driver.disable_count(), 1);
    assert!(driver.pulses().is_empty());
}

#[test]
fn enable_coil_ball_search_prefers_full_pulse_with_jam_pulse() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_vuk")
        .with_ejector(EjectorKind::EnableCoil)
        .with_eject_coil("c_vuk")
        .with_enable_time(250)
        .with_jam_pulse(6);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_vuk"))).unwrap();
    assert!(ejector.ball_search(&mut rig.ctx(0, idle(1)), SearchPhase::Three, 1).unwrap());
    assert_eq!(pulses(&ejector), vec![10]);

    let config = BallDeviceConfig::new("bd_vuk")
        .with_ejector(EjectorKind::EnableCoil)
        .with_eject_coil("c_vuk")
        .with_enable_time(250);
    let mut ejector = AnyEjector::from_config(&config, Some(coil("c_vuk"))).unwrap();
    assert!(ejector.ball_search(&mut rig.ctx(0, idle(1)), SearchPhase::Three, 1).unwrap());
    assert!(ejector.coil().unwrap().is_enabled());
}

// ============================================================================
// Event Only
// ============================================================================

#[test]
fn event_ejector_posts_instead_of_firing() {
    let mut rig = Rig::new(&[]);
    let config = BallDeviceConfig::new("bd_magnet").with_ejector(EjectorKind::EventOnly);
    let mut ejector: AnyEjector<MockCoilDriver> = AnyEjector::from_config(&config, None).unwrap();
    assert!(ejector.coil().is_none());

    ejector.eject_one_ball(&mut rig.ctx(0, idle(1)), true, 2).unwrap();
    ejector.reorder_balls(&mut rig.ctx(0, idle(1))).unwrap();
    let searched = ejector
        .ball_search(&mut rig.ctx(0, idle(1)), SearchPhase::Two, 3)
        .unwrap();
    assert!(!searched);

    let events = rig.events.drain();
    assert_eq!(events[0].name, "balldevice_bd_magnet_ejector_eject_one_ball");
    assert_eq!(events[0].int_arg("eject_try"), Some(2));
    assert_eq!(events[1].name, "balldevice_bd_magnet_ejector_reorder_balls");
    assert_eq!(events[2].name, "balldevice_bd_magnet_ejector_ball_search");
    assert_eq!(events[2].int_arg("phase"), Some(2));
    assert_eq!(events[2].int_arg("iteration"), Some(3));
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn construction_rejects_bad_combinations() {
    let pulse_with_enable = BallDeviceConfig::new("bd_a")
        .with_eject_coil("c_a")
        .with_enable_time(100);
    assert!(AnyEjector::from_config(&pulse_with_enable, Some(coil("c_a"))).is_err());

    let pulse_without_coil = BallDeviceConfig::new("bd_b").with_eject_coil("c_b");
    let err = AnyEjector::<MockCoilDriver>::from_config(&pulse_without_coil, None).unwrap_err();
    assert_eq!(err.field, "eject_coil");

    let hold_without_coil = BallDeviceConfig::new("bd_c").with_ejector(EjectorKind::HoldCoil);
    let err = AnyEjector::<MockCoilDriver>::from_config(&hold_without_coil, None).unwrap_err();
    assert_eq!(err.field, "hold_coil");

    let event_with_coil = BallDeviceConfig::new("bd_d").with_ejector(EjectorKind::EventOnly);
    assert!(AnyEjector::from_config(&event_with_coil, Some(coil("c_d"))).is_err());
}
