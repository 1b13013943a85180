//! Trough eject walkthrough on mock hardware.
//!
//! Builds a two-ball trough and a plunger lane, ejects a ball from the
//! trough, feeds the switch changes a real machine would produce, and prints
//! every posted event along the way.
//!
//! # Usage
//!
//! ```sh
//! cargo run --example trough_eject
//! RUST_LOG=pinball_core=debug cargo run --example trough_eject
//! ```

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use pinball_core::config::{BallDeviceConfig, BallSearchConfig, CoilConfig, MachineConfig, SwitchConfig};
use pinball_core::hal::{MockClock, MockCoilDriver, MockSwitchPlatform};
use pinball_core::traits::Clock;
use pinball_core::Machine;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MachineConfig::default()
        .with_switch(SwitchConfig::new("s_trough1", 1))
        .with_switch(SwitchConfig::new("s_trough2", 2))
        .with_switch(SwitchConfig::new("s_plunger", 3))
        .with_switch(SwitchConfig::new("s_orbit", 10).with_label("Left Orbit"))
        .with_coil(CoilConfig::new("c_trough_eject").with_default_pulse_ms(20))
        .with_coil(CoilConfig::new("c_plunger").with_default_pulse_ms(15).with_recycle_ms(250))
        .with_ball_search(BallSearchConfig::default().with_timeout_ms(5_000))
        .with_playfield_switches(&["s_orbit"]);

    let mut machine = Machine::new(config)?;
    machine.add_ball_device(
        BallDeviceConfig::new("bd_trough")
            .with_eject_coil("c_trough_eject")
            .with_ball_switches(&["s_trough1", "s_trough2"])
            .with_eject_target("bd_plunger")
            .with_tag("trough")
            .with_ball_search_order(10),
        Some(MockCoilDriver::new()),
    )?;
    machine.add_ball_device(
        BallDeviceConfig::new("bd_plunger")
            .with_eject_coil("c_plunger")
            .with_ball_switches(&["s_plunger"])
            .with_retry_pulse(25, 2)
            .with_captures_from("bd_trough"),
        Some(MockCoilDriver::new()),
    )?;

    let mut platform = MockSwitchPlatform::new()
        .with_switch(1, true)
        .with_switch(2, true)
        .with_switch(3, false)
        .with_switch(10, false);
    machine.initialize(&mut platform, 0)?;

    // Trough to plunger lane
    machine
        .device_mut("bd_trough")
        .context("trough not configured")?
        .eject(None);
    machine
        .device_mut("bd_plunger")
        .context("plunger not configured")?
        .expect_incoming_ball();
    machine.tick(0)?;
    machine.process_switch("s_trough1", false, 80)?;
    machine.process_switch("s_plunger", true, 300)?;

    // The ball counts once each switch settles
    machine.tick(580)?;
    machine.tick(800)?;
    machine
        .device_mut("bd_trough")
        .context("trough not configured")?
        .confirm_eject();
    machine.tick(810)?;

    // Plunger lane to playfield
    machine
        .device_mut("bd_plunger")
        .context("plunger not configured")?
        .eject(None);
    let mut clock = MockClock::new();
    clock.set(1_000);
    machine.enable_ball_search(1_000);
    machine.poll(&clock)?;
    machine.process_switch("s_plunger", false, 1_050)?;

    // Run the loop the way a platform would, 10ms at a time
    while clock.now_ms() < 1_700 {
        clock.advance(10);
        machine.poll(&clock)?;
    }
    machine.process_switch("s_orbit", true, clock.now_ms())?;

    for event in machine.drain_events() {
        println!("{event}");
    }

    for device in machine.devices() {
        println!(
            "{}: {} ball(s), {}",
            device.name(),
            device.balls(),
            device.state().as_str()
        );
    }
    println!(
        "ball search armed until {:?}",
        machine.ball_search().deadline()
    );

    Ok(())
}
